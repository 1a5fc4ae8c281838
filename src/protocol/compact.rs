//! Compact estimated state encoding
//!
//! The generic encoding of an estimated state does not fit one acoustic frame,
//! so a quantized body is sent instead:
//!
//! | field   | type | unit                         |
//! |---------|------|------------------------------|
//! | lat     | i32  | 1e-7 degree                  |
//! | lon     | i32  | 1e-7 degree                  |
//! | depth   | u16  | decimeter, `0xFFFF` unknown  |
//! | alt     | i16  | decimeter, `-1` unknown      |
//! | phi     | i16  | centidegree                  |
//! | theta   | i16  | centidegree                  |
//! | psi     | u16  | 1/65536 of a turn            |
//! | u       | i16  | cm/s                         |
//!
//! The encoding is lossy: `height`, `x`, `y`, `z`, `v` and `w` are not sent and
//! decode as zero. The (`x`, `y`) offset is folded into `lat`/`lon` before
//! quantization, so the absolute position survives.
use std::f64::consts::PI;

use bytes::{Buf, BufMut, BytesMut};

use crate::core::{Error, Result};
use super::codec::CompactCodec;
use super::message::{EstimatedState, Message, MessageKind};
use super::CODED_ESTIMATED_STATE_ID;

/// Mean earth radius used to displace positions
const EARTH_RADIUS: f64 = 6_371_000.0;

/// Length of the compact body
pub const CODED_ESTIMATED_STATE_LEN: usize = 20;

const DEPTH_UNKNOWN: u16 = u16::MAX;
const ALT_UNKNOWN: i16 = -1;

/// Compact codec for `EstimatedState`
#[derive(Debug, Clone, Copy, Default)]
pub struct CodedEstimatedState;

impl CompactCodec for CodedEstimatedState {
    fn id(&self) -> u8 {
        CODED_ESTIMATED_STATE_ID
    }

    fn kind(&self) -> MessageKind {
        MessageKind::EstimatedState
    }

    fn encode(&self, message: &Message, dst: &mut BytesMut) -> Result<()> {
        let state = match message {
            Message::EstimatedState(state) => state,
            other => {
                return Err(Error::config(format!(
                    "Compact estimated state codec cannot encode {:?}",
                    other.kind()
                )))
            }
        };

        let (lat, lon) = displace(state.lat, state.lon, state.x as f64, state.y as f64);

        dst.reserve(CODED_ESTIMATED_STATE_LEN);
        dst.put_i32(quantize(lat.to_degrees(), 1e7, -90.0, 90.0) as i32);
        dst.put_i32(quantize(wrap_degrees(lon.to_degrees()), 1e7, -180.0, 180.0) as i32);
        dst.put_u16(if state.depth < 0.0 {
            DEPTH_UNKNOWN
        } else {
            quantize(state.depth as f64, 10.0, 0.0, (DEPTH_UNKNOWN - 1) as f64 / 10.0) as u16
        });
        dst.put_i16(if state.alt < 0.0 {
            ALT_UNKNOWN
        } else {
            quantize(state.alt as f64, 10.0, 0.0, i16::MAX as f64 / 10.0) as i16
        });
        dst.put_i16(quantize(wrap_degrees((state.phi as f64).to_degrees()), 100.0, -180.0, 180.0) as i16);
        dst.put_i16(quantize(wrap_degrees((state.theta as f64).to_degrees()), 100.0, -180.0, 180.0) as i16);
        dst.put_u16(heading_to_wire(state.psi as f64));
        dst.put_i16(quantize(state.u as f64, 100.0, i16::MIN as f64 / 100.0, i16::MAX as f64 / 100.0) as i16);
        Ok(())
    }

    fn decode(&self, body: &[u8]) -> Result<Message> {
        if body.len() != CODED_ESTIMATED_STATE_LEN {
            return Err(Error::malformed(format!(
                "coded estimated state is {} bytes, expected {}",
                body.len(),
                CODED_ESTIMATED_STATE_LEN
            )));
        }

        let mut buf = body;
        let lat = (buf.get_i32() as f64 / 1e7).to_radians();
        let lon = (buf.get_i32() as f64 / 1e7).to_radians();
        let depth = match buf.get_u16() {
            DEPTH_UNKNOWN => -1.0,
            dm => dm as f32 / 10.0,
        };
        let alt = match buf.get_i16() {
            dm if dm < 0 => -1.0,
            dm => dm as f32 / 10.0,
        };
        let phi = (buf.get_i16() as f64 / 100.0).to_radians() as f32;
        let theta = (buf.get_i16() as f64 / 100.0).to_radians() as f32;
        let psi = (buf.get_u16() as f64 / 65536.0 * 2.0 * PI) as f32;
        let u = buf.get_i16() as f32 / 100.0;

        Ok(Message::EstimatedState(EstimatedState {
            lat,
            lon,
            depth,
            alt,
            phi,
            theta,
            psi,
            u,
            ..Default::default()
        }))
    }
}

/// Scales and rounds a value after clamping it to `[min, max]`
fn quantize(value: f64, scale: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(min, max) * scale).round()
}

/// Wraps an angle in degrees to `[-180, 180)`
fn wrap_degrees(deg: f64) -> f64 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

fn heading_to_wire(psi: f64) -> u16 {
    if !psi.is_finite() {
        return 0;
    }
    let turn = psi.rem_euclid(2.0 * PI) / (2.0 * PI);
    ((turn * 65536.0).round() as u32 % 65536) as u16
}

/// Applies a north/east offset in meters to a position in radians
fn displace(lat: f64, lon: f64, north: f64, east: f64) -> (f64, f64) {
    let lat2 = lat + north / EARTH_RADIUS;
    let cos_lat = lat2.cos();
    if cos_lat.abs() < f64::EPSILON {
        return (lat2, lon);
    }
    (lat2, lon + east / (EARTH_RADIUS * cos_lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(state: EstimatedState) -> BytesMut {
        let mut dst = BytesMut::new();
        CodedEstimatedState
            .encode(&Message::EstimatedState(state), &mut dst)
            .unwrap();
        dst
    }

    fn decode(body: &[u8]) -> EstimatedState {
        match CodedEstimatedState.decode(body).unwrap() {
            Message::EstimatedState(state) => state,
            other => panic!("decoded wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_within_quantization() {
        let state = EstimatedState {
            lat: 41.1850_f64.to_radians(),
            lon: (-8.7060_f64).to_radians(),
            depth: 12.34,
            alt: 5.67,
            phi: 0.05,
            theta: -0.1,
            psi: 4.5,
            u: 1.25,
            // Lossy fields, not transmitted
            height: 10.0,
            z: 12.0,
            v: 0.3,
            w: 0.1,
            ..Default::default()
        };

        let body = encode(state);
        assert_eq!(body.len(), CODED_ESTIMATED_STATE_LEN);

        let decoded = decode(&body);
        assert!((decoded.lat - state.lat).abs() < 1e-8);
        assert!((decoded.lon - state.lon).abs() < 1e-8);
        assert!((decoded.depth - 12.3).abs() < 1e-4);
        assert!((decoded.alt - 5.7).abs() < 1e-4);
        assert!((decoded.phi - state.phi).abs() < 1e-3);
        assert!((decoded.theta - state.theta).abs() < 1e-3);
        assert!((decoded.psi - state.psi).abs() < 1e-3);
        assert!((decoded.u - state.u).abs() < 1e-6);

        assert_eq!(decoded.height, 0.0);
        assert_eq!(decoded.z, 0.0);
        assert_eq!(decoded.v, 0.0);
        assert_eq!(decoded.w, 0.0);
    }

    #[test]
    fn test_offset_is_folded_into_position() {
        let origin = EstimatedState {
            lat: 0.7,
            lon: -0.15,
            ..Default::default()
        };
        let displaced = EstimatedState {
            x: 100.0,
            y: 50.0,
            ..origin
        };

        let a = decode(&encode(origin));
        let b = decode(&encode(displaced));

        let north = (b.lat - a.lat) * EARTH_RADIUS;
        let east = (b.lon - a.lon) * EARTH_RADIUS * b.lat.cos();
        assert!((north - 100.0).abs() < 0.05, "north = {}", north);
        assert!((east - 50.0).abs() < 0.05, "east = {}", east);
        assert_eq!(b.x, 0.0);
        assert_eq!(b.y, 0.0);
    }

    #[test]
    fn test_unknown_depth_and_altitude() {
        let state = EstimatedState {
            depth: -1.0,
            alt: -1.0,
            ..Default::default()
        };

        let decoded = decode(&encode(state));
        assert_eq!(decoded.depth, -1.0);
        assert_eq!(decoded.alt, -1.0);
    }

    #[test]
    fn test_heading_wraps() {
        let state = EstimatedState {
            psi: -0.5,
            ..Default::default()
        };

        let decoded = decode(&encode(state));
        assert!((decoded.psi as f64 - (2.0 * PI - 0.5)).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_other_messages_and_bad_lengths() {
        let mut dst = BytesMut::new();
        assert!(CodedEstimatedState.encode(&Message::Abort, &mut dst).is_err());
        assert!(matches!(
            CodedEstimatedState.decode(&[0; CODED_ESTIMATED_STATE_LEN - 1]),
            Err(Error::DecodeMalformed(_))
        ));
        assert!(CodedEstimatedState.decode(&[0; CODED_ESTIMATED_STATE_LEN + 1]).is_err());
    }
}
