use serde::{Serialize, Deserialize};

/// Application messages carried over the acoustic link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Navigation estimate of a vehicle
    EstimatedState(EstimatedState),
    /// Request to abort the current operation
    Abort,
    /// Liveness beacon
    Heartbeat,
    /// Free-form text
    TextMessage {
        /// Originator of the text
        origin: String,
        /// Message text
        text: String,
    },
}

/// Discriminant of a message, used to look up per-type codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    EstimatedState,
    Abort,
    Heartbeat,
    TextMessage,
}

impl MessageKind {
    /// Generic wire type tag of this kind
    pub fn id(self) -> u8 {
        match self {
            MessageKind::EstimatedState => 1,
            MessageKind::Abort => 2,
            MessageKind::Heartbeat => 3,
            MessageKind::TextMessage => 4,
        }
    }

    /// Looks up the kind for a generic wire type tag
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(MessageKind::EstimatedState),
            2 => Some(MessageKind::Abort),
            3 => Some(MessageKind::Heartbeat),
            4 => Some(MessageKind::TextMessage),
            _ => None,
        }
    }
}

impl Message {
    /// Returns the kind of this message
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::EstimatedState(_) => MessageKind::EstimatedState,
            Message::Abort => MessageKind::Abort,
            Message::Heartbeat => MessageKind::Heartbeat,
            Message::TextMessage { .. } => MessageKind::TextMessage,
        }
    }

    /// Returns the generic wire type tag
    pub fn id(&self) -> u8 {
        self.kind().id()
    }
}

/// Vehicle navigation estimate
///
/// Angles are in radians, distances in meters and speeds in m/s.
/// `x`, `y` and `z` are NED offsets from (`lat`, `lon`, `height`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatedState {
    /// Latitude (WGS-84)
    pub lat: f64,
    /// Longitude (WGS-84)
    pub lon: f64,
    /// Height above the WGS-84 ellipsoid
    pub height: f32,
    /// North offset
    pub x: f32,
    /// East offset
    pub y: f32,
    /// Down offset
    pub z: f32,
    /// Roll
    pub phi: f32,
    /// Pitch
    pub theta: f32,
    /// Heading
    pub psi: f32,
    /// Body-fixed surge speed
    pub u: f32,
    /// Body-fixed sway speed
    pub v: f32,
    /// Body-fixed heave speed
    pub w: f32,
    /// Depth, negative when unknown
    pub depth: f32,
    /// Altitude above the bottom, negative when unknown
    pub alt: f32,
}
