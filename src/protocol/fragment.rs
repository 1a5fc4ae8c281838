//! Fragmentation of messages that exceed one frame, and their reassembly.
//!
//! A fragment frame is the reserved `FRAGMENT_TAG` followed by a 4-byte
//! header and a slice of the encoded message:
//!
//! ```text
//! +------+---------+-------+-------+-----------------+
//! | 0xFF | uid u16 | index | total | payload slice   |
//! +------+---------+-------+-------+-----------------+
//! ```
//!
//! The sender is not part of the header: assemblies are keyed by the source
//! reported by the link together with the message uid.
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rand::Rng;
use tracing::debug;

use crate::core::{Error, NodeName, Result};
use super::frame::Frame;
use super::FRAGMENT_TAG;

/// Tag plus fragment header
pub const FRAGMENT_HEADER_LEN: usize = 5;

/// Largest number of fragments a message can be split into
pub const MAX_FRAGMENTS: usize = u8::MAX as usize;

/// Per-fragment metadata carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    /// Unique id of the fragmented message, per source
    pub uid: u16,
    /// Position of this fragment
    pub index: u8,
    /// Number of fragments in the message
    pub total: u8,
}

impl FragmentHeader {
    /// Parses a fragment frame into its header and payload slice
    pub fn parse(data: &[u8]) -> Result<(FragmentHeader, &[u8])> {
        if data.len() < FRAGMENT_HEADER_LEN {
            return Err(Error::malformed(format!(
                "fragment frame of {} bytes is shorter than its header",
                data.len()
            )));
        }

        let mut buf = data;
        if buf.get_u8() != FRAGMENT_TAG {
            return Err(Error::malformed("not a fragment frame"));
        }

        let header = FragmentHeader {
            uid: buf.get_u16(),
            index: buf.get_u8(),
            total: buf.get_u8(),
        };

        if header.total == 0 || header.index >= header.total {
            return Err(Error::malformed(format!(
                "fragment index {} out of range for {} fragments",
                header.index, header.total
            )));
        }

        Ok((header, buf))
    }

    /// Writes the tag and header
    pub fn write(&self, dst: &mut BytesMut) {
        dst.put_u8(FRAGMENT_TAG);
        dst.put_u16(self.uid);
        dst.put_u8(self.index);
        dst.put_u8(self.total);
    }
}

/// Splits an encoded payload into fragment frame payloads that each fit `capacity`
pub fn split_payload(payload: &[u8], uid: u16, capacity: usize) -> Result<Vec<Bytes>> {
    if capacity <= FRAGMENT_HEADER_LEN {
        return Err(Error::config(format!(
            "Frame capacity {} leaves no room for fragment data",
            capacity
        )));
    }

    let chunk = capacity - FRAGMENT_HEADER_LEN;
    let count = payload.len().div_ceil(chunk).max(1);
    if count > MAX_FRAGMENTS {
        return Err(Error::EncodeOverflow {
            size: payload.len(),
            capacity: chunk * MAX_FRAGMENTS,
        });
    }

    let mut slices: Vec<&[u8]> = payload.chunks(chunk).collect();
    if slices.is_empty() {
        slices.push(&[]);
    }

    Ok(slices
        .into_iter()
        .enumerate()
        .map(|(index, slice)| {
            let mut dst = BytesMut::with_capacity(FRAGMENT_HEADER_LEN + slice.len());
            FragmentHeader {
                uid,
                index: index as u8,
                total: count as u8,
            }
            .write(&mut dst);
            dst.extend_from_slice(slice);
            dst.freeze()
        })
        .collect())
}

/// Produces fragment frames with a fresh uid per message
#[derive(Debug)]
pub struct Fragmenter {
    next_uid: u16,
}

impl Default for Fragmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Fragmenter {
    /// Creates a fragmenter with a random starting uid, so a restarted node
    /// does not collide with assemblies its peers still hold
    pub fn new() -> Self {
        Fragmenter {
            next_uid: rand::thread_rng().gen(),
        }
    }

    /// Creates a fragmenter starting at a known uid
    pub fn with_uid(next_uid: u16) -> Self {
        Fragmenter { next_uid }
    }

    /// Splits `payload` into frames from `source` to `destination`
    pub fn split(
        &mut self,
        payload: &[u8],
        source: &NodeName,
        destination: &NodeName,
        capacity: usize,
    ) -> Result<Vec<Frame>> {
        let uid = self.next_uid;
        let parts = split_payload(payload, uid, capacity)?;
        self.next_uid = self.next_uid.wrapping_add(1);

        Ok(parts
            .into_iter()
            .map(|data| Frame::new(source.clone(), destination.clone(), data))
            .collect())
    }
}

/// Identifies one in-flight assembly
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyKey {
    /// Node that sent the fragments
    pub source: NodeName,
    /// Message uid chosen by the source
    pub uid: u16,
}

impl AssemblyKey {
    pub fn new(source: NodeName, uid: u16) -> Self {
        AssemblyKey { source, uid }
    }
}

/// Result of admitting one fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// Fragment stored; more are needed
    Incomplete {
        /// Fragments still missing
        missing: usize,
    },
    /// Last fragment arrived; payload concatenated in index order
    Complete(Bytes),
    /// Fragment of a message that was already delivered
    AlreadyComplete,
}

/// An assembly removed by `sweep_expired`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredAssembly {
    pub key: AssemblyKey,
    /// Age when removed
    pub age: Duration,
    /// Fragments that never arrived
    pub missing: usize,
}

/// In-flight assembly state
#[derive(Debug)]
struct FragmentSet {
    total: u8,
    fragments: BTreeMap<u8, Bytes>,
    created: Instant,
}

impl FragmentSet {
    fn missing(&self) -> usize {
        self.total as usize - self.fragments.len()
    }

    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created)
    }
}

/// Rebuilds messages that span several frames
///
/// The assembler exclusively owns all in-flight assemblies. It has no timer of
/// its own: the caller is expected to call `sweep_expired` periodically.
///
/// Completed keys are remembered until they age out, so a re-delivered
/// fragment of a finished message is not reassembled a second time.
#[derive(Debug, Default)]
pub struct FragmentAssembler {
    assemblies: HashMap<AssemblyKey, FragmentSet>,
    /// Completion time of recently finished messages
    completed: HashMap<AssemblyKey, Instant>,
}

impl FragmentAssembler {
    /// Creates an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores one fragment and reports whether its message is complete
    ///
    /// A fragment whose `total` disagrees with the one recorded for its
    /// assembly is rejected without touching the assembly. Duplicate indices
    /// overwrite the stored payload and do not advance completion.
    pub fn admit_fragment(
        &mut self,
        source: NodeName,
        header: FragmentHeader,
        payload: &[u8],
        now: Instant,
    ) -> Result<AdmitOutcome> {
        if header.total == 0 || header.index >= header.total {
            return Err(Error::malformed(format!(
                "fragment index {} out of range for {} fragments",
                header.index, header.total
            )));
        }

        let key = AssemblyKey::new(source, header.uid);
        if self.completed.contains_key(&key) {
            debug!(source = %key.source, uid = key.uid, index = header.index, "fragment of completed message");
            return Ok(AdmitOutcome::AlreadyComplete);
        }

        let set = self.assemblies.entry(key.clone()).or_insert_with(|| FragmentSet {
            total: header.total,
            fragments: BTreeMap::new(),
            created: now,
        });

        if set.total != header.total {
            return Err(Error::RejectedInconsistent {
                uid: header.uid,
                announced: header.total,
                expected: set.total,
            });
        }

        set.fragments.insert(header.index, Bytes::copy_from_slice(payload));

        let missing = set.missing();
        if missing > 0 {
            return Ok(AdmitOutcome::Incomplete { missing });
        }

        let set = match self.assemblies.remove(&key) {
            Some(set) => set,
            None => return Err(Error::malformed("assembly vanished while completing")),
        };

        let len = set.fragments.values().map(Bytes::len).sum();
        let mut message = BytesMut::with_capacity(len);
        for fragment in set.fragments.values() {
            message.extend_from_slice(fragment);
        }

        debug!(source = %key.source, uid = key.uid, len, "message reassembled");
        self.completed.insert(key, now);
        Ok(AdmitOutcome::Complete(message.freeze()))
    }

    /// Age of an in-flight assembly
    pub fn age(&self, key: &AssemblyKey, now: Instant) -> Option<Duration> {
        self.assemblies.get(key).map(|set| set.age(now))
    }

    /// Number of fragments an in-flight assembly still needs
    pub fn fragments_missing(&self, key: &AssemblyKey) -> Option<usize> {
        self.assemblies.get(key).map(FragmentSet::missing)
    }

    /// Removes and reports every assembly older than `timeout`
    ///
    /// Completion records older than `timeout` are dropped silently.
    pub fn sweep_expired(&mut self, now: Instant, timeout: Duration) -> Vec<ExpiredAssembly> {
        let mut expired = Vec::new();

        self.completed
            .retain(|_, completed| now.saturating_duration_since(*completed) <= timeout);

        self.assemblies.retain(|key, set| {
            let age = set.age(now);
            if age > timeout {
                expired.push(ExpiredAssembly {
                    key: key.clone(),
                    age,
                    missing: set.missing(),
                });
                false
            } else {
                true
            }
        });

        expired
    }

    /// Number of in-flight assemblies
    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }
}
