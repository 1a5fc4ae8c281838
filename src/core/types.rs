use std::fmt;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use super::{Error, Result};

/// System name of a node on the acoustic network
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeName(pub String);

impl NodeName {
    /// Creates a new node name
    pub fn new(name: impl Into<String>) -> Self {
        NodeName(name.into())
    }

    /// Returns the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeName {
    fn from(name: &str) -> Self {
        NodeName(name.to_string())
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric system identifier, as resolved from a node name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemId(pub u16);

/// Configuration for an acoustic node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Name of this node
    pub system_name: NodeName,
    /// Number of TDMA slots
    pub slot_count: u32,
    /// TDMA slot of the local node
    pub slot_number: u32,
    /// TDMA slot duration in seconds
    pub slot_duration: u32,
    /// Destination of periodic estimated state transmissions
    pub destination: NodeName,
    /// Transmit the estimated state on each turn instead of the pending queue
    pub transmit_estimated_state: bool,
    /// Frame capacity in bytes, type tag included
    pub frame_capacity: usize,
    /// Age after which an incomplete assembly is discarded
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub fragment_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            system_name: NodeName::new("auv-1"),
            slot_count: 2,
            slot_number: 0,
            slot_duration: 10,
            destination: NodeName::new("base"),
            transmit_estimated_state: true,
            frame_capacity: super::DEFAULT_FRAME_CAPACITY,
            fragment_timeout: Duration::from_secs(60),
        }
    }
}

impl NodeConfig {
    /// Checks the configuration, so a node never runs with an undefined schedule
    pub fn validate(&self) -> Result<()> {
        if self.system_name.as_str().is_empty() {
            return Err(Error::config("System name must not be empty"));
        }

        if self.slot_count == 0 {
            return Err(Error::config("Slot count must be at least 1"));
        }

        if self.slot_number >= self.slot_count {
            return Err(Error::config(format!(
                "Slot number {} out of range for {} slots",
                self.slot_number, self.slot_count
            )));
        }

        if self.slot_duration == 0 || self.slot_duration > 60 {
            return Err(Error::config(format!(
                "Slot duration must be within 1..=60 seconds, got {}",
                self.slot_duration
            )));
        }

        if self.frame_capacity < super::MIN_FRAME_CAPACITY {
            return Err(Error::config(format!(
                "Frame capacity must be at least {} bytes",
                super::MIN_FRAME_CAPACITY
            )));
        }

        // Tag plus coded body
        let estimate_len = crate::protocol::compact::CODED_ESTIMATED_STATE_LEN + 1;
        if self.transmit_estimated_state && self.frame_capacity < estimate_len {
            return Err(Error::config(format!(
                "Frame capacity of {} bytes cannot carry the {}-byte estimated state frame",
                self.frame_capacity, estimate_len
            )));
        }

        Ok(())
    }
}
