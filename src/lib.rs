//! TDMA acoustic networking layer
//!
//! This library moves application messages between vehicles over a narrow-band,
//! half-duplex acoustic channel. Messages are encoded into bounded frames,
//! messages spanning several frames are reassembled, and outbound frames wait
//! in a most-recent-wins queue until the node's TDMA slot comes up.
pub mod core;
pub mod network;
pub mod protocol;
pub mod time;

// Re-export commonly used items
pub use crate::core::{Error, NodeConfig, NodeName, Result, SystemId};
pub use crate::network::{AcousticNode, Delivery, Event, LinkDriver, StaticResolver, SystemResolver};
pub use crate::protocol::{EstimatedState, Frame, FrameCodec, Message};
pub use crate::time::TdmaSchedule;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
