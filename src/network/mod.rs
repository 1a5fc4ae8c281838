//! Network boundary and node event loop
//!
//! This module defines the narrow interfaces consumed from collaborators (the
//! acoustic modem driver and the system name resolver) and the node that ties
//! codec, assembler, schedule and queue together.

mod node;

pub use self::node::{AcousticNode, Delivery, Event};

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::core::{Error, NodeName, Result, SystemId};
use crate::protocol::Frame;

/// Physical send side of the acoustic modem
///
/// Send failures are reported, not retried: the next turn carries fresher data.
pub trait LinkDriver {
    /// Hands one frame to the modem
    fn send(&mut self, frame: &Frame) -> Result<()>;
}

/// Forwards frames into a channel, for in-process links and tests
impl LinkDriver for mpsc::UnboundedSender<Frame> {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        mpsc::UnboundedSender::send(self, frame.clone())
            .map_err(|e| Error::link(format!("Failed to hand frame to link: {}", e)))
    }
}

/// Resolves system names to numeric ids
pub trait SystemResolver {
    fn resolve(&self, name: &NodeName) -> Option<SystemId>;
}

/// Resolver backed by a fixed table
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    systems: HashMap<NodeName, SystemId>,
}

impl StaticResolver {
    /// Creates an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a system
    pub fn insert(&mut self, name: NodeName, id: SystemId) -> Option<SystemId> {
        self.systems.insert(name, id)
    }
}

impl FromIterator<(NodeName, SystemId)> for StaticResolver {
    fn from_iter<I: IntoIterator<Item = (NodeName, SystemId)>>(iter: I) -> Self {
        StaticResolver {
            systems: iter.into_iter().collect(),
        }
    }
}

impl SystemResolver for StaticResolver {
    fn resolve(&self, name: &NodeName) -> Option<SystemId> {
        self.systems.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_static_resolver() {
        let resolver: StaticResolver = [(NodeName::from("auv-1"), SystemId(0x2001))]
            .into_iter()
            .collect();

        assert_eq!(resolver.resolve(&NodeName::from("auv-1")), Some(SystemId(0x2001)));
        assert_eq!(resolver.resolve(&NodeName::from("auv-9")), None);
    }

    #[test]
    fn test_channel_link() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        let frame = Frame::new(NodeName::from("a"), NodeName::from("b"), Bytes::from_static(&[2]));

        LinkDriver::send(&mut tx, &frame).unwrap();
        assert_eq!(rx.try_recv().unwrap(), frame);

        drop(rx);
        assert!(matches!(LinkDriver::send(&mut tx, &frame), Err(Error::Link(_))));
    }
}
