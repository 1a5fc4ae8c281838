use std::collections::BTreeMap;

use tracing::debug;

use crate::core::NodeName;
use super::frame::Frame;

/// Outbound frames waiting for this node's TDMA turn
///
/// Holds at most one frame per destination. Navigation data goes stale faster
/// than it can be retried, so a newer frame replaces the pending one and
/// everything not selected on a turn is discarded.
#[derive(Debug, Default)]
pub struct TransmissionQueue {
    pending: BTreeMap<NodeName, Frame>,
}

impl TransmissionQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a frame for its destination, returning the frame it replaced
    pub fn enqueue(&mut self, frame: Frame) -> Option<Frame> {
        self.pending.insert(frame.destination.clone(), frame)
    }

    /// Selects the frame to send on this turn and clears the queue
    ///
    /// With several destinations pending, the first one (in name order) that
    /// differs from `last_destination` wins, so no destination can monopolize
    /// the slot.
    pub fn drain_one(&mut self, last_destination: Option<&NodeName>) -> Option<Frame> {
        let selected = if self.pending.len() == 1 {
            self.pending.keys().next().cloned()
        } else {
            self.pending
                .keys()
                .find(|destination| Some(*destination) != last_destination)
                .cloned()
        };

        let frame = selected.and_then(|destination| self.pending.remove(&destination));

        if !self.pending.is_empty() {
            debug!(discarded = self.pending.len(), "dropping frames not selected this turn");
        }
        self.pending.clear();

        frame
    }

    /// Frame pending for a destination
    pub fn pending(&self, destination: &NodeName) -> Option<&Frame> {
        self.pending.get(destination)
    }

    /// Destinations with a pending frame, in name order
    pub fn destinations(&self) -> impl Iterator<Item = &NodeName> {
        self.pending.keys()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every pending frame
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
