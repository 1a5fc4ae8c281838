use bytes::Bytes;

use crate::core::NodeName;
use super::FRAGMENT_TAG;

/// A bounded binary unit exchanged over the acoustic link
///
/// `data` starts with the one-byte type tag; its length never exceeds the
/// frame capacity of the codec that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sending node
    pub source: NodeName,
    /// Receiving node
    pub destination: NodeName,
    /// Type tag followed by the payload
    pub data: Bytes,
}

impl Frame {
    /// Creates a new frame
    pub fn new(source: NodeName, destination: NodeName, data: Bytes) -> Self {
        Frame { source, destination, data }
    }

    /// Leading type tag, if any
    pub fn tag(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Bytes following the type tag
    pub fn body(&self) -> &[u8] {
        self.data.get(1..).unwrap_or(&[])
    }

    /// Whether this frame carries one fragment of a larger message
    pub fn is_fragment(&self) -> bool {
        self.tag() == Some(FRAGMENT_TAG)
    }

    /// Total length on the wire
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_and_body() {
        let frame = Frame::new(
            NodeName::from("a"),
            NodeName::from("b"),
            Bytes::from_static(&[3, 9, 9]),
        );
        assert_eq!(frame.tag(), Some(3));
        assert_eq!(frame.body(), &[9, 9]);
        assert!(!frame.is_fragment());
        assert_eq!(frame.len(), 3);
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::new(NodeName::from("a"), NodeName::from("b"), Bytes::new());
        assert_eq!(frame.tag(), None);
        assert!(frame.body().is_empty());
        assert!(frame.is_empty());
    }
}
