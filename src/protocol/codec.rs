use std::collections::HashMap;
use std::sync::Arc;

use bincode::Options;
use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::core::{Error, NodeName, Result};
use super::compact::CodedEstimatedState;
use super::frame::Frame;
use super::message::{EstimatedState, Message, MessageKind};
use super::{FIRST_COMPACT_ID, FRAGMENT_TAG};

/// Specialized, smaller encoding for one message type
///
/// Implementations write and read only the body; the frame codec owns the
/// leading type tag.
pub trait CompactCodec: Send + Sync {
    /// Reserved type tag identifying this encoding on the wire
    fn id(&self) -> u8;

    /// Message type this codec is preferred for
    fn kind(&self) -> MessageKind;

    /// Writes the compact body of `message`
    fn encode(&self, message: &Message, dst: &mut BytesMut) -> Result<()>;

    /// Reads a message back from a compact body
    fn decode(&self, body: &[u8]) -> Result<Message>;
}

/// Maps message types to their preferred compact codec, and tags back to codecs
#[derive(Clone, Default)]
pub struct CodecRegistry {
    by_kind: HashMap<MessageKind, Arc<dyn CompactCodec>>,
    by_id: HashMap<u8, Arc<dyn CompactCodec>>,
}

impl CodecRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a compact codec
    ///
    /// Tags must lie in the compact range, never be the fragment tag and
    /// never be claimed twice.
    pub fn register(&mut self, codec: Arc<dyn CompactCodec>) -> Result<()> {
        let id = codec.id();
        if id < FIRST_COMPACT_ID || id == FRAGMENT_TAG {
            return Err(Error::config(format!("Type tag {:#04x} is reserved", id)));
        }

        if self.by_id.contains_key(&id) {
            return Err(Error::config(format!("Type tag {:#04x} already registered", id)));
        }

        // A replaced codec stays decodable for peers still sending its tag
        self.by_kind.insert(codec.kind(), Arc::clone(&codec));
        self.by_id.insert(id, codec);
        Ok(())
    }

    /// Preferred codec for a message type
    pub fn for_kind(&self, kind: MessageKind) -> Option<&Arc<dyn CompactCodec>> {
        self.by_kind.get(&kind)
    }

    /// Codec owning a wire type tag
    pub fn for_id(&self, id: u8) -> Option<&Arc<dyn CompactCodec>> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Encodes application messages into bounded frames and back
#[derive(Clone)]
pub struct FrameCodec {
    capacity: usize,
    registry: CodecRegistry,
}

impl FrameCodec {
    /// Creates a codec with the compact estimated state encoding registered
    pub fn new(capacity: usize) -> Self {
        let coded: Arc<dyn CompactCodec> = Arc::new(CodedEstimatedState);
        let mut registry = CodecRegistry::new();
        registry.by_kind.insert(coded.kind(), Arc::clone(&coded));
        registry.by_id.insert(coded.id(), coded);
        Self::with_registry(capacity, registry)
    }

    /// Creates a codec using the given compact codecs
    pub fn with_registry(capacity: usize, registry: CodecRegistry) -> Self {
        FrameCodec { capacity, registry }
    }

    /// Frame capacity in bytes, type tag included
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CodecRegistry {
        &mut self.registry
    }

    /// Encodes a message into a frame addressed from `source` to `destination`
    pub fn encode(&self, message: &Message, source: NodeName, destination: NodeName) -> Result<Frame> {
        let data = self.encode_payload(message)?;
        Ok(Frame::new(source, destination, data))
    }

    /// Encodes a message into its tagged wire payload
    ///
    /// A registered compact codec is preferred over the generic encoding.
    /// Fails with `EncodeOverflow` rather than truncating.
    pub fn encode_payload(&self, message: &Message) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.capacity);

        match self.registry.for_kind(message.kind()) {
            Some(codec) => {
                dst.put_u8(codec.id());
                codec.encode(message, &mut dst)?;
            }
            None => encode_generic(message, &mut dst)?,
        }

        if dst.len() > self.capacity {
            return Err(Error::EncodeOverflow {
                size: dst.len(),
                capacity: self.capacity,
            });
        }

        Ok(dst.freeze())
    }

    /// Encodes a message with the generic encoding, with no size bound
    ///
    /// Used to produce payloads that are then split into fragments.
    pub fn encode_unbounded(&self, message: &Message) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        encode_generic(message, &mut dst)?;
        Ok(dst.freeze())
    }

    /// Decodes a single, unfragmented frame
    pub fn decode(&self, frame: &Frame) -> Result<Message> {
        if frame.len() > self.capacity {
            return Err(Error::malformed(format!(
                "frame of {} bytes exceeds capacity {}",
                frame.len(),
                self.capacity
            )));
        }

        self.decode_payload(&frame.data)
    }

    /// Decodes a tagged payload, either from one frame or reassembled from fragments
    pub fn decode_payload(&self, data: &[u8]) -> Result<Message> {
        let (&tag, body) = data
            .split_first()
            .ok_or_else(|| Error::malformed("empty payload"))?;

        if let Some(codec) = self.registry.for_id(tag) {
            return codec.decode(body);
        }

        if tag == FRAGMENT_TAG {
            return Err(Error::malformed("fragment frame outside reassembly"));
        }

        let kind = MessageKind::from_id(tag)
            .ok_or_else(|| Error::malformed(format!("unknown type tag {:#04x}", tag)))?;
        debug!(?kind, len = body.len(), "decoding generic payload");
        decode_generic(kind, body)
    }
}

/// Options of the generic encoding: varint lengths, no trailing bytes
fn wire_options() -> impl Options + Copy {
    bincode::DefaultOptions::new()
}

fn encode_generic(message: &Message, dst: &mut BytesMut) -> Result<()> {
    dst.put_u8(message.id());

    let body = match message {
        Message::EstimatedState(state) => wire_options().serialize(state),
        Message::Abort | Message::Heartbeat => Ok(Vec::new()),
        Message::TextMessage { origin, text } => wire_options().serialize(&(origin, text)),
    }
    .map_err(|e| Error::malformed(format!("Failed to serialize message: {}", e)))?;

    dst.extend_from_slice(&body);
    Ok(())
}

fn decode_generic(kind: MessageKind, body: &[u8]) -> Result<Message> {
    let options = wire_options().with_limit(body.len() as u64);
    let malformed = |e: bincode::Error| Error::malformed(format!("Failed to deserialize message: {}", e));

    match kind {
        MessageKind::EstimatedState => {
            let state: EstimatedState = options.deserialize(body).map_err(malformed)?;
            Ok(Message::EstimatedState(state))
        }
        MessageKind::Abort | MessageKind::Heartbeat => {
            if !body.is_empty() {
                return Err(Error::malformed(format!("{:?} carries no payload", kind)));
            }
            Ok(if kind == MessageKind::Abort {
                Message::Abort
            } else {
                Message::Heartbeat
            })
        }
        MessageKind::TextMessage => {
            let (origin, text): (String, String) = options.deserialize(body).map_err(malformed)?;
            Ok(Message::TextMessage { origin, text })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CODED_ESTIMATED_STATE_ID;

    fn codec() -> FrameCodec {
        FrameCodec::new(crate::core::DEFAULT_FRAME_CAPACITY)
    }

    fn text(len: usize) -> Message {
        Message::TextMessage {
            origin: "auv-1".to_string(),
            text: "x".repeat(len),
        }
    }

    #[test]
    fn test_generic_round_trip() {
        let codec = codec();
        let source = NodeName::from("auv-1");
        let destination = NodeName::from("base");

        for message in [Message::Abort, Message::Heartbeat, text(20)] {
            let frame = codec.encode(&message, source.clone(), destination.clone()).unwrap();
            assert_eq!(frame.tag(), Some(message.id()));
            assert!(frame.len() <= codec.capacity());
            assert_eq!(codec.decode(&frame).unwrap(), message);
        }
    }

    #[test]
    fn test_estimated_state_prefers_compact_encoding() {
        let codec = codec();
        let message = Message::EstimatedState(EstimatedState {
            lat: 0.7188,
            lon: -0.1512,
            depth: 3.0,
            ..Default::default()
        });

        let payload = codec.encode_payload(&message).unwrap();
        assert_eq!(payload[0], CODED_ESTIMATED_STATE_ID);
        assert!(payload.len() < codec.encode_unbounded(&message).unwrap().len());
    }

    #[test]
    fn test_generic_estimated_state_overflows() {
        let codec = FrameCodec::with_registry(64, CodecRegistry::new());
        let message = Message::EstimatedState(EstimatedState::default());

        match codec.encode_payload(&message) {
            Err(Error::EncodeOverflow { size, capacity }) => {
                assert!(size > capacity);
                assert_eq!(capacity, 64);
            }
            other => panic!("expected overflow, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_text_is_rejected() {
        let codec = codec();
        let result = codec.encode_payload(&text(100));
        assert!(matches!(result, Err(Error::EncodeOverflow { .. })));
    }

    #[test]
    fn test_decode_malformed() {
        let codec = codec();

        // Empty, unknown tag, truncated text, trailing bytes on an empty message
        for data in [&[][..], &[0x42, 1, 2][..], &[4, 10, b'a'][..], &[2, 0][..]] {
            let result = codec.decode_payload(data);
            assert!(matches!(result, Err(Error::DecodeMalformed(_))), "{:?}", data);
        }

        // Truncated compact body
        let result = codec.decode_payload(&[CODED_ESTIMATED_STATE_ID, 1, 2, 3]);
        assert!(matches!(result, Err(Error::DecodeMalformed(_))));
    }

    #[test]
    fn test_fragment_tag_is_not_a_message() {
        let result = codec().decode_payload(&[FRAGMENT_TAG, 0, 1, 0, 2]);
        assert!(matches!(result, Err(Error::DecodeMalformed(_))));
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let codec = FrameCodec::new(16);
        let data = FrameCodec::new(64).encode_payload(&text(20)).unwrap();
        let frame = Frame::new(NodeName::from("a"), NodeName::from("b"), data.clone());

        assert!(codec.decode(&frame).is_err());
        // Reassembled payloads are not bound by the frame capacity
        assert_eq!(codec.decode_payload(&data).unwrap(), text(20));
    }

    struct CodedHeartbeat(u8);

    impl CompactCodec for CodedHeartbeat {
        fn id(&self) -> u8 {
            self.0
        }

        fn kind(&self) -> MessageKind {
            MessageKind::Heartbeat
        }

        fn encode(&self, _message: &Message, _dst: &mut BytesMut) -> Result<()> {
            Ok(())
        }

        fn decode(&self, _body: &[u8]) -> Result<Message> {
            Ok(Message::Heartbeat)
        }
    }

    #[test]
    fn test_registry_dispatch() {
        let mut codec = codec();
        codec.registry_mut().register(Arc::new(CodedHeartbeat(0x90))).unwrap();
        assert_eq!(codec.registry().len(), 2);

        let payload = codec.encode_payload(&Message::Heartbeat).unwrap();
        assert_eq!(&payload[..], &[0x90]);
        assert_eq!(codec.decode_payload(&payload).unwrap(), Message::Heartbeat);

        // Generic heartbeats from peers without the compact codec still decode
        assert_eq!(codec.decode_payload(&[3]).unwrap(), Message::Heartbeat);
    }

    #[test]
    fn test_registry_rejects_reserved_tags() {
        let mut registry = CodecRegistry::new();
        assert!(registry.register(Arc::new(CodedHeartbeat(3))).is_err());
        assert!(registry.register(Arc::new(CodedHeartbeat(FRAGMENT_TAG))).is_err());
        registry.register(Arc::new(CodedHeartbeat(0x91))).unwrap();
        assert!(registry.register(Arc::new(CodedHeartbeat(0x91))).is_err());
    }
}
