//! Protocol implementation module
//!
//! This module defines the application messages, their encoding into bounded
//! frames, fragment reassembly and the outbound transmission queue.

pub mod codec;
pub mod compact;
pub mod fragment;
pub mod frame;
pub mod message;
pub mod queue;

pub use self::codec::{CodecRegistry, CompactCodec, FrameCodec};
pub use self::compact::CodedEstimatedState;
pub use self::fragment::{
    AdmitOutcome, AssemblyKey, ExpiredAssembly, FragmentAssembler, FragmentHeader, Fragmenter,
};
pub use self::frame::Frame;
pub use self::message::{EstimatedState, Message, MessageKind};
pub use self::queue::TransmissionQueue;

// Constants
/// Reserved type tag of fragment frames
pub const FRAGMENT_TAG: u8 = 0xFF;

/// Reserved type tag of the compact estimated state encoding
pub const CODED_ESTIMATED_STATE_ID: u8 = 0x80;

/// Generic message ids stay below this value; compact codecs use tags from here up
pub const FIRST_COMPACT_ID: u8 = 0x80;
