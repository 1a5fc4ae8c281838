//! Core types and traits for the acoustic networking layer
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{
    NodeConfig,
    NodeName,
    SystemId,
};

/// Default frame capacity in bytes, type tag included
pub const DEFAULT_FRAME_CAPACITY: usize = 64;

/// Smallest frame capacity able to carry a fragment header and payload
pub const MIN_FRAME_CAPACITY: usize = 8;

/// Number of seconds in one TDMA cycle
pub const SECONDS_PER_CYCLE: u32 = 60;
