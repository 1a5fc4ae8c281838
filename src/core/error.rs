use std::io;
use thiserror::Error;

/// Custom error types for the acoustic networking layer
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Message does not fit in one frame and has no compact encoding
    #[error("Encoded message is {size} bytes, frame capacity is {capacity}")]
    EncodeOverflow {
        /// Size the encoding would need
        size: usize,
        /// Frame capacity in bytes
        capacity: usize,
    },

    /// Corrupt, truncated or unknown-tag buffer
    #[error("Malformed frame: {0}")]
    DecodeMalformed(String),

    /// Fragment metadata conflicts with an assembly already in flight
    #[error("Fragment of uid {uid} announces {announced} fragments, assembly expects {expected}")]
    RejectedInconsistent {
        /// Message unique id
        uid: u16,
        /// Total announced by the rejected fragment
        announced: u8,
        /// Total recorded by the first fragment
        expected: u8,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Link error: {0}")]
    Link(String),

    #[error("Message bus error: {0}")]
    Bus(String),

    #[error("Timing error: {0}")]
    Timing(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new malformed frame error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::DecodeMalformed(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new link error
    pub fn link(msg: impl Into<String>) -> Self {
        Error::Link(msg.into())
    }

    /// Creates a new message bus error
    pub fn bus(msg: impl Into<String>) -> Self {
        Error::Bus(msg.into())
    }

    /// Creates a new timing error
    pub fn timing(msg: impl Into<String>) -> Self {
        Error::Timing(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::malformed("short header");
        assert!(matches!(err, Error::DecodeMalformed(_)));
        assert_eq!(err.to_string(), "Malformed frame: short header");
    }

    #[test]
    fn test_overflow_message() {
        let err = Error::EncodeOverflow { size: 70, capacity: 64 };
        assert_eq!(err.to_string(), "Encoded message is 70 bytes, frame capacity is 64");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
