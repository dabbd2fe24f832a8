//! Error types for DDM framing.

use thiserror::Error;

/// Result alias for wire-layer operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding, decoding or transferring DDM frames.
///
/// Every variant is fatal for the stream it occurred on. The caller owning
/// the connection decides whether to reconnect; nothing here retries.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The peer delivered fewer bytes than the frame layout requires.
    ///
    /// Covers short reads of the header, of declared payload bytes and of
    /// continuation packets (prefix or data).
    #[error("connection dropped while reading {context}: expected {expected} bytes, got {received}")]
    ConnectionDropped {
        /// What was being read when the stream ended
        context: &'static str,
        /// Bytes requested
        expected: usize,
        /// Bytes actually delivered before EOF
        received: usize,
    },

    /// Fewer than [`crate::FrameHeader::SIZE`] bytes were handed to the
    /// header decoder.
    #[error("frame header too short: {actual} bytes (need {expected})")]
    FrameTooShort {
        /// Required header size
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// A length field carried a value that cannot describe a valid frame or
    /// packet.
    #[error("invalid {field} length {value}: must be at least {minimum}")]
    InvalidLength {
        /// Which length field was malformed
        field: &'static str,
        /// Value as transmitted (high bit masked)
        value: u16,
        /// Smallest legal value for this field
        minimum: u16,
    },

    /// The type nibble of the format byte is not a known DSS type.
    #[error("unknown DSS type {0:#x}")]
    UnknownDssType(u8),

    /// A message exceeds the configured size ceiling.
    #[error("frame of {size} bytes exceeds maximum of {max}")]
    FrameTooLarge {
        /// Message size in bytes
        size: usize,
        /// Configured ceiling
        max: usize,
    },

    /// Transport failure other than end-of-stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether this error means the peer has gone away.
    pub fn is_connection_dropped(&self) -> bool {
        matches!(self, Self::ConnectionDropped { .. })
    }
}
