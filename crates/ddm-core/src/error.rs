//! Session-layer error types.

use std::{io, path::PathBuf};

use ddm_proto::ProtocolError;
use thiserror::Error;

/// Errors raised by a [`crate::Connection`].
///
/// Every error closes the connection. Later calls fail fast with
/// [`ConnectionError::Closed`]; reconnecting is up to the owner.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Framing or transfer failure, including a dropped peer.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The connection already failed or was closed.
    #[error("connection is closed")]
    Closed,

    /// A reply arrived for a different request.
    #[error("reply correlation id {actual} does not match request {expected}")]
    CorrelationMismatch {
        /// Correlation id sent with the request
        expected: u16,
        /// Correlation id on the reply
        actual: u16,
    },

    /// A single reply was expected but the host answered with a chain.
    #[error("reply {correlation_id} is a chain of {frames} frames")]
    UnexpectedChain {
        /// Correlation id on the first reply frame
        correlation_id: u16,
        /// Frames read from the chain
        frames: usize,
    },

    /// Another thread panicked while holding the writer.
    #[error("writer lock poisoned")]
    WriterPoisoned,

    /// The transport could not be opened.
    #[error("failed to open {kind} transport to '{address}': {source}")]
    Open {
        /// Transport kind requested
        kind: &'static str,
        /// Address from the configuration
        address: String,
        /// Underlying error
        source: io::Error,
    },

    /// The configuration does not describe an openable transport.
    #[error("invalid transport configuration: {0}")]
    Config(String),
}

impl ConnectionError {
    /// Whether the peer went away mid-frame.
    pub fn is_connection_dropped(&self) -> bool {
        matches!(self, Self::Protocol(e) if e.is_connection_dropped())
    }
}

/// Errors decoding host character data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// No converter exists for this CCSID.
    #[error("unsupported CCSID {0}")]
    UnsupportedCcsid(u16),

    /// The bytes are not valid in the source encoding.
    #[error("invalid data for CCSID {ccsid}: {reason}")]
    InvalidData {
        /// Source CCSID
        ccsid: u16,
        /// What was wrong with the bytes
        reason: String,
    },

    /// A character has no representation in the target CCSID.
    #[error("character {ch:?} cannot be encoded in CCSID {ccsid}")]
    Unmappable {
        /// Target CCSID
        ccsid: u16,
        /// Offending character
        ch: char,
    },
}

/// Errors raised by [`crate::RecordCache`] lookups.
///
/// "Not found" is never an error; lookups return `None` or `false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The search key has more fields than the record key.
    #[error("search key has {key_fields} fields but record key has {record_key_fields}")]
    KeyTooLong {
        /// Fields in the search key
        key_fields: usize,
        /// Fields in the cached records' key
        record_key_fields: usize,
    },

    /// Decoding raw key bytes failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Errors loading a [`crate::SessionConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The TOML did not parse.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}
