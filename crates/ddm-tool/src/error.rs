//! CLI error type.

use std::{io, path::PathBuf};

use ddm_core::{ConfigError, ConnectionError};
use ddm_proto::ProtocolError;
use thiserror::Error;

/// Anything that can stop a command.
#[derive(Error, Debug)]
pub enum ToolError {
    /// A file could not be read or written.
    #[error("cannot access {path}: {source}")]
    Open {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Writing to stdout failed.
    #[error("output error: {0}")]
    Output(#[from] io::Error),

    /// The input stream is not valid DDM framing.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Session failure while talking to a server.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Payload argument is not hex.
    #[error("invalid hex payload: {0}")]
    Hex(#[from] hex::FromHexError),
}
