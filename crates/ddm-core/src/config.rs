//! Session configuration.
//!
//! Defaults suit a DDM server on its standard port; every field can be
//! overridden from TOML:
//!
//! ```toml
//! transport = "remote"
//! address = "as400.example.com:446"
//! read_timeout_ms = 30000
//! ccsid = 37
//! ```

use std::{path::Path, time::Duration};

use ddm_proto::FrameHeader;
use serde::{Deserialize, Serialize};

use crate::{convert::Ccsid, error::ConfigError};

/// Which transport a session runs over. Chosen once, at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process loopback pipe
    Local,
    /// TCP socket to a remote host
    #[default]
    Remote,
    /// Unix domain socket to a server on the same machine
    Native,
}

impl TransportKind {
    /// Lower-case name, as used in config files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Native => "native",
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Transport to open
    pub transport: TransportKind,
    /// `host:port` for remote, socket path for native; unused for local
    pub address: String,
    /// Blocking read timeout in milliseconds; `None` or 0 waits forever
    pub read_timeout_ms: Option<u64>,
    /// Blocking write timeout in milliseconds; `None` or 0 waits forever
    pub write_timeout_ms: Option<u64>,
    /// CCSID used to decode raw character key bytes
    pub ccsid: u16,
    /// Largest reassembled message accepted, header included
    pub max_message_size: usize,
    /// Idle buffers kept by the session's buffer pool
    pub pool_buffers: usize,
    /// Nominal capacity of pooled buffers
    pub pool_buffer_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Remote,
            address: "localhost:446".to_string(),
            read_timeout_ms: Some(30_000),
            write_timeout_ms: Some(30_000),
            ccsid: 37,
            max_message_size: 16 * 1024 * 1024,
            pool_buffers: 8,
            pool_buffer_capacity: FrameHeader::MAX_FRAME_LENGTH,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_size < FrameHeader::SIZE {
            return Err(ConfigError::Invalid {
                field: "max_message_size",
                reason: format!("must be at least {} bytes", FrameHeader::SIZE),
            });
        }

        if self.pool_buffer_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "pool_buffer_capacity",
                reason: "must be non-zero".to_string(),
            });
        }

        if self.transport != TransportKind::Local && self.address.is_empty() {
            return Err(ConfigError::Invalid {
                field: "address",
                reason: format!("required for {} transport", self.transport.as_str()),
            });
        }

        Ccsid::new(self.ccsid)
            .map_err(|e| ConfigError::Invalid { field: "ccsid", reason: e.to_string() })?;

        Ok(())
    }

    /// Read timeout as a `Duration`.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.filter(|&ms| ms > 0).map(Duration::from_millis)
    }

    /// Write timeout as a `Duration`.
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.filter(|&ms| ms > 0).map(Duration::from_millis)
    }

    /// Converter for [`Self::ccsid`].
    pub fn converter(&self) -> Result<Ccsid, ConfigError> {
        Ccsid::new(self.ccsid)
            .map_err(|e| ConfigError::Invalid { field: "ccsid", reason: e.to_string() })
    }
}
