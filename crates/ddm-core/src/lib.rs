//! DDM session layer.
//!
//! Everything above raw framing that a record-level file reader needs:
//! picking a transport, sending and receiving whole messages over it, and
//! caching fetched records so cursor movement does not round-trip to the
//! host.
//!
//! # Components
//!
//! - [`transport`]: closed set of transports (local, remote socket, native)
//! - [`connection`]: serialized frame writes and single-reader frame receipt
//! - [`record`]: record format and field values
//! - [`convert`]: CCSID character decoding for raw key bytes
//! - [`key`]: partial-key matching rules
//! - [`cache`]: directional record cache with keyed and positional navigation
//! - [`config`]: session configuration
//! - [`error`]: error types
//!
//! # Concurrency
//!
//! A connection's writer half sits behind a mutex so the pieces of one
//! segmented message are never interleaved with another thread's message.
//! The reader half is owned by exactly one thread. A [`cache::RecordCache`]
//! has no locking of its own; it belongs to the file session that filled it.

pub mod cache;
pub mod config;
pub mod connection;
pub mod convert;
pub mod error;
pub mod key;
pub mod record;
pub mod transport;

pub use cache::{Direction, RecordCache};
pub use config::{SessionConfig, TransportKind};
pub use connection::{Connection, FrameReceiver, FrameSender};
pub use convert::{Ccsid, CharConverter};
pub use error::{CacheError, ConfigError, ConnectionError, ConversionError};
pub use key::compare_keys;
pub use record::{FieldDescription, FieldKind, FieldValue, Record, RecordFormat};
pub use transport::{Transport, TransportReader, TransportWriter};
