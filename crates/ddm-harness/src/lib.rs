//! Deterministic stream simulation for DDM framing tests.
//!
//! Real sockets hand back whatever the kernel has buffered, so a reader sees
//! headers and continuation prefixes split at arbitrary points. The types here
//! reproduce that from a seed:
//!
//! - [`SimStream`]: a `Read + Write` stream that returns seeded short reads,
//!   spurious interrupts and an early end of stream
//! - [`SharedWire`]: a cloneable writer that records every write and flush so
//!   concurrent senders can be checked for interleaving

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod shared_wire;
pub mod sim_stream;

pub use shared_wire::SharedWire;
pub use sim_stream::{SimStream, SimStreamBuilder};
