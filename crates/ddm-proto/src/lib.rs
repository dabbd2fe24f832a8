//! Wire format for DDM (Distributed Data Management) data streams.
//!
//! Every DDM message travels inside a GDS envelope: a fixed 6-byte header
//! followed by the payload. A single wire frame is capped at 32767 bytes
//! (header included). Larger messages are carried as one head frame whose
//! length field is `0xFFFF`, followed by continuation packets that each start
//! with a 2-byte length prefix.
//!
//! ```text
//! head frame:   [len=0xFFFF][gds][fmt][corr] [32761 payload bytes]
//! continuation: [0xFFFF] [32765 payload bytes]        (more follow)
//! terminal:     [n + 2]  [n payload bytes]            (last packet)
//! ```
//!
//! The high bit of any 16-bit length field is the continuation signal. The
//! same convention holds for the head frame and for every continuation
//! packet.
//!
//! Reading is blocking and single-threaded per stream. Any short read while a
//! frame is being reassembled is reported as
//! [`ProtocolError::ConnectionDropped`]; nothing at this layer retries.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod flags;
pub mod frame;
pub mod header;
pub mod pool;
pub mod segment;

pub use errors::{ProtocolError, Result};
pub use flags::{DssType, FormatFlags};
pub use frame::{ChainBuilder, Frame};
pub use header::FrameHeader;
pub use pool::BufferPool;
pub use segment::{
    ScratchBuffer, continuation_packet_count, encode_frame, encode_frame_into, read_chain,
    read_frame, write_frame,
};
