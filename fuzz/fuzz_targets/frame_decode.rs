//! Arbitrary bytes fed to the frame reader.
//!
//! The reader must return a frame or an error for any input. It must never
//! panic, and it must never allocate past the message ceiling.

#![no_main]

use std::io::Cursor;

use ddm_proto::{FrameHeader, ScratchBuffer, read_frame};
use libfuzzer_sys::fuzz_target;

const LIMIT: usize = 256 * 1024;

fuzz_target!(|data: &[u8]| {
    let _ = FrameHeader::from_bytes(data);

    let mut reader = Cursor::new(data);
    let mut scratch = ScratchBuffer::with_limit(LIMIT);
    while let Ok(frame) = read_frame(&mut reader, &mut scratch) {
        assert!(frame.logical_length() <= LIMIT);
        assert!(frame.logical_length() <= data.len());
    }
});
