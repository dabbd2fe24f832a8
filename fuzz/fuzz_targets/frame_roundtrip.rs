//! Encode then decode a frame built from fuzz input.
//!
//! The first five bytes pick the header fields and a payload length; the
//! decoded frame must match the original exactly.

#![no_main]

use std::io::Cursor;

use bytes::Bytes;
use ddm_proto::{DssType, Frame, FrameHeader, ScratchBuffer, encode_frame, read_frame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((head, rest)) = data.split_first_chunk::<5>() else {
        return;
    };

    let dss_type = DssType::from_u8(head[0]).unwrap_or(DssType::Request);
    let correlation_id = u16::from_be_bytes([head[1], head[2]]);
    // Stretch short inputs across the segmentation boundaries
    let repeat = usize::from(u16::from_be_bytes([head[3], head[4]]) % 4) + 1;
    let payload: Vec<u8> = rest.iter().copied().cycle().take(rest.len() * repeat * 16).collect();

    let mut header = FrameHeader::new(dss_type, correlation_id);
    header.set_chained(head[0] & 0x40 != 0);
    header.set_same_correlator(head[0] & 0x10 != 0);
    let frame = Frame::new(header, Bytes::from(payload));

    let wire = encode_frame(&frame);
    let decoded = read_frame(&mut Cursor::new(&wire[..]), &mut ScratchBuffer::new())
        .expect("encoded frame must decode");

    assert_eq!(decoded.payload, frame.payload);
    assert_eq!(decoded.header.correlation_id(), correlation_id);
    assert_eq!(decoded.header.dss_type(), Some(dss_type));
    assert_eq!(decoded.header.is_chained(), frame.header.is_chained());
});
