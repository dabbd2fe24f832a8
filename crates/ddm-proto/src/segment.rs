//! Continuation segmentation and reassembly.
//!
//! # Write path
//!
//! A frame whose header plus payload fits in 32767 bytes is written as is.
//! Anything larger is split:
//!
//! 1. Head frame: header with length `0xFFFF`, then the first 32761 payload
//!    bytes (32767 bytes in total).
//! 2. While payload remains, compute `min(remaining + 2, 32767)`. If that is
//!    the maximum and more data remains beyond it, write prefix `0xFFFF` and
//!    32765 bytes. Otherwise write the literal packet length as the prefix
//!    followed by the rest; that packet is the last one.
//!
//! Each piece is written and flushed before the next is assembled.
//!
//! # Read path
//!
//! Read the header, then the rest of the head frame as given by its masked
//! length. If the header was continued, keep reading a 2-byte prefix and
//! `(prefix & 0x7FFF) - 2` bytes until a prefix without the high bit shows
//! up. Everything lands contiguously in the caller's [`ScratchBuffer`].

use std::io::{ErrorKind, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::{
    errors::{ProtocolError, Result},
    frame::Frame,
    header::FrameHeader,
};

/// Size of a continuation packet's length prefix.
pub const PREFIX_SIZE: usize = 2;

/// Payload bytes carried by the head frame of a segmented message.
pub const HEAD_FRAME_DATA: usize = FrameHeader::MAX_FRAME_LENGTH - FrameHeader::SIZE;

/// Payload bytes carried by a full continuation packet.
pub const MAX_PACKET_DATA: usize = FrameHeader::MAX_FRAME_LENGTH - PREFIX_SIZE;

/// Default ceiling on a reassembled message (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Number of continuation packets needed for a payload of `payload_len`
/// bytes.
pub fn continuation_packet_count(payload_len: usize) -> usize {
    let overflow = (payload_len + FrameHeader::SIZE).saturating_sub(FrameHeader::MAX_FRAME_LENGTH);
    overflow.div_ceil(MAX_PACKET_DATA)
}

/// Total bytes on the wire for a payload of `payload_len` bytes.
pub fn wire_length(payload_len: usize) -> usize {
    FrameHeader::SIZE + payload_len + PREFIX_SIZE * continuation_packet_count(payload_len)
}

/// Prefix and data length of the next continuation packet.
fn next_packet(remaining: usize) -> (u16, usize) {
    let packet_length = (remaining + PREFIX_SIZE).min(FrameHeader::MAX_FRAME_LENGTH);

    if packet_length == FrameHeader::MAX_FRAME_LENGTH && remaining > MAX_PACKET_DATA {
        (FrameHeader::CONTINUED_LENGTH, MAX_PACKET_DATA)
    } else {
        (packet_length as u16, packet_length - PREFIX_SIZE)
    }
}

/// Wire header for the first piece of `frame`.
fn head_header(frame: &Frame) -> FrameHeader {
    let mut header = frame.header;
    if frame.is_segmented() {
        header.set_continued();
    } else {
        header.set_length(frame.logical_length() as u16);
    }
    header
}

/// Append the full wire representation of `frame` to `dst`.
pub fn encode_frame_into(frame: &Frame, dst: &mut BytesMut) {
    dst.reserve(wire_length(frame.payload.len()));
    head_header(frame).encode_into(dst);

    if !frame.is_segmented() {
        dst.put_slice(&frame.payload);
        return;
    }

    let (head, mut rest) = frame.payload.split_at(HEAD_FRAME_DATA);
    dst.put_slice(head);

    while !rest.is_empty() {
        let (prefix, len) = next_packet(rest.len());
        let (chunk, tail) = rest.split_at(len);
        dst.put_u16(prefix);
        dst.put_slice(chunk);
        rest = tail;
    }
}

/// Wire representation of `frame`.
pub fn encode_frame(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::new();
    encode_frame_into(frame, &mut buf);
    buf.freeze()
}

/// Write `frame` to `writer`, flushing after the head frame and after every
/// continuation packet.
///
/// `buf` is assembly space; it is cleared before and after use. The caller is
/// responsible for holding exclusive access to `writer` for the duration of
/// the call.
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame, buf: &mut BytesMut) -> Result<()> {
    buf.clear();
    head_header(frame).encode_into(buf);

    if !frame.is_segmented() {
        buf.put_slice(&frame.payload);
        flush_piece(writer, buf)?;
        debug!(
            correlation_id = frame.correlation_id(),
            length = frame.logical_length(),
            "wrote frame"
        );
        return Ok(());
    }

    let (head, mut rest) = frame.payload.split_at(HEAD_FRAME_DATA);
    buf.put_slice(head);
    flush_piece(writer, buf)?;

    let mut packets = 0usize;
    while !rest.is_empty() {
        let (prefix, len) = next_packet(rest.len());
        let (chunk, tail) = rest.split_at(len);
        buf.put_u16(prefix);
        buf.put_slice(chunk);
        flush_piece(writer, buf)?;
        trace!(prefix, len, "wrote continuation packet");
        packets += 1;
        rest = tail;
    }

    debug!(
        correlation_id = frame.correlation_id(),
        length = frame.logical_length(),
        packets,
        "wrote segmented frame"
    );
    Ok(())
}

fn flush_piece<W: Write>(writer: &mut W, buf: &mut BytesMut) -> Result<()> {
    writer.write_all(buf)?;
    writer.flush()?;
    buf.clear();
    Ok(())
}

/// Reusable reassembly state for one reader.
///
/// Holds the header and prefix scratch arrays plus the growing body buffer, so
/// reading a frame allocates only when the body outgrows its capacity.
#[derive(Debug)]
pub struct ScratchBuffer {
    header: [u8; FrameHeader::SIZE],
    prefix: [u8; PREFIX_SIZE],
    body: BytesMut,
    max_message_size: usize,
}

impl ScratchBuffer {
    /// Scratch space with the default message ceiling.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Scratch space rejecting messages larger than `max_message_size` bytes
    /// (header included).
    pub fn with_limit(max_message_size: usize) -> Self {
        Self::from_buffer(BytesMut::with_capacity(FrameHeader::MAX_FRAME_LENGTH), max_message_size)
    }

    /// Wrap an existing buffer, e.g. one taken from a [`crate::BufferPool`].
    pub fn from_buffer(body: BytesMut, max_message_size: usize) -> Self {
        Self {
            header: [0; FrameHeader::SIZE],
            prefix: [0; PREFIX_SIZE],
            body,
            max_message_size,
        }
    }

    /// Configured ceiling.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Give back the body buffer.
    pub fn into_inner(self) -> BytesMut {
        self.body
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Read one logical frame, reassembling continuation packets.
///
/// Fragmented reads are fine; end of stream before the frame is complete is
/// [`ProtocolError::ConnectionDropped`].
pub fn read_frame<R: Read>(reader: &mut R, scratch: &mut ScratchBuffer) -> Result<Frame> {
    let ScratchBuffer { header: header_buf, prefix, body, max_message_size } = scratch;
    let limit = *max_message_size;

    fill(reader, header_buf, "frame header")?;
    let header = FrameHeader::from_bytes(header_buf.as_slice())?;

    let first = header.length();
    if usize::from(first) < FrameHeader::SIZE {
        return Err(ProtocolError::InvalidLength {
            field: "frame",
            value: first,
            minimum: FrameHeader::SIZE as u16,
        });
    }

    body.clear();
    body.put_slice(header_buf.as_slice());
    read_chunk(reader, body, usize::from(first) - FrameHeader::SIZE, "frame payload", limit)?;

    let mut packets = 0usize;
    if header.is_continued() {
        loop {
            fill(reader, prefix, "continuation length")?;
            let raw = u16::from_be_bytes(*prefix);
            let packet_length = raw & FrameHeader::LENGTH_MASK;

            if usize::from(packet_length) < PREFIX_SIZE {
                return Err(ProtocolError::InvalidLength {
                    field: "continuation packet",
                    value: packet_length,
                    minimum: PREFIX_SIZE as u16,
                });
            }

            let len = usize::from(packet_length) - PREFIX_SIZE;
            read_chunk(reader, body, len, "continuation packet", limit)?;
            trace!(prefix = raw, len, "read continuation packet");
            packets += 1;

            if raw & FrameHeader::CONTINUATION_BIT == 0 {
                break;
            }
        }
    }

    let wire = body.split().freeze();
    let payload = wire.slice(FrameHeader::SIZE..);

    debug!(
        correlation_id = header.correlation_id(),
        dss_type = header.dss_type_raw(),
        length = wire.len(),
        packets,
        "read frame"
    );

    Ok(Frame { header, payload })
}

/// Read frames until one arrives without the chained bit.
pub fn read_chain<R: Read>(reader: &mut R, scratch: &mut ScratchBuffer) -> Result<Vec<Frame>> {
    let mut chain = Vec::new();
    loop {
        let frame = read_frame(reader, scratch)?;
        let chained = frame.header.is_chained();
        chain.push(frame);
        if !chained {
            return Ok(chain);
        }
    }
}

fn read_chunk<R: Read>(
    reader: &mut R,
    body: &mut BytesMut,
    len: usize,
    context: &'static str,
    limit: usize,
) -> Result<()> {
    let start = body.len();
    if start + len > limit {
        return Err(ProtocolError::FrameTooLarge { size: start + len, max: limit });
    }

    body.resize(start + len, 0);
    fill(reader, &mut body[start..], context)
}

/// `read_exact` that reports how far it got before the stream ended.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8], context: &'static str) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                warn!(context, expected = buf.len(), received = filled, "connection dropped");
                return Err(ProtocolError::ConnectionDropped {
                    context,
                    expected: buf.len(),
                    received: filled,
                });
            },
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {},
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(ProtocolError::ConnectionDropped {
                    context,
                    expected: buf.len(),
                    received: filled,
                });
            },
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use hex_literal::hex;

    use super::*;
    use crate::flags::DssType;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn small_frame_written_unmodified() {
        let frame = Frame::request(1, Bytes::from_static(&[0xAA, 0xBB]));
        let wire = encode_frame(&frame);
        assert_eq!(&wire[..], &hex!("0008 D0 01 0001 AABB"));
    }

    #[test]
    fn empty_payload() {
        let frame = Frame::reply(9, Bytes::new());
        let wire = encode_frame(&frame);
        assert_eq!(&wire[..], &hex!("0006 D0 02 0009"));

        let decoded = read_frame(&mut Cursor::new(wire), &mut ScratchBuffer::new()).unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn largest_unsegmented_frame() {
        let frame = Frame::object(2, patterned(HEAD_FRAME_DATA));
        let wire = encode_frame(&frame);

        assert_eq!(wire.len(), FrameHeader::MAX_FRAME_LENGTH);
        assert_eq!(&wire[..2], &hex!("7FFF"));
        assert_eq!(continuation_packet_count(HEAD_FRAME_DATA), 0);
    }

    #[test]
    fn one_byte_over_spills_into_terminal_packet() {
        let payload = patterned(HEAD_FRAME_DATA + 1);
        let wire = encode_frame(&Frame::object(2, payload.clone()));

        assert_eq!(&wire[..2], &hex!("FFFF"));
        let tail = &wire[FrameHeader::MAX_FRAME_LENGTH..];
        assert_eq!(&tail[..2], &hex!("0003"));
        assert_eq!(tail[2], payload[HEAD_FRAME_DATA]);
        assert_eq!(tail.len(), 3);
    }

    #[test]
    fn exactly_full_final_packet_is_terminal() {
        // Remaining data fits a packet exactly: prefix 0x7FFF, no continuation bit
        let payload = patterned(HEAD_FRAME_DATA + MAX_PACKET_DATA);
        let wire = encode_frame(&Frame::object(2, payload.clone()));

        assert_eq!(continuation_packet_count(payload.len()), 1);
        let tail = &wire[FrameHeader::MAX_FRAME_LENGTH..];
        assert_eq!(&tail[..2], &hex!("7FFF"));
        assert_eq!(tail.len(), FrameHeader::MAX_FRAME_LENGTH);

        let decoded = read_frame(&mut Cursor::new(wire), &mut ScratchBuffer::new()).unwrap();
        assert_eq!(&decoded.payload[..], &payload[..]);
    }

    #[test]
    fn seventy_thousand_byte_payload() {
        let payload = patterned(70_000);
        let frame = Frame::object(3, payload.clone());
        let wire = encode_frame(&frame);

        // Head frame: 6 header + 32761 payload
        assert_eq!(&wire[..2], &hex!("FFFF"));
        let mut offset = FrameHeader::MAX_FRAME_LENGTH;

        // First continuation: full packet, more follows
        assert_eq!(&wire[offset..offset + 2], &hex!("FFFF"));
        offset += FrameHeader::MAX_FRAME_LENGTH;

        // Terminal packet carries the remaining 70000 - 32761 - 32765 bytes
        let last = 70_000 - HEAD_FRAME_DATA - MAX_PACKET_DATA;
        assert_eq!(last, 4_474);
        let prefix = u16::from_be_bytes([wire[offset], wire[offset + 1]]);
        assert_eq!(usize::from(prefix), last + PREFIX_SIZE);
        assert_eq!(wire.len(), offset + PREFIX_SIZE + last);
        assert_eq!(continuation_packet_count(70_000), 2);

        let decoded = read_frame(&mut Cursor::new(wire), &mut ScratchBuffer::new()).unwrap();
        assert_eq!(decoded.payload.len(), 70_000);
        assert_eq!(&decoded.payload[..], &payload[..]);
        assert!(decoded.header.is_continued());
        assert_eq!(decoded.header.dss_type(), Some(DssType::Object));
    }

    #[test]
    fn write_frame_flushes_every_piece() {
        struct Recorder {
            pieces: Vec<Vec<u8>>,
            pending: Vec<u8>,
        }

        impl Write for Recorder {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.pending.extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                self.pieces.push(std::mem::take(&mut self.pending));
                Ok(())
            }
        }

        let frame = Frame::object(3, patterned(70_000));
        let mut recorder = Recorder { pieces: Vec::new(), pending: Vec::new() };
        write_frame(&mut recorder, &frame, &mut BytesMut::new()).unwrap();

        let sizes: Vec<usize> = recorder.pieces.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![32_767, 32_767, 4_476]);
        assert_eq!(recorder.pieces.concat(), encode_frame(&frame).to_vec());
    }

    #[test]
    fn short_header_is_connection_drop() {
        let err = read_frame(&mut Cursor::new(hex!("0010 D0")), &mut ScratchBuffer::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ConnectionDropped { context: "frame header", expected: 6, received: 3 }
        ));
    }

    #[test]
    fn short_payload_is_connection_drop() {
        let err = read_frame(&mut Cursor::new(hex!("000A D0 01 0001 AABB")), &mut ScratchBuffer::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ConnectionDropped { context: "frame payload", expected: 4, received: 2 }
        ));
    }

    #[test]
    fn missing_continuation_prefix_is_connection_drop() {
        let wire = encode_frame(&Frame::object(1, patterned(40_000)));
        let truncated = wire.slice(..FrameHeader::MAX_FRAME_LENGTH + 1);

        let err = read_frame(&mut Cursor::new(truncated), &mut ScratchBuffer::new()).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ConnectionDropped { context: "continuation length", .. }
        ));
    }

    #[test]
    fn declared_length_below_header_rejected() {
        let err = read_frame(&mut Cursor::new(hex!("0004 D0 01 0001")), &mut ScratchBuffer::new())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidLength { field: "frame", value: 4, .. }));
    }

    #[test]
    fn bad_continuation_prefix_rejected() {
        let mut wire = BytesMut::new();
        wire.put_slice(&hex!("8006 D0 03 0001"));
        wire.put_u16(0x0001);

        let err = read_frame(&mut Cursor::new(wire.freeze()), &mut ScratchBuffer::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidLength { field: "continuation packet", value: 1, minimum: 2 }
        ));
    }

    #[test]
    fn message_ceiling_enforced() {
        let wire = encode_frame(&Frame::object(1, patterned(100_000)));
        let err =
            read_frame(&mut Cursor::new(wire), &mut ScratchBuffer::with_limit(50_000)).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { max: 50_000, .. }));
    }

    #[test]
    fn back_to_back_frames() {
        let mut wire = BytesMut::new();
        encode_frame_into(&Frame::request(1, Bytes::from_static(b"one")), &mut wire);
        encode_frame_into(&Frame::request(2, patterned(50_000)), &mut wire);
        encode_frame_into(&Frame::request(3, Bytes::from_static(b"three")), &mut wire);

        let mut cursor = Cursor::new(wire.freeze());
        let mut scratch = ScratchBuffer::new();
        let ids: Vec<u16> = (0..3)
            .map(|_| read_frame(&mut cursor, &mut scratch).unwrap().correlation_id())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn chain_read_stops_at_unchained_frame() {
        let chain = crate::ChainBuilder::new()
            .push(Frame::reply(1, Bytes::from_static(b"a")))
            .push(Frame::object(1, patterned(40_000)))
            .push(Frame::reply(2, Bytes::from_static(b"c")))
            .build();

        let mut wire = BytesMut::new();
        for frame in &chain {
            encode_frame_into(frame, &mut wire);
        }
        encode_frame_into(&Frame::reply(7, Bytes::from_static(b"next batch")), &mut wire);

        let mut cursor = Cursor::new(wire.freeze());
        let mut scratch = ScratchBuffer::new();
        let read = read_chain(&mut cursor, &mut scratch).unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read[1].payload.len(), 40_000);

        let next = read_frame(&mut cursor, &mut scratch).unwrap();
        assert_eq!(next.correlation_id(), 7);
    }
}
