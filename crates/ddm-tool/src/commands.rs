//! Subcommand implementations.

use std::{
    fs::{self, File},
    io::{self, BufReader, Read, Write},
    path::PathBuf,
};

use bytes::BytesMut;
use ddm_core::{Connection, SessionConfig, TransportKind};
use ddm_proto::{
    BufferPool, DssType, Frame, FrameHeader, ProtocolError, ScratchBuffer,
    continuation_packet_count, read_frame, write_frame,
};
use tracing::info;

use crate::error::ToolError;

/// Writer that splits its input at every flush.
#[derive(Default)]
struct PieceLog {
    current: Vec<u8>,
    pieces: Vec<Vec<u8>>,
}

impl Write for PieceLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.current.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.current.is_empty() {
            self.pieces.push(std::mem::take(&mut self.current));
        }
        Ok(())
    }
}

/// Encode a payload and list the pieces `write_frame` emits.
pub fn segment(
    input: Option<PathBuf>,
    length: Option<usize>,
    output: Option<PathBuf>,
    correlation_id: u16,
    dss_type: DssType,
) -> Result<(), ToolError> {
    let payload: Vec<u8> = match input {
        Some(path) => fs::read(&path).map_err(|source| ToolError::Open { path, source })?,
        None => (0..length.unwrap_or(0)).map(|i| (i % 256) as u8).collect(),
    };
    let length = payload.len();
    let frame = Frame::new(FrameHeader::new(dss_type, correlation_id), payload);

    let mut log = PieceLog::default();
    write_frame(&mut log, &frame, &mut BytesMut::new())?;

    if let Some(path) = output {
        fs::write(&path, log.pieces.concat()).map_err(|source| ToolError::Open { path, source })?;
    }

    let mut out = io::stdout().lock();
    writeln!(
        out,
        "payload {length} bytes, {} continuation packet(s), {} wire bytes",
        continuation_packet_count(length),
        log.pieces.iter().map(Vec::len).sum::<usize>()
    )?;

    for (i, piece) in log.pieces.iter().enumerate() {
        if i == 0 {
            let header = FrameHeader::from_bytes(piece)?;
            writeln!(
                out,
                "  head     length={:#06x} continued={} data={} header={}",
                header.raw_length(),
                header.is_continued(),
                piece.len() - FrameHeader::SIZE,
                hex::encode(header.to_bytes())
            )?;
        } else {
            let prefix = u16::from_be_bytes([piece[0], piece[1]]);
            writeln!(
                out,
                "  packet {i:>2} prefix={prefix:#06x} continued={} data={}",
                prefix & FrameHeader::CONTINUATION_BIT != 0,
                piece.len() - 2
            )?;
        }
    }

    Ok(())
}

/// Decode frames from a capture until a clean end of stream.
pub fn inspect(
    input: Option<PathBuf>,
    dump: usize,
    max_message_size: Option<usize>,
) -> Result<(), ToolError> {
    let mut reader: Box<dyn Read> = match &input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).map_err(|source| ToolError::Open { path: path.clone(), source })?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let mut scratch = match max_message_size {
        Some(limit) => ScratchBuffer::with_limit(limit),
        None => ScratchBuffer::new(),
    };

    let mut out = io::stdout().lock();
    let mut count = 0usize;
    loop {
        let frame = match read_frame(&mut reader, &mut scratch) {
            Ok(frame) => frame,
            // End of stream on a frame boundary
            Err(ProtocolError::ConnectionDropped { received: 0, context: "frame header", .. }) => {
                break;
            },
            Err(e) => return Err(e.into()),
        };

        print_frame(&mut out, count, &frame, dump)?;
        count += 1;
    }

    writeln!(out, "{count} frame(s)")?;
    Ok(())
}

/// Send one request over the configured transport and print the reply chain.
pub fn send(
    config: Option<PathBuf>,
    address: Option<String>,
    transport: Option<TransportKind>,
    payload: &str,
    dump: usize,
) -> Result<(), ToolError> {
    let mut config = match config {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };
    if let Some(address) = address {
        config.address = address;
    }
    if let Some(transport) = transport {
        config.transport = transport;
    }
    config.validate()?;

    let payload = hex::decode(payload)?;

    let mut pool = BufferPool::new(config.pool_buffers, config.pool_buffer_capacity);
    let mut conn = Connection::open(&config, &mut pool)?;
    let chain = conn.request_chain(payload)?;
    info!(frames = chain.len(), "reply received");

    let mut out = io::stdout().lock();
    for (index, frame) in chain.iter().enumerate() {
        print_frame(&mut out, index, frame, dump)?;
    }

    conn.release_into(&mut pool);
    Ok(())
}

fn print_frame(out: &mut impl Write, index: usize, frame: &Frame, dump: usize) -> io::Result<()> {
    let header = &frame.header;
    let dss_type = match DssType::try_from(header.dss_type_raw()) {
        Ok(t) => format!("{t:?}"),
        Err(e) => format!("<{e}>"),
    };

    writeln!(
        out,
        "#{index} corr={} type={dss_type} gds={:#04x} chained={} same_corr={} cont_on_err={} length={} packets={}",
        header.correlation_id(),
        header.gds_id(),
        header.is_chained(),
        header.is_same_correlator(),
        header.is_continue_on_error(),
        frame.logical_length(),
        continuation_packet_count(frame.payload.len()),
    )?;

    if dump > 0 && !frame.payload.is_empty() {
        let shown = &frame.payload[..frame.payload.len().min(dump)];
        let ellipsis = if shown.len() < frame.payload.len() { " ..." } else { "" };
        writeln!(out, "    {}{ellipsis}", hex::encode(shown))?;
    }

    Ok(())
}
