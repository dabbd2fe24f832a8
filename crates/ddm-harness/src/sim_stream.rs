//! Seeded fragmenting stream.
//!
//! Every read returns between 1 and `max_chunk` bytes, chosen by a
//! `ChaCha8Rng` seeded from the builder, so a failing run replays exactly
//! from its seed.

use std::io::{self, ErrorKind, Read, Write};

use bytes::{Bytes, BytesMut};
use ddm_proto::{Frame, encode_frame_into};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Builder for [`SimStream`].
#[derive(Debug, Clone)]
pub struct SimStreamBuilder {
    seed: u64,
    input: BytesMut,
    max_chunk: usize,
    drop_after: Option<usize>,
    interrupt_rate: f64,
    fail_writes_after: Option<usize>,
}

impl SimStreamBuilder {
    /// Start a builder with the given RNG seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            input: BytesMut::new(),
            max_chunk: usize::MAX,
            drop_after: None,
            interrupt_rate: 0.0,
            fail_writes_after: None,
        }
    }

    /// Append raw bytes to what the stream will deliver.
    pub fn input(mut self, bytes: &[u8]) -> Self {
        self.input.extend_from_slice(bytes);
        self
    }

    /// Append the wire encoding of `frame`.
    pub fn frame(mut self, frame: &Frame) -> Self {
        encode_frame_into(frame, &mut self.input);
        self
    }

    /// Upper bound on bytes returned by a single read. Clamped to at least 1.
    pub fn max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }

    /// End the stream after `n` bytes, even if more input was supplied.
    pub fn drop_after(mut self, n: usize) -> Self {
        self.drop_after = Some(n);
        self
    }

    /// Probability that a read fails with `Interrupted` instead of returning
    /// data.
    pub fn interrupt_rate(mut self, rate: f64) -> Self {
        self.interrupt_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Fail writes with `BrokenPipe` once `n` bytes have been accepted.
    pub fn fail_writes_after(mut self, n: usize) -> Self {
        self.fail_writes_after = Some(n);
        self
    }

    /// Build the stream.
    pub fn build(self) -> SimStream {
        let input = self.input.freeze();
        let limit = self.drop_after.map_or(input.len(), |n| n.min(input.len()));
        SimStream {
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            input,
            pos: 0,
            limit,
            max_chunk: self.max_chunk,
            interrupt_rate: self.interrupt_rate,
            fail_writes_after: self.fail_writes_after,
            written: Vec::new(),
            flushes: 0,
            reads: 0,
        }
    }
}

/// In-memory stream with seeded fragmentation.
#[derive(Debug)]
pub struct SimStream {
    rng: ChaCha8Rng,
    input: Bytes,
    pos: usize,
    limit: usize,
    max_chunk: usize,
    interrupt_rate: f64,
    fail_writes_after: Option<usize>,
    written: Vec<u8>,
    flushes: usize,
    reads: usize,
}

impl SimStream {
    /// Shorthand for a stream that delivers `input` in chunks of at most
    /// `max_chunk` bytes.
    pub fn fragmented(seed: u64, input: &[u8], max_chunk: usize) -> Self {
        SimStreamBuilder::new(seed).input(input).max_chunk(max_chunk).build()
    }

    /// Bytes written to the stream so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Number of `flush` calls.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Number of reads that returned data.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Input bytes not yet delivered (before the drop point).
    pub fn remaining(&self) -> usize {
        self.limit - self.pos
    }
}

impl Read for SimStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.pos == self.limit {
            if self.limit < self.input.len() {
                trace!(pos = self.pos, "simulated connection drop");
            }
            return Ok(0);
        }

        if self.interrupt_rate > 0.0 && self.rng.gen_bool(self.interrupt_rate) {
            return Err(io::Error::new(ErrorKind::Interrupted, "simulated interrupt"));
        }

        let chunk = self.rng.gen_range(1..=self.max_chunk.min(buf.len()));
        let n = chunk.min(self.limit - self.pos);
        buf[..n].copy_from_slice(&self.input[self.pos..self.pos + n]);
        self.pos += n;
        self.reads += 1;
        Ok(n)
    }
}

impl Write for SimStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(max) = self.fail_writes_after {
            if self.written.len() >= max {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "simulated write failure"));
            }
            let n = buf.len().min(max - self.written.len());
            self.written.extend_from_slice(&buf[..n]);
            return Ok(n);
        }

        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
