//! Frame-level connection over a split transport.
//!
//! # Concurrency
//!
//! Writes go through a [`FrameSender`], a cloneable handle around a mutex
//! that owns the writer half and its assembly buffer. A segmented message is
//! written in one critical section, so pieces of two messages never
//! interleave on the wire. Reads go through a single [`FrameReceiver`] owned
//! by one thread.
//!
//! # Failure
//!
//! The first error on either half marks the connection closed. Every later
//! call on any handle returns [`ConnectionError::Closed`] without touching the
//! transport. Reconnecting means building a new connection.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU16, Ordering},
};

use bytes::{Bytes, BytesMut};
use ddm_proto::{BufferPool, Frame, ScratchBuffer, read_chain, read_frame, write_frame};
use tracing::{debug, info, warn};

use crate::{
    config::SessionConfig,
    error::ConnectionError,
    transport::{Transport, TransportReader, TransportWriter},
};

struct WriteState<W> {
    writer: W,
    buf: BytesMut,
}

struct SenderShared<W> {
    state: Mutex<WriteState<W>>,
    next_correlation: AtomicU16,
}

/// Serialized writer handle. Clones share the same writer.
pub struct FrameSender<W> {
    shared: Arc<SenderShared<W>>,
    closed: Arc<AtomicBool>,
}

impl<W> Clone for FrameSender<W> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared), closed: Arc::clone(&self.closed) }
    }
}

impl<W: std::io::Write> FrameSender<W> {
    fn new(writer: W, buf: BytesMut, closed: Arc<AtomicBool>) -> Self {
        Self {
            shared: Arc::new(SenderShared {
                state: Mutex::new(WriteState { writer, buf }),
                next_correlation: AtomicU16::new(1),
            }),
            closed,
        }
    }

    /// Write one logical frame, segmenting it if needed.
    pub fn send(&self, frame: &Frame) -> Result<(), ConnectionError> {
        self.send_chain(std::slice::from_ref(frame))
    }

    /// Write several frames back to back under one lock.
    pub fn send_chain(&self, frames: &[Frame]) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }

        let mut guard = self.shared.state.lock().map_err(|_| {
            self.close();
            ConnectionError::WriterPoisoned
        })?;
        let WriteState { writer, buf } = &mut *guard;

        for frame in frames {
            if let Err(e) = write_frame(writer, frame, buf) {
                warn!(error = %e, correlation_id = frame.correlation_id(), "send failed, closing connection");
                self.close();
                return Err(e.into());
            }
        }

        Ok(())
    }

    /// Next request correlation id. Never returns 0.
    pub fn next_correlation_id(&self) -> u16 {
        loop {
            let id = self.shared.next_correlation.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Mark the connection closed for every handle.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether the connection has failed or been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn into_buffer(self) -> Option<BytesMut> {
        let shared = Arc::try_unwrap(self.shared).ok()?;
        let state = shared.state.into_inner().ok()?;
        Some(state.buf)
    }
}

/// Single-owner reader handle.
pub struct FrameReceiver<R> {
    reader: R,
    scratch: ScratchBuffer,
    closed: Arc<AtomicBool>,
}

impl<R: std::io::Read> FrameReceiver<R> {
    /// Read one logical frame, reassembling continuation packets.
    pub fn receive(&mut self) -> Result<Frame, ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }

        read_frame(&mut self.reader, &mut self.scratch).map_err(|e| self.fail(e.into()))
    }

    /// Read frames up to and including the first one without the chained
    /// flag.
    pub fn receive_chain(&mut self) -> Result<Vec<Frame>, ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }

        read_chain(&mut self.reader, &mut self.scratch).map_err(|e| self.fail(e.into()))
    }

    /// Whether the connection has failed or been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn fail(&self, err: ConnectionError) -> ConnectionError {
        if err.is_connection_dropped() {
            warn!(error = %err, "peer dropped connection");
        } else {
            warn!(error = %err, "receive failed, closing connection");
        }
        self.closed.store(true, Ordering::Release);
        err
    }
}

/// A DDM connection: one serialized writer, one reader.
pub struct Connection<R, W> {
    sender: FrameSender<W>,
    receiver: FrameReceiver<R>,
}

impl<R: std::io::Read, W: std::io::Write> Connection<R, W> {
    /// Wrap already-connected reader and writer halves.
    ///
    /// Both assembly buffers are taken from `pool`; give them back with
    /// [`Connection::release_into`].
    pub fn new(reader: R, writer: W, config: &SessionConfig, pool: &mut BufferPool) -> Self {
        let closed = Arc::new(AtomicBool::new(false));
        let scratch = ScratchBuffer::from_buffer(pool.acquire(), config.max_message_size);
        Self {
            sender: FrameSender::new(writer, pool.acquire(), Arc::clone(&closed)),
            receiver: FrameReceiver { reader, scratch, closed },
        }
    }

    /// Send one frame.
    pub fn send(&self, frame: &Frame) -> Result<(), ConnectionError> {
        self.sender.send(frame)
    }

    /// Send frames back to back without another writer slipping in between.
    pub fn send_chain(&self, frames: &[Frame]) -> Result<(), ConnectionError> {
        self.sender.send_chain(frames)
    }

    /// Receive one frame.
    pub fn receive(&mut self) -> Result<Frame, ConnectionError> {
        self.receiver.receive()
    }

    /// Receive a chain of frames.
    pub fn receive_chain(&mut self) -> Result<Vec<Frame>, ConnectionError> {
        self.receiver.receive_chain()
    }

    /// Send a request and wait for a single-frame reply.
    ///
    /// A reply carrying another correlation id is an error and closes the
    /// connection. A chained reply is read to its end and reported as
    /// [`ConnectionError::UnexpectedChain`]; the connection stays usable. Use
    /// [`Connection::request_chain`] when the host may answer with a chain.
    pub fn request(&mut self, payload: impl Into<Bytes>) -> Result<Frame, ConnectionError> {
        let mut chain = self.request_chain(payload)?;
        match chain.pop() {
            Some(reply) if chain.is_empty() => Ok(reply),
            _ => Err(ConnectionError::UnexpectedChain {
                correlation_id: chain.first().map_or(0, Frame::correlation_id),
                frames: chain.len() + 1,
            }),
        }
    }

    /// Send a request and read the whole reply chain.
    ///
    /// The first reply frame must carry the request's correlation id;
    /// otherwise the connection is closed.
    pub fn request_chain(
        &mut self,
        payload: impl Into<Bytes>,
    ) -> Result<Vec<Frame>, ConnectionError> {
        let id = self.sender.next_correlation_id();
        self.sender.send(&Frame::request(id, payload))?;

        let chain = self.receiver.receive_chain()?;
        let actual = chain.first().map_or(0, Frame::correlation_id);
        if actual != id {
            self.sender.close();
            return Err(ConnectionError::CorrelationMismatch { expected: id, actual });
        }

        debug!(
            correlation_id = id,
            frames = chain.len(),
            length = chain.iter().map(Frame::logical_length).sum::<usize>(),
            "request completed"
        );
        Ok(chain)
    }

    /// Another handle to the writer half, for use from other threads.
    pub fn sender(&self) -> FrameSender<W> {
        self.sender.clone()
    }

    /// Next request correlation id. Never returns 0.
    pub fn next_correlation_id(&self) -> u16 {
        self.sender.next_correlation_id()
    }

    /// Mark the connection closed.
    pub fn close(&self) {
        self.sender.close();
    }

    /// Whether the connection has failed or been closed.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Separate reader and writer handles.
    pub fn into_split(self) -> (FrameReceiver<R>, FrameSender<W>) {
        (self.receiver, self.sender)
    }

    /// Return the assembly buffers to `pool`.
    ///
    /// The writer buffer is only recovered when no other [`FrameSender`]
    /// clone is alive.
    pub fn release_into(self, pool: &mut BufferPool) {
        pool.release(self.receiver.scratch.into_inner());
        if let Some(buf) = self.sender.into_buffer() {
            pool.release(buf);
        }
    }
}

impl Connection<TransportReader, TransportWriter> {
    /// Open the transport named by `config` and wrap it.
    pub fn open(config: &SessionConfig, pool: &mut BufferPool) -> Result<Self, ConnectionError> {
        let transport = Transport::open(config)?;
        let conn = Self::from_transport(transport, config, pool)?;
        info!(kind = config.transport.as_str(), address = %config.address, "connection established");
        Ok(conn)
    }

    /// Wrap an already-open transport.
    pub fn from_transport(
        transport: Transport,
        config: &SessionConfig,
        pool: &mut BufferPool,
    ) -> Result<Self, ConnectionError> {
        let (reader, writer) = transport.split().map_err(ddm_proto::ProtocolError::from)?;
        Ok(Self::new(reader, writer, config, pool))
    }
}
