//! Byte-stream transports.
//!
//! The set of transports is closed and picked once from
//! [`SessionConfig::transport`]:
//!
//! - **Local**: in-process pipe pair, used when client and server live in one
//!   process and by tests
//! - **Remote**: TCP socket
//! - **Native**: Unix domain socket to a server on the same machine
//!
//! A transport is split into a reader half and a writer half so a
//! [`crate::Connection`] can hand the writer to a mutex and keep the reader
//! on one thread.

use std::{
    io::{self, ErrorKind, Read, Write},
    net::TcpStream,
    sync::mpsc::{self, Receiver, Sender},
};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use tracing::debug;

use crate::{
    config::{SessionConfig, TransportKind},
    error::ConnectionError,
};

/// In-process pipe built on channels.
///
/// Each write becomes one message; reads drain messages in order and may
/// return less than a full message. Dropping the writer ends the stream.
#[derive(Debug)]
pub struct LocalPipe;

impl LocalPipe {
    /// Two connected endpoints. Bytes written to one are read from the other.
    pub fn pair() -> ((LocalReader, LocalWriter), (LocalReader, LocalWriter)) {
        let (a_tx, a_rx) = mpsc::channel();
        let (b_tx, b_rx) = mpsc::channel();
        (
            (LocalReader::new(b_rx), LocalWriter { tx: a_tx }),
            (LocalReader::new(a_rx), LocalWriter { tx: b_tx }),
        )
    }
}

/// Reading end of a [`LocalPipe`].
#[derive(Debug)]
pub struct LocalReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl LocalReader {
    fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self { rx, pending: Vec::new(), offset: 0 }
    }
}

impl Read for LocalReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.offset == self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                },
                // Peer gone
                Err(_) => return Ok(0),
            }
        }

        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        Ok(n)
    }
}

/// Writing end of a [`LocalPipe`].
#[derive(Debug, Clone)]
pub struct LocalWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for LocalWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "local pipe closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An open transport.
#[derive(Debug)]
pub enum Transport {
    /// In-process pipe endpoint
    Local(LocalReader, LocalWriter),
    /// TCP connection
    Remote(TcpStream),
    /// Unix domain socket
    #[cfg(unix)]
    Native(UnixStream),
}

impl Transport {
    /// Connect according to `config`.
    ///
    /// Applies the configured read and write timeouts. Local transports have
    /// no address to connect to; create them with [`Transport::local_pair`].
    pub fn open(config: &SessionConfig) -> Result<Self, ConnectionError> {
        let open_err = |source: io::Error| ConnectionError::Open {
            kind: config.transport.as_str(),
            address: config.address.clone(),
            source,
        };

        let transport = match config.transport {
            TransportKind::Local => {
                return Err(ConnectionError::Config(
                    "local transports are created in pairs, not opened".to_string(),
                ));
            },
            TransportKind::Remote => {
                let stream = TcpStream::connect(&config.address).map_err(open_err)?;
                stream.set_nodelay(true).map_err(open_err)?;
                stream.set_read_timeout(config.read_timeout()).map_err(open_err)?;
                stream.set_write_timeout(config.write_timeout()).map_err(open_err)?;
                Self::Remote(stream)
            },
            #[cfg(unix)]
            TransportKind::Native => {
                let stream = UnixStream::connect(&config.address).map_err(open_err)?;
                stream.set_read_timeout(config.read_timeout()).map_err(open_err)?;
                stream.set_write_timeout(config.write_timeout()).map_err(open_err)?;
                Self::Native(stream)
            },
            #[cfg(not(unix))]
            TransportKind::Native => {
                return Err(ConnectionError::Config(
                    "native transport requires Unix domain sockets".to_string(),
                ));
            },
        };

        debug!(kind = config.transport.as_str(), address = %config.address, "transport opened");
        Ok(transport)
    }

    /// Two connected local transports.
    pub fn local_pair() -> (Self, Self) {
        let ((ar, aw), (br, bw)) = LocalPipe::pair();
        (Self::Local(ar, aw), Self::Local(br, bw))
    }

    /// Which kind of transport this is.
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Local(..) => TransportKind::Local,
            Self::Remote(_) => TransportKind::Remote,
            #[cfg(unix)]
            Self::Native(_) => TransportKind::Native,
        }
    }

    /// Separate reader and writer halves.
    pub fn split(self) -> io::Result<(TransportReader, TransportWriter)> {
        match self {
            Self::Local(r, w) => Ok((TransportReader::Local(r), TransportWriter::Local(w))),
            Self::Remote(stream) => {
                let writer = stream.try_clone()?;
                Ok((TransportReader::Remote(stream), TransportWriter::Remote(writer)))
            },
            #[cfg(unix)]
            Self::Native(stream) => {
                let writer = stream.try_clone()?;
                Ok((TransportReader::Native(stream), TransportWriter::Native(writer)))
            },
        }
    }
}

/// Reader half of a [`Transport`].
#[derive(Debug)]
pub enum TransportReader {
    /// In-process pipe
    Local(LocalReader),
    /// TCP
    Remote(TcpStream),
    /// Unix domain socket
    #[cfg(unix)]
    Native(UnixStream),
}

impl Read for TransportReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Local(r) => r.read(buf),
            Self::Remote(s) => s.read(buf),
            #[cfg(unix)]
            Self::Native(s) => s.read(buf),
        }
    }
}

/// Writer half of a [`Transport`].
#[derive(Debug)]
pub enum TransportWriter {
    /// In-process pipe
    Local(LocalWriter),
    /// TCP
    Remote(TcpStream),
    /// Unix domain socket
    #[cfg(unix)]
    Native(UnixStream),
}

impl Write for TransportWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Local(w) => w.write(buf),
            Self::Remote(s) => s.write(buf),
            #[cfg(unix)]
            Self::Native(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Local(w) => w.flush(),
            Self::Remote(s) => s.flush(),
            #[cfg(unix)]
            Self::Native(s) => s.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_pipe_carries_bytes_both_ways() {
        let ((mut a_read, mut a_write), (mut b_read, mut b_write)) = LocalPipe::pair();

        a_write.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        b_read.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        b_write.write_all(b"pong").unwrap();
        a_read.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn local_reader_serves_partial_chunks() {
        let ((_, mut writer), (mut reader, _)) = LocalPipe::pair();
        writer.write_all(&[1, 2, 3, 4, 5]).unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [3, 4]);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5);
    }

    #[test]
    fn dropped_writer_is_eof() {
        let ((_, writer), (mut reader, _)) = LocalPipe::pair();
        drop(writer);

        let mut buf = [0u8; 1];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn dropped_reader_is_broken_pipe() {
        let ((_, mut writer), peer) = LocalPipe::pair();
        drop(peer);

        let err = writer.write_all(b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn local_config_cannot_be_opened() {
        let config = SessionConfig { transport: TransportKind::Local, ..SessionConfig::default() };
        assert!(matches!(Transport::open(&config), Err(ConnectionError::Config(_))));
    }

    #[test]
    fn remote_open_failure_names_address() {
        // Port 0 is never connectable
        let config = SessionConfig { address: "127.0.0.1:0".to_string(), ..SessionConfig::default() };
        match Transport::open(&config) {
            Err(ConnectionError::Open { kind, address, .. }) => {
                assert_eq!(kind, "remote");
                assert_eq!(address, "127.0.0.1:0");
            },
            other => panic!("expected open error, got {other:?}"),
        }
    }

    #[test]
    fn split_local_pair() {
        let (a, b) = Transport::local_pair();
        assert_eq!(a.kind(), TransportKind::Local);

        let (_, mut a_write) = a.split().unwrap();
        let (mut b_read, _) = b.split().unwrap();
        a_write.write_all(b"abc").unwrap();

        let mut buf = [0u8; 3];
        b_read.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
    }
}
