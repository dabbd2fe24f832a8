//! Shared recording writer.

use std::{
    io::{self, Write},
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Debug, Default)]
struct WireLog {
    bytes: Vec<u8>,
    writes: Vec<(usize, usize)>,
    flushes: usize,
}

/// Cloneable writer over one shared byte log.
///
/// Every clone appends to the same buffer. Each write is recorded as an
/// `(offset, len)` span so tests can check which writes landed where.
#[derive(Debug, Clone, Default)]
pub struct SharedWire {
    log: Arc<Mutex<WireLog>>,
}

impl SharedWire {
    /// Empty wire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.lock().map(|log| log.bytes.clone()).unwrap_or_default()
    }

    /// `(offset, len)` of every write in order.
    pub fn writes(&self) -> Vec<(usize, usize)> {
        self.lock().map(|log| log.writes.clone()).unwrap_or_default()
    }

    /// Number of flushes.
    pub fn flushes(&self) -> usize {
        self.lock().map_or(0, |log| log.flushes)
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, WireLog>> {
        self.log.lock().map_err(|_| io::Error::other("wire log poisoned"))
    }
}

impl Write for SharedWire {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut log = self.lock()?;
        let offset = log.bytes.len();
        log.bytes.extend_from_slice(buf);
        log.writes.push((offset, buf.len()));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_log() {
        let mut a = SharedWire::new();
        let mut b = a.clone();

        a.write_all(b"abc").unwrap();
        b.write_all(b"de").unwrap();
        b.flush().unwrap();

        assert_eq!(a.bytes(), b"abcde");
        assert_eq!(a.writes(), vec![(0, 3), (3, 2)]);
        assert_eq!(a.flushes(), 1);
    }
}
