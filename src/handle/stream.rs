//! Materialized read results.

use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom};

/// An independent copy of a handle's content
///
/// Owns its bytes outright; nothing a caller does to one stream is visible
/// to other readers or to the stored region.
#[derive(Debug, Clone)]
pub struct ContentStream {
    inner: Cursor<Vec<u8>>,
}

impl ContentStream {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.inner.get_ref()
    }

    /// Mutable access to the copy
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.inner.get_mut()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

impl Read for ContentStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for ContentStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

impl Seek for ContentStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
