//! Segment View
//!
//! Cursor over a sub-range of a segment. Supports sequential `Read`/`Write`,
//! `Seek`, and positioned `read_at`/`write_at` that leave the cursor alone.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use super::Segment;

/// Random-access accessor bound to one byte range of a segment
#[derive(Debug)]
pub struct SegmentView {
    segment: Arc<Segment>,
    /// Absolute start of the range within the segment
    offset: usize,
    /// Length of the range
    len: usize,
    /// Cursor, relative to `offset`
    pos: usize,
}

impl SegmentView {
    pub(super) fn new(segment: Arc<Segment>, offset: usize, len: usize) -> Self {
        Self {
            segment,
            offset,
            len,
            pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }

    /// Read from `pos` (relative to the view) without moving the cursor
    ///
    /// Returns the number of bytes copied; 0 at or past the end.
    pub fn read_at(&self, pos: usize, buf: &mut [u8]) -> usize {
        if pos >= self.len {
            return 0;
        }
        let n = buf.len().min(self.len - pos);
        self.segment.read_at(self.offset + pos, &mut buf[..n]);
        n
    }

    /// Write at `pos` (relative to the view) without moving the cursor
    pub fn write_at(&self, pos: usize, data: &[u8]) -> usize {
        if pos >= self.len {
            return 0;
        }
        let n = data.len().min(self.len - pos);
        self.segment.write_at(self.offset + pos, &data[..n]);
        n
    }
}

impl Read for SegmentView {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(self.pos, buf);
        self.pos += n;
        Ok(n)
    }
}

impl Write for SegmentView {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let n = self.write_at(self.pos, data);
        self.pos += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SegmentView {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target: i128 = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::End(n) => self.len as i128 + n as i128,
            SeekFrom::Current(n) => self.pos as i128 + n as i128,
        };

        match target {
            t if t >= 0 && t <= usize::MAX as i128 => {
                self.pos = t as usize;
                Ok(self.pos as u64)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}
