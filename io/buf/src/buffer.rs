//! A growable sequence of bytes stored in pooled segments.
//!
//! Unlike a contiguous byte vector, a [`Buffer`] never reallocates or moves
//! data when it grows: it links more segments from the pool. Moving data
//! between buffers splices whole segments in O(1); only the split tails at
//! range boundaries are copied.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::byte_string::ByteString;
use crate::error::Error;
use crate::pool;
use crate::segment::Segment;

/// An ordered byte sequence held as a queue of pooled segments.
///
/// The front segment holds the oldest byte. A buffer is single-owner; share
/// across threads only with external synchronization. Dropping a buffer
/// returns its segments to the pool.
#[derive(Debug, Default)]
pub struct Buffer {
    pub(crate) segments: VecDeque<Segment>,
    pub(crate) byte_count: u64,
}

impl Buffer {
    pub fn new() -> Buffer {
        Buffer {
            segments: VecDeque::new(),
            byte_count: 0,
        }
    }

    /// Returns the number of readable bytes.
    #[inline]
    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.byte_count == 0
    }

    /// Discards all content, recycling the segments.
    pub fn clear(&mut self) {
        while let Some(segment) = self.segments.pop_front() {
            pool::recycle(segment);
        }
        self.byte_count = 0;
    }

    /// Returns a tail segment with at least `min_writable` spare bytes,
    /// linking a fresh pooled segment if the current tail is too full.
    ///
    /// Callers appending through the returned segment must keep
    /// `byte_count` in sync; the write methods below do this.
    pub(crate) fn writable_segment(&mut self, min_writable: usize) -> &mut Segment {
        assert!(
            min_writable <= Segment::SIZE,
            "min_writable {} exceeds segment size",
            min_writable
        );
        let needs_new = match self.segments.back() {
            Some(tail) => tail.writable() < min_writable,
            None => true,
        };
        if needs_new {
            self.segments.push_back(pool::take());
        }
        self.segments.back_mut().unwrap()
    }

    /// Returns the live range of the front segment, or an empty slice.
    pub(crate) fn head(&self) -> &[u8] {
        self.segments.front().map(Segment::as_slice).unwrap_or(&[])
    }

    // Writes. These never fail: storage always comes from the pool.

    /// Appends `data`, copying it into as many segments as needed.
    pub fn write(&mut self, data: &[u8]) {
        let mut offset = 0;
        while offset < data.len() {
            let tail = self.writable_segment(1);
            let to_copy = (data.len() - offset).min(tail.writable());
            tail.spare_mut()[..to_copy].copy_from_slice(&data[offset..offset + to_copy]);
            tail.commit(to_copy);
            offset += to_copy;
        }
        self.byte_count += data.len() as u64;
    }

    pub fn write_byte(&mut self, b: u8) {
        self.write(&[b]);
    }

    pub fn write_short(&mut self, v: i16) {
        self.write(&v.to_be_bytes());
    }

    pub fn write_short_le(&mut self, v: i16) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_int(&mut self, v: i32) {
        self.write(&v.to_be_bytes());
    }

    pub fn write_int_le(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_long(&mut self, v: i64) {
        self.write(&v.to_be_bytes());
    }

    pub fn write_long_le(&mut self, v: i64) {
        self.write(&v.to_le_bytes());
    }

    /// Appends `s` encoded as UTF-8, without a byte order mark.
    pub fn write_utf8(&mut self, s: &str) {
        self.write(s.as_bytes());
    }

    pub fn write_byte_string(&mut self, byte_string: &ByteString) {
        self.write(byte_string.as_slice());
    }

    // Reads. All fail with `Error::Eof` when fewer bytes than requested
    // remain.

    pub fn read_byte(&mut self) -> Result<u8, Error> {
        let head = self.segments.front_mut().ok_or(Error::Eof)?;
        let b = head.as_slice()[0];
        head.consume(1);
        self.byte_count -= 1;
        if head.readable() == 0 {
            pool::recycle(self.segments.pop_front().unwrap());
        }
        Ok(b)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        if self.byte_count < N as u64 {
            return Err(Error::Eof);
        }
        let mut out = [0u8; N];
        for slot in out.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(out)
    }

    pub fn read_short(&mut self) -> Result<i16, Error> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_short_le(&mut self) -> Result<i16, Error> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_int(&mut self) -> Result<i32, Error> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_int_le(&mut self) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_long(&mut self) -> Result<i64, Error> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    pub fn read_long_le(&mut self) -> Result<i64, Error> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Removes `byte_count` bytes and returns them as an immutable string.
    pub fn read_byte_string(&mut self, byte_count: usize) -> Result<ByteString, Error> {
        let mut data = vec![0u8; byte_count];
        self.read_slice(&mut data)?;
        Ok(ByteString::from_vec(data))
    }

    /// Removes `byte_count` bytes and decodes them as UTF-8.
    pub fn read_utf8(&mut self, byte_count: usize) -> Result<String, Error> {
        let mut data = vec![0u8; byte_count];
        self.read_slice(&mut data)?;
        String::from_utf8(data).map_err(|e| Error::MalformedInput(format!("invalid UTF-8: {e}")))
    }

    /// Fills `dest` exactly, failing with `Eof` if the buffer is short.
    pub fn read_slice(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        if self.byte_count < dest.len() as u64 {
            return Err(Error::Eof);
        }
        let mut offset = 0;
        while offset < dest.len() {
            offset += self.read_some(&mut dest[offset..]);
        }
        Ok(())
    }

    /// Copies up to `dest.len()` bytes out of the front segment only.
    /// Returns the number of bytes copied (zero when the buffer is empty).
    pub fn read_some(&mut self, dest: &mut [u8]) -> usize {
        let Some(head) = self.segments.front_mut() else {
            return 0;
        };
        let to_copy = head.readable().min(dest.len());
        dest[..to_copy].copy_from_slice(&head.as_slice()[..to_copy]);
        head.consume(to_copy);
        self.byte_count -= to_copy as u64;
        if head.readable() == 0 {
            pool::recycle(self.segments.pop_front().unwrap());
        }
        to_copy
    }

    /// Returns the byte at `index` without consuming it.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn get_byte(&self, index: u64) -> u8 {
        assert!(
            index < self.byte_count,
            "index {} out of range ({} bytes)",
            index,
            self.byte_count
        );
        let mut offset = 0u64;
        for segment in &self.segments {
            let len = segment.readable() as u64;
            if index < offset + len {
                return segment.as_slice()[(index - offset) as usize];
            }
            offset += len;
        }
        unreachable!("byte_count out of sync with segments");
    }

    /// Discards `byte_count` bytes from the front, recycling emptied
    /// segments.
    pub fn skip(&mut self, byte_count: u64) -> Result<(), Error> {
        if byte_count > self.byte_count {
            return Err(Error::Eof);
        }
        self.byte_count -= byte_count;
        let mut remaining = byte_count;
        while remaining > 0 {
            let head = self.segments.front_mut().unwrap();
            let to_skip = remaining.min(head.readable() as u64) as usize;
            head.consume(to_skip);
            remaining -= to_skip as u64;
            if head.readable() == 0 {
                pool::recycle(self.segments.pop_front().unwrap());
            }
        }
        Ok(())
    }

    /// Moves `byte_count` bytes from this buffer to the end of `sink`.
    ///
    /// Whole segments are spliced without copying; at most the two segments
    /// at the range boundaries are copied. A moved segment whose bytes fit
    /// the spare capacity of `sink`'s tail is compacted into it instead, so
    /// chains of tiny segments don't accumulate.
    pub fn read_into(&mut self, sink: &mut Buffer, byte_count: u64) -> Result<(), Error> {
        if byte_count > self.byte_count {
            return Err(Error::Eof);
        }
        let mut remaining = byte_count;
        while remaining > 0 {
            let head_readable = self.segments.front().unwrap().readable() as u64;
            if head_readable <= remaining {
                // The whole head segment moves.
                let segment = self.segments.pop_front().unwrap();
                self.byte_count -= head_readable;
                remaining -= head_readable;
                match sink.segments.back_mut() {
                    Some(tail) if tail.writable() >= segment.readable() => {
                        let n = segment.readable();
                        tail.spare_mut()[..n].copy_from_slice(segment.as_slice());
                        tail.commit(n);
                        pool::recycle(segment);
                    }
                    _ => sink.segments.push_back(segment),
                }
                sink.byte_count += head_readable;
            } else {
                // Boundary split: copy only the moved prefix; the head
                // segment keeps the rest.
                let to_copy = remaining as usize;
                let head = self.segments.front_mut().unwrap();
                sink.write(&head.as_slice()[..to_copy]);
                head.consume(to_copy);
                self.byte_count -= remaining;
                remaining = 0;
            }
        }
        Ok(())
    }

    /// Returns the index of the first occurrence of `b` at or after
    /// `start`, or `-1` if absent.
    pub fn index_of(&self, b: u8, start: u64) -> i64 {
        let mut offset = 0u64;
        for segment in &self.segments {
            let len = segment.readable() as u64;
            if start < offset + len {
                let begin = start.saturating_sub(offset) as usize;
                if let Some(i) = segment.as_slice()[begin..].iter().position(|&x| x == b) {
                    return (offset + (begin + i) as u64) as i64;
                }
            }
            offset += len;
        }
        -1
    }

    /// Visits the live byte ranges covering `[offset, offset + byte_count)`
    /// segment by segment, without copying.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the buffered bytes.
    pub fn for_each_range<F: FnMut(&[u8])>(&self, offset: u64, byte_count: u64, mut f: F) {
        assert!(
            offset + byte_count <= self.byte_count,
            "range {}..{} out of bounds ({} bytes)",
            offset,
            offset + byte_count,
            self.byte_count
        );
        let mut skip = offset;
        let mut remaining = byte_count;
        for segment in &self.segments {
            if remaining == 0 {
                break;
            }
            let len = segment.readable() as u64;
            if skip >= len {
                skip -= len;
                continue;
            }
            let begin = skip as usize;
            let take = ((len - skip).min(remaining)) as usize;
            f(&segment.as_slice()[begin..begin + take]);
            remaining -= take as u64;
            skip = 0;
        }
    }

    /// Reads up to `max` bytes from `reader` directly into the spare
    /// capacity of the tail segment. Returns the count reported by the
    /// reader; zero means the reader is exhausted.
    pub(crate) fn fill_from<R: Read>(&mut self, reader: &mut R, max: usize) -> io::Result<usize> {
        let tail = self.writable_segment(1);
        let max = max.min(tail.writable());
        let n = reader.read(&mut tail.spare_mut()[..max])?;
        tail.commit(n);
        self.byte_count += n as u64;
        // A read of zero may have linked a speculative empty tail.
        if n == 0 {
            if let Some(tail) = self.segments.back() {
                if tail.readable() == 0 {
                    pool::recycle(self.segments.pop_back().unwrap());
                }
            }
        }
        Ok(n)
    }

    /// Writes up to `max` bytes from the front segment to `writer` in one
    /// call, recycling the segment if it empties. Returns the bytes
    /// written; zero when the buffer is empty.
    pub(crate) fn drain_to<W: Write>(&mut self, writer: &mut W, max: u64) -> io::Result<usize> {
        let Some(head) = self.segments.front_mut() else {
            return Ok(0);
        };
        let to_copy = (head.readable() as u64).min(max) as usize;
        writer.write_all(&head.as_slice()[..to_copy])?;
        head.consume(to_copy);
        self.byte_count -= to_copy as u64;
        if head.readable() == 0 {
            pool::recycle(self.segments.pop_front().unwrap());
        }
        Ok(to_copy)
    }

    /// Pops the tail segment if a speculative write left it empty.
    pub(crate) fn drop_empty_tail(&mut self) {
        if let Some(tail) = self.segments.back() {
            if tail.readable() == 0 {
                pool::recycle(self.segments.pop_back().unwrap());
            }
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.clear();
    }
}
