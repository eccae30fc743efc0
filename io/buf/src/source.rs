//! Pull and push stream interfaces with explicit deadlines.
//!
//! A [`Source`] produces bytes into a caller-supplied [`Buffer`]; a
//! [`Sink`] consumes them from one. Every call carries a [`Deadline`].
//! Adapters bridge to [`std::io::Read`]/[`std::io::Write`] in both
//! directions, moving bytes directly between the external stream and
//! segment storage.

use std::io::{self, Read, Write};

use crate::buffer::Buffer;
use crate::deadline::Deadline;
use crate::error::Error;
use crate::segment::Segment;

/// A producer of bytes.
pub trait Source {
    /// Removes up to `byte_count` bytes from the stream and appends them to
    /// `sink`. Returns the number of bytes appended (at least one), or
    /// `None` when the stream is exhausted. Once `None` is returned, every
    /// later call must also return `None`.
    fn read(
        &mut self,
        sink: &mut Buffer,
        byte_count: u64,
        deadline: Deadline,
    ) -> Result<Option<u64>, Error>;

    /// Releases the underlying resource. Idempotent.
    fn close(&mut self, deadline: Deadline) -> Result<(), Error>;
}

/// A consumer of bytes.
pub trait Sink {
    /// Removes exactly `byte_count` bytes from `source` and writes them to
    /// the stream.
    ///
    /// # Panics
    ///
    /// Panics if `source` holds fewer than `byte_count` bytes.
    fn write(
        &mut self,
        source: &mut Buffer,
        byte_count: u64,
        deadline: Deadline,
    ) -> Result<(), Error>;

    /// Pushes buffered bytes to their final destination.
    fn flush(&mut self, deadline: Deadline) -> Result<(), Error>;

    /// Flushes and releases the underlying resource. Idempotent.
    fn close(&mut self, deadline: Deadline) -> Result<(), Error>;
}

/// Returns when `sink` holds at least `byte_count` bytes, reading from
/// `source` as needed. Fails with `Eof` if the source is exhausted first.
pub fn require<S: Source>(
    source: &mut S,
    sink: &mut Buffer,
    byte_count: u64,
    deadline: Deadline,
) -> Result<(), Error> {
    while sink.byte_count() < byte_count {
        if source
            .read(sink, Segment::SIZE as u64, deadline)?
            .is_none()
        {
            return Err(Error::Eof);
        }
    }
    Ok(())
}

/// Returns the index of `b` in `buffer`, refilling from `source` until it
/// is found. This reads an unbounded number of bytes into `buffer`.
pub fn seek<S: Source>(
    buffer: &mut Buffer,
    b: u8,
    source: &mut S,
    deadline: Deadline,
) -> Result<u64, Error> {
    let mut start = 0u64;
    loop {
        let index = buffer.index_of(b, start);
        if index != -1 {
            return Ok(index as u64);
        }
        start = buffer.byte_count();
        if source
            .read(buffer, Segment::SIZE as u64, deadline)?
            .is_none()
        {
            return Err(Error::Eof);
        }
    }
}

/// Reads and discards `byte_count` bytes from `source`, using `buffer` as
/// scratch space. Fails with `Eof` if the source is exhausted first.
pub fn skip_source<S: Source>(
    source: &mut S,
    buffer: &mut Buffer,
    byte_count: u64,
    deadline: Deadline,
) -> Result<(), Error> {
    let mut remaining = byte_count;
    while remaining > 0 {
        if buffer.is_empty()
            && source
                .read(buffer, Segment::SIZE as u64, deadline)?
                .is_none()
        {
            return Err(Error::Eof);
        }
        let to_skip = remaining.min(buffer.byte_count());
        buffer.skip(to_skip)?;
        remaining -= to_skip;
    }
    Ok(())
}

/// A [`Source`] over any [`io::Read`].
///
/// Each call performs one underlying read, straight into the sink's
/// writable segment.
pub struct StreamSource<R: Read> {
    reader: R,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> StreamSource<R> {
        StreamSource { reader }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Source for StreamSource<R> {
    fn read(
        &mut self,
        sink: &mut Buffer,
        byte_count: u64,
        deadline: Deadline,
    ) -> Result<Option<u64>, Error> {
        if byte_count == 0 {
            return Ok(Some(0));
        }
        deadline.check()?;
        let max = byte_count.min(Segment::SIZE as u64) as usize;
        let n = sink.fill_from(&mut self.reader, max)?;
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(n as u64))
        }
    }

    fn close(&mut self, _deadline: Deadline) -> Result<(), Error> {
        // Readers release their resource on drop.
        Ok(())
    }
}

/// A [`Sink`] over any [`io::Write`].
pub struct StreamSink<W: Write> {
    writer: W,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> StreamSink<W> {
        StreamSink { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for StreamSink<W> {
    fn write(
        &mut self,
        source: &mut Buffer,
        byte_count: u64,
        deadline: Deadline,
    ) -> Result<(), Error> {
        assert!(
            byte_count <= source.byte_count(),
            "write({}) exceeds buffered bytes ({})",
            byte_count,
            source.byte_count()
        );
        let mut remaining = byte_count;
        while remaining > 0 {
            deadline.check()?;
            let n = source.drain_to(&mut self.writer, remaining)?;
            remaining -= n as u64;
        }
        Ok(())
    }

    fn flush(&mut self, deadline: Deadline) -> Result<(), Error> {
        deadline.check()?;
        self.writer.flush()?;
        Ok(())
    }

    fn close(&mut self, deadline: Deadline) -> Result<(), Error> {
        self.flush(deadline)
    }
}

/// An [`io::Read`] view over a [`Source`], buffering at most one segment.
pub struct SourceReader<S: Source> {
    source: S,
    buffer: Buffer,
}

impl<S: Source> SourceReader<S> {
    pub fn new(source: S) -> SourceReader<S> {
        SourceReader {
            source,
            buffer: Buffer::new(),
        }
    }

    /// Like [`new`](SourceReader::new), but drains `buffer` before pulling
    /// from the source. Useful when a framing layer has already read ahead.
    pub fn with_buffer(source: S, buffer: Buffer) -> SourceReader<S> {
        SourceReader { source, buffer }
    }

    /// Returns the number of bytes that can be read without blocking.
    pub fn available(&self) -> u64 {
        self.buffer.byte_count()
    }

    pub fn close(&mut self) -> Result<(), Error> {
        self.buffer.clear();
        self.source.close(Deadline::NONE)
    }

    /// Returns the underlying source, discarding any buffered bytes.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: Source> Read for SourceReader<S> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        if self.buffer.is_empty() {
            match self.source.read(&mut self.buffer, Segment::SIZE as u64, Deadline::NONE) {
                Ok(Some(_)) => {}
                Ok(None) => return Ok(0),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(self.buffer.read_some(out))
    }
}

/// An [`io::Write`] view over a [`Sink`], buffering at most one segment.
pub struct SinkWriter<K: Sink> {
    sink: K,
    buffer: Buffer,
}

impl<K: Sink> SinkWriter<K> {
    pub fn new(sink: K) -> SinkWriter<K> {
        SinkWriter {
            sink,
            buffer: Buffer::new(),
        }
    }

    /// Flushes buffered bytes and closes the sink.
    pub fn close(&mut self) -> Result<(), Error> {
        let buffered = self.buffer.byte_count();
        self.sink.write(&mut self.buffer, buffered, Deadline::NONE)?;
        self.sink.close(Deadline::NONE)
    }

    /// Returns the underlying sink. Flush first; bytes still buffered here
    /// are discarded.
    pub fn into_inner(self) -> K {
        self.sink
    }
}

impl<K: Sink> Write for SinkWriter<K> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut offset = 0;
        while offset < data.len() {
            let room = Segment::SIZE - self.buffer.byte_count() as usize;
            let to_copy = (data.len() - offset).min(room);
            self.buffer.write(&data[offset..offset + to_copy]);
            offset += to_copy;
            if self.buffer.byte_count() as usize == Segment::SIZE {
                self.sink
                    .write(&mut self.buffer, Segment::SIZE as u64, Deadline::NONE)
                    .map_err(io::Error::from)?;
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let buffered = self.buffer.byte_count();
        self.sink
            .write(&mut self.buffer, buffered, Deadline::NONE)
            .map_err(io::Error::from)?;
        self.sink.flush(Deadline::NONE).map_err(io::Error::from)
    }
}
