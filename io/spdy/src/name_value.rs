//! SPDY/3 name/value header block decoding.
//!
//! A header block arrives as a run of zlib-compressed bytes whose
//! compressed length is known from the framing but whose decompressed
//! length is not. All blocks on a connection share one zlib stream, seeded
//! with the SPDY/3 dictionary. Decoding is strict about which bytes enter
//! the decompressor: all of the block's compressed bytes, and no others.

use io_buf::{
    require, Buffer, ByteString, Deadline, Error, Inflater, InflaterSource, Source,
};

use crate::dictionary::DICTIONARY;
use crate::header::Header;

/// Blocks claiming more pairs than this are rejected outright.
const MAX_PAIRS: i32 = 1024;

/// A source that yields at most `limit` bytes before reporting EOF.
///
/// It drains the caller's framing buffer first (bytes the framer read past
/// the frame header), then pulls from the wrapped source. Every byte
/// delivered is debited from the limit, which the block reader tops up as
/// each frame announces its compressed length.
pub struct LimitedSource<S: Source> {
    remainder: Buffer,
    source: S,
    limit: u64,
}

impl<S: Source> LimitedSource<S> {
    fn new(remainder: Buffer, source: S) -> LimitedSource<S> {
        LimitedSource {
            remainder,
            source,
            limit: 0,
        }
    }

    /// Bytes still available to the current block.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn add_limit(&mut self, byte_count: u64) {
        self.limit += byte_count;
    }
}

impl<S: Source> Source for LimitedSource<S> {
    fn read(
        &mut self,
        sink: &mut Buffer,
        byte_count: u64,
        deadline: Deadline,
    ) -> Result<Option<u64>, Error> {
        if byte_count == 0 {
            return Ok(Some(0));
        }
        if self.limit == 0 {
            // Out of data for the current block.
            return Ok(None);
        }
        let byte_count = byte_count.min(self.limit);
        let read = if !self.remainder.is_empty() {
            let take = byte_count.min(self.remainder.byte_count());
            self.remainder.read_into(sink, take)?;
            take
        } else {
            match self.source.read(sink, byte_count, deadline)? {
                Some(n) => n,
                None => return Ok(None),
            }
        };
        self.limit -= read;
        Ok(Some(read))
    }

    fn close(&mut self, deadline: Deadline) -> Result<(), Error> {
        self.remainder.clear();
        self.source.close(deadline)
    }
}

/// Reads SPDY/3 name/value header blocks from a frame-oriented source.
///
/// Decompressed layout of a block:
///
/// ```text
/// numberOfPairs (u32)
/// repeated: nameLength (u32), name, valueLength (u32), value
/// ```
///
/// All integers are big-endian. Names are ASCII-lowercased as they are
/// read and must be non-empty.
pub struct NameValueBlockReader<S: Source> {
    /// This source transforms compressed bytes into uncompressed bytes.
    inflater_source: InflaterSource<LimitedSource<S>>,
    /// Holds inflated bytes between structured reads.
    inflated: Buffer,
}

impl<S: Source> NameValueBlockReader<S> {
    /// `source_buffer` holds bytes the framing layer already read past the
    /// frame header; they are consumed before `source` is touched.
    pub fn new(source_buffer: Buffer, source: S) -> NameValueBlockReader<S> {
        let limited = LimitedSource::new(source_buffer, source);
        let inflater = Inflater::zlib_with_dictionary(DICTIONARY);
        NameValueBlockReader {
            inflater_source: InflaterSource::new(limited, inflater),
            inflated: Buffer::new(),
        }
    }

    /// Decodes one block whose compressed size is `length` bytes.
    pub fn read_name_value_block(&mut self, length: u64) -> Result<Vec<Header>, Error> {
        self.inflater_source.get_mut().add_limit(length);

        require(&mut self.inflater_source, &mut self.inflated, 4, Deadline::NONE)?;
        let number_of_pairs = self.inflated.read_int()?;
        if number_of_pairs < 0 {
            return Err(Error::MalformedInput(format!(
                "numberOfPairs < 0: {number_of_pairs}"
            )));
        }
        if number_of_pairs > MAX_PAIRS {
            return Err(Error::MalformedInput(format!(
                "numberOfPairs > {MAX_PAIRS}: {number_of_pairs}"
            )));
        }

        let mut entries = Vec::with_capacity(number_of_pairs as usize);
        for _ in 0..number_of_pairs {
            let name = self.read_byte_string()?.to_ascii_lowercase();
            let value = self.read_byte_string()?;
            if name.is_empty() {
                return Err(Error::MalformedInput("name.length == 0".into()));
            }
            entries.push(Header { name, value });
        }

        self.done_reading()?;
        tracing::trace!(
            compressed = length,
            pairs = entries.len(),
            "decoded name/value block"
        );
        Ok(entries)
    }

    fn read_byte_string(&mut self) -> Result<ByteString, Error> {
        require(&mut self.inflater_source, &mut self.inflated, 4, Deadline::NONE)?;
        let length = self.inflated.read_int()?;
        if length < 0 {
            return Err(Error::MalformedInput(format!("length < 0: {length}")));
        }
        require(
            &mut self.inflater_source,
            &mut self.inflated,
            length as u64,
            Deadline::NONE,
        )?;
        self.inflated.read_byte_string(length as usize)
    }

    fn done_reading(&mut self) -> Result<(), Error> {
        // Deflate commonly leaves a byte or two of the block unread inside
        // the stream. Pull them through so the window closes at exactly
        // zero; anything the source cannot supply is a framing error.
        if self.inflater_source.get_ref().limit() > 0 {
            self.inflater_source.refill(Deadline::NONE)?;
            let left = self.inflater_source.get_ref().limit();
            if left != 0 {
                return Err(Error::MalformedInput(format!("compressedLimit > 0: {left}")));
            }
        }
        Ok(())
    }

    pub fn close(&mut self, deadline: Deadline) -> Result<(), Error> {
        self.inflater_source.close(deadline)
    }
}
