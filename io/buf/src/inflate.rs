//! A source that decompresses deflated bytes from another source.

use flate2::{Decompress, FlushDecompress, Status};

use crate::buffer::Buffer;
use crate::deadline::Deadline;
use crate::error::Error;
use crate::segment::Segment;
use crate::source::Source;

/// A streaming decompressor, optionally seeded with a preset dictionary
/// that is installed the first time the deflate stream demands it.
pub struct Inflater {
    raw: Decompress,
    dictionary: Option<Box<[u8]>>,
    dictionary_installed: bool,
}

struct InflateResult {
    consumed: usize,
    produced: usize,
    finished: bool,
}

impl Inflater {
    /// Decompresses a raw deflate stream (no zlib wrapper), as found inside
    /// gzip framing.
    pub fn raw() -> Inflater {
        Inflater {
            raw: Decompress::new(false),
            dictionary: None,
            dictionary_installed: false,
        }
    }

    /// Decompresses a zlib stream.
    pub fn zlib() -> Inflater {
        Inflater {
            raw: Decompress::new(true),
            dictionary: None,
            dictionary_installed: false,
        }
    }

    /// Decompresses a zlib stream whose deflate data was primed with
    /// `dictionary`.
    pub fn zlib_with_dictionary(dictionary: &[u8]) -> Inflater {
        Inflater {
            raw: Decompress::new(true),
            dictionary: Some(dictionary.into()),
            dictionary_installed: false,
        }
    }

    /// Total decompressed bytes produced over the life of this inflater.
    pub fn total_out(&self) -> u64 {
        self.raw.total_out()
    }

    /// Inflates from `input` into `output`, reporting exactly how many
    /// input bytes were consumed and output bytes produced. Installs the
    /// preset dictionary if the stream demands one; a second demand, or a
    /// demand with no dictionary configured, is an error.
    fn inflate(&mut self, input: &[u8], output: &mut [u8]) -> Result<InflateResult, Error> {
        let before_in = self.raw.total_in();
        let before_out = self.raw.total_out();

        let status = match self.raw.decompress(input, output, FlushDecompress::None) {
            Ok(status) => status,
            Err(e) if e.needs_dictionary().is_some() => {
                let dictionary = match (&self.dictionary, self.dictionary_installed) {
                    (Some(dictionary), false) => dictionary.clone(),
                    _ => {
                        return Err(Error::MalformedInput(
                            "deflate stream needs an unavailable dictionary".into(),
                        ))
                    }
                };
                self.raw
                    .set_dictionary(&dictionary)
                    .map_err(|_| Error::MalformedInput("preset dictionary rejected".into()))?;
                self.dictionary_installed = true;

                // Retry from where the first attempt stopped.
                let consumed = (self.raw.total_in() - before_in) as usize;
                match self.raw.decompress(&input[consumed..], output, FlushDecompress::None) {
                    Ok(status) => status,
                    Err(e) if e.needs_dictionary().is_some() => {
                        return Err(Error::MalformedInput(
                            "deflate stream still needs a dictionary".into(),
                        ))
                    }
                    Err(e) => {
                        return Err(Error::MalformedInput(format!("invalid deflate data: {e}")))
                    }
                }
            }
            Err(e) => return Err(Error::MalformedInput(format!("invalid deflate data: {e}"))),
        };

        Ok(InflateResult {
            consumed: (self.raw.total_in() - before_in) as usize,
            produced: (self.raw.total_out() - before_out) as usize,
            finished: matches!(status, Status::StreamEnd),
        })
    }
}

/// A [`Source`] that inflates compressed bytes read from another source.
///
/// The compressed staging buffer is deliberately shared with outer framers
/// (see [`GzipSource`](crate::GzipSource)): this source never discards
/// bytes the decompressor did not consume, so a framer can pick up exactly
/// where the deflate stream ended.
pub struct InflaterSource<S: Source> {
    pub(crate) source: S,
    pub(crate) buffer: Buffer,
    inflater: Inflater,
    closed: bool,
}

impl<S: Source> InflaterSource<S> {
    pub fn new(source: S, inflater: Inflater) -> InflaterSource<S> {
        InflaterSource {
            source,
            buffer: Buffer::new(),
            inflater,
            closed: false,
        }
    }

    /// Refills the compressed buffer with at most one segment of data when
    /// it is empty. Returns true if the underlying source is exhausted.
    pub fn refill(&mut self, deadline: Deadline) -> Result<bool, Error> {
        deadline.check()?;
        if !self.buffer.is_empty() {
            return Ok(false);
        }
        match self
            .source
            .read(&mut self.buffer, Segment::SIZE as u64, deadline)?
        {
            Some(n) => {
                tracing::trace!(bytes = n, "refilled compressed buffer");
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Total decompressed bytes produced so far.
    pub fn total_out(&self) -> u64 {
        self.inflater.total_out()
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Fills the compressed buffer with at least `byte_count` bytes drawn
    /// from the underlying source, bypassing the decompressor. Framers use
    /// this for the bytes around the deflate body.
    pub(crate) fn require_compressed(
        &mut self,
        byte_count: u64,
        deadline: Deadline,
    ) -> Result<(), Error> {
        crate::source::require(&mut self.source, &mut self.buffer, byte_count, deadline)
    }

    pub(crate) fn buffer_and_source(&mut self) -> (&mut Buffer, &mut S) {
        (&mut self.buffer, &mut self.source)
    }
}

impl<S: Source> Source for InflaterSource<S> {
    fn read(
        &mut self,
        sink: &mut Buffer,
        byte_count: u64,
        deadline: Deadline,
    ) -> Result<Option<u64>, Error> {
        if byte_count == 0 {
            return Ok(Some(0));
        }
        loop {
            let source_exhausted = self.refill(deadline)?;

            let result = {
                let tail = sink.writable_segment(1);
                let spare = tail.spare_mut();
                let cap = spare.len().min(byte_count as usize);
                let result = self.inflater.inflate(self.buffer.head(), &mut spare[..cap]);
                if let Ok(r) = &result {
                    tail.commit(r.produced);
                }
                result
            };
            let result = match result {
                Ok(r) => r,
                Err(e) => {
                    sink.drop_empty_tail();
                    return Err(e);
                }
            };

            if result.consumed > 0 {
                self.buffer.skip(result.consumed as u64)?;
            }
            if result.produced > 0 {
                sink.byte_count += result.produced as u64;
                return Ok(Some(result.produced as u64));
            }
            sink.drop_empty_tail();
            if result.finished {
                // Bytes past the end of the deflate stream stay in the
                // shared buffer for the outer framer.
                return Ok(None);
            }
            if source_exhausted && self.buffer.is_empty() {
                return Err(Error::MalformedInput("deflate stream truncated".into()));
            }
        }
    }

    fn close(&mut self, deadline: Deadline) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buffer.clear();
        self.source.close(deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StreamSource;
    use flate2::{Compress, Compression, FlushCompress};
    use std::io;

    fn deflate(data: &[u8], zlib: bool, dictionary: Option<&[u8]>) -> Vec<u8> {
        let mut z = Compress::new(Compression::default(), zlib);
        if let Some(dictionary) = dictionary {
            z.set_dictionary(dictionary).unwrap();
        }
        let mut out = Vec::new();
        let mut scratch = [0u8; 4096];
        let mut consumed = 0;
        loop {
            let before_in = z.total_in();
            let before_out = z.total_out();
            let flush = if consumed == data.len() {
                FlushCompress::Finish
            } else {
                FlushCompress::None
            };
            let status = z.compress(&data[consumed..], &mut scratch, flush).unwrap();
            consumed += (z.total_in() - before_in) as usize;
            out.extend_from_slice(&scratch[..(z.total_out() - before_out) as usize]);
            if matches!(status, Status::StreamEnd) {
                break;
            }
        }
        out
    }

    fn read_all<S: Source>(source: &mut S) -> Result<Vec<u8>, Error> {
        let mut buffer = Buffer::new();
        while source.read(&mut buffer, 4096, Deadline::NONE)?.is_some() {}
        let len = buffer.byte_count() as usize;
        Ok(buffer.read_byte_string(len)?.as_slice().to_vec())
    }

    fn sample(len: usize) -> Vec<u8> {
        // Mildly compressible, not constant.
        (0..len).map(|i| ((i / 7) % 256) as u8).collect()
    }

    #[test]
    fn test_raw_deflate_round_trip() {
        let data = sample(100_000);
        let compressed = deflate(&data, false, None);
        let mut source = InflaterSource::new(
            StreamSource::new(io::Cursor::new(compressed)),
            Inflater::raw(),
        );
        assert_eq!(read_all(&mut source).unwrap(), data);
        assert_eq!(source.total_out(), 100_000);
    }

    #[test]
    fn test_zlib_round_trip() {
        let data = sample(10_000);
        let compressed = deflate(&data, true, None);
        let mut source = InflaterSource::new(
            StreamSource::new(io::Cursor::new(compressed)),
            Inflater::zlib(),
        );
        assert_eq!(read_all(&mut source).unwrap(), data);
    }

    #[test]
    fn test_dictionary_installed_on_demand() {
        let dictionary = b"example.comtext/htmlcontent-type";
        let data = b"content-type: text/html; host: example.com";
        let compressed = deflate(data, true, Some(dictionary));

        let mut source = InflaterSource::new(
            StreamSource::new(io::Cursor::new(compressed)),
            Inflater::zlib_with_dictionary(dictionary),
        );
        assert_eq!(read_all(&mut source).unwrap(), data);
    }

    #[test]
    fn test_missing_dictionary_fails() {
        let dictionary = b"example.comtext/htmlcontent-type";
        let data = b"content-type: text/html; host: example.com";
        let compressed = deflate(data, true, Some(dictionary));

        let mut source = InflaterSource::new(
            StreamSource::new(io::Cursor::new(compressed)),
            Inflater::zlib(),
        );
        assert!(matches!(
            read_all(&mut source),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_truncated_stream_fails() {
        let data = sample(50_000);
        let mut compressed = deflate(&data, false, None);
        compressed.truncate(compressed.len() / 2);

        let mut source = InflaterSource::new(
            StreamSource::new(io::Cursor::new(compressed)),
            Inflater::raw(),
        );
        assert!(matches!(
            read_all(&mut source),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_stay_in_shared_buffer() {
        let data = sample(1000);
        let mut compressed = deflate(&data, false, None);
        compressed.extend_from_slice(b"TRAILER!");

        let mut source = InflaterSource::new(
            StreamSource::new(io::Cursor::new(compressed)),
            Inflater::raw(),
        );
        assert_eq!(read_all(&mut source).unwrap(), data);

        // The framing bytes after the deflate stream are still buffered.
        crate::source::require(
            &mut source.source,
            &mut source.buffer,
            8,
            Deadline::NONE,
        )
        .unwrap();
        assert_eq!(source.buffer.read_byte_string(8).unwrap().as_slice(), b"TRAILER!");
    }

    #[test]
    fn test_double_close_is_noop() {
        let mut source = InflaterSource::new(
            StreamSource::new(io::Cursor::new(Vec::new())),
            Inflater::raw(),
        );
        source.close(Deadline::NONE).unwrap();
        source.close(Deadline::NONE).unwrap();
    }
}
