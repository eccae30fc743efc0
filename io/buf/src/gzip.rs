//! A source that decodes RFC 1952 gzip framing.

use flate2::Crc;

use crate::buffer::Buffer;
use crate::deadline::Deadline;
use crate::error::Error;
use crate::inflate::{Inflater, InflaterSource};
use crate::source::Source;

const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;

/// The current section. Always progresses forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Body,
    Trailer,
    Done,
}

/// A [`Source`] that yields the decompressed body of a gzip member,
/// validating the header and trailer checksums as it goes.
///
/// The compressed buffer inside the [`InflaterSource`] is shared with this
/// framer: header reads may pull in bytes of the deflate body, which the
/// inflater picks up, and the inflater may pull in bytes of the trailer,
/// which this framer picks up. Reading to EOF guarantees that the body
/// CRC-32 and length were checked; closing early does not.
pub struct GzipSource<S: Source> {
    inflater_source: InflaterSource<S>,
    section: Section,
    /// Checksum used for both the header (when FHCRC is set) and the
    /// decompressed body.
    crc: Crc,
}

impl<S: Source> GzipSource<S> {
    pub fn new(source: S) -> GzipSource<S> {
        GzipSource {
            inflater_source: InflaterSource::new(source, Inflater::raw()),
            section: Section::Header,
            crc: Crc::new(),
        }
    }

    /// Reads the 10-byte header plus any optional fields, verifying the
    /// magic and (when present) the header CRC.
    ///
    /// ```text
    /// +---+---+---+---+---+---+---+---+---+---+
    /// |ID1|ID2|CM |FLG|     MTIME     |XFL|OS | (more-->)
    /// +---+---+---+---+---+---+---+---+---+---+
    /// ```
    fn consume_header(&mut self, deadline: Deadline) -> Result<(), Error> {
        // Peek the flags byte first so we know whether to CRC the header.
        self.inflater_source.require_compressed(10, deadline)?;
        let flags = self.inflater_source.buffer.get_byte(3);
        let fhcrc = flags & FHCRC != 0;
        if fhcrc {
            self.update_header_crc(10);
        }

        let id1id2 = self.inflater_source.buffer.read_short()? as u16;
        if id1id2 != 0x1f8b {
            return Err(Error::MalformedInput(format!(
                "not a gzip stream: 0x{id1id2:04x}"
            )));
        }
        self.inflater_source.buffer.skip(8)?;

        // Optional extra field, prefixed with a little-endian length.
        if flags & FEXTRA != 0 {
            self.inflater_source.require_compressed(2, deadline)?;
            if fhcrc {
                self.update_header_crc(2);
            }
            let xlen = self.inflater_source.buffer.read_short_le()? as u16 as u64;
            self.inflater_source.require_compressed(xlen, deadline)?;
            if fhcrc {
                self.update_header_crc(xlen);
            }
            self.inflater_source.buffer.skip(xlen)?;
        }

        // Optional zero-terminated file name.
        if flags & FNAME != 0 {
            let index = self.seek_zero(deadline)?;
            if fhcrc {
                self.update_header_crc(index + 1);
            }
            self.inflater_source.buffer.skip(index + 1)?;
        }

        // Optional zero-terminated comment.
        if flags & FCOMMENT != 0 {
            let index = self.seek_zero(deadline)?;
            if fhcrc {
                self.update_header_crc(index + 1);
            }
            self.inflater_source.buffer.skip(index + 1)?;
        }

        // Optional header CRC: the low 16 bits of the CRC-32 of all header
        // bytes so far.
        if fhcrc {
            self.inflater_source.require_compressed(2, deadline)?;
            let expected = self.inflater_source.buffer.read_short_le()? as u16 as u32;
            let actual = self.crc.sum() & 0xffff;
            if actual != expected {
                return Err(Error::ChecksumMismatch {
                    field: "FHCRC",
                    expected,
                    actual,
                });
            }
            self.crc.reset();
        }
        Ok(())
    }

    /// Reads the eight-byte trailer, confirming the body's CRC and size.
    ///
    /// ```text
    /// +---+---+---+---+---+---+---+---+
    /// |     CRC32     |     ISIZE     |
    /// +---+---+---+---+---+---+---+---+
    /// ```
    fn consume_trailer(&mut self, deadline: Deadline) -> Result<(), Error> {
        self.inflater_source.require_compressed(8, deadline)?;

        let expected = self.inflater_source.buffer.read_int_le()? as u32;
        let actual = self.crc.sum();
        if actual != expected {
            return Err(Error::ChecksumMismatch {
                field: "CRC",
                expected,
                actual,
            });
        }

        let expected = self.inflater_source.buffer.read_int_le()? as u32;
        let actual = self.inflater_source.total_out() as u32;
        if actual != expected {
            return Err(Error::ChecksumMismatch {
                field: "ISIZE",
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Scans the shared buffer for a NUL, refilling from the source.
    fn seek_zero(&mut self, deadline: Deadline) -> Result<u64, Error> {
        let (buffer, source) = self.inflater_source.buffer_and_source();
        crate::source::seek(buffer, 0, source, deadline)
    }

    /// Feeds the first `byte_count` buffered header bytes into the CRC.
    fn update_header_crc(&mut self, byte_count: u64) {
        let crc = &mut self.crc;
        self.inflater_source
            .buffer
            .for_each_range(0, byte_count, |chunk| crc.update(chunk));
    }
}

impl<S: Source> Source for GzipSource<S> {
    fn read(
        &mut self,
        sink: &mut Buffer,
        byte_count: u64,
        deadline: Deadline,
    ) -> Result<Option<u64>, Error> {
        if byte_count == 0 {
            return Ok(Some(0));
        }

        // The header must be consumed before anything else.
        if self.section == Section::Header {
            self.consume_header(deadline)?;
            self.section = Section::Body;
            tracing::trace!("gzip header consumed");
        }

        // Attempt to read at least a byte of the body.
        if self.section == Section::Body {
            let offset = sink.byte_count();
            if let Some(n) = self.inflater_source.read(sink, byte_count, deadline)? {
                let crc = &mut self.crc;
                sink.for_each_range(offset, n, |chunk| crc.update(chunk));
                return Ok(Some(n));
            }
            self.section = Section::Trailer;
        }

        // The body is exhausted. Always consume the trailer before
        // reporting EOF, so reading to the end checks the CRC.
        if self.section == Section::Trailer {
            self.consume_trailer(deadline)?;
            self.section = Section::Done;
            tracing::trace!("gzip trailer verified");
        }

        Ok(None)
    }

    fn close(&mut self, deadline: Deadline) -> Result<(), Error> {
        self.inflater_source.close(deadline)
    }
}
