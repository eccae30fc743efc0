//! Immutable byte sequences.
//!
//! [`ByteString`] wraps [`bytes::Bytes`], so clones share the underlying
//! storage. Operations that would not change the content (such as
//! lowercasing an already-lowercase string) return a shared handle to the
//! original storage rather than a fresh allocation; this is observable
//! through pointer identity and relied on by header decoding.

use std::fmt;
use std::io::{self, Read, Write};

use bytes::Bytes;

use crate::error::Error;

/// An immutable sequence of bytes. Equality and hashing are by content.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteString(Bytes);

impl ByteString {
    /// The empty byte string.
    pub const fn empty() -> ByteString {
        ByteString(Bytes::new())
    }

    /// Copies `data` into a new byte string.
    pub fn of(data: &[u8]) -> ByteString {
        ByteString(Bytes::copy_from_slice(data))
    }

    /// Takes ownership of `data` without copying.
    pub fn from_vec(data: Vec<u8>) -> ByteString {
        ByteString(Bytes::from(data))
    }

    /// Encodes `s` as UTF-8, without a byte order mark.
    pub fn encode_utf8(s: &str) -> ByteString {
        ByteString(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Decodes the content as UTF-8.
    pub fn utf8(&self) -> Result<&str, Error> {
        std::str::from_utf8(&self.0)
            .map_err(|e| Error::MalformedInput(format!("invalid UTF-8: {e}")))
    }

    /// Lowercases bytes in `A..=Z`, leaving all others untouched.
    ///
    /// When no byte changes, the returned string shares this string's
    /// storage (no allocation).
    pub fn to_ascii_lowercase(&self) -> ByteString {
        match self.0.iter().position(|b| b.is_ascii_uppercase()) {
            None => self.clone(),
            Some(first) => {
                let mut data = self.0.to_vec();
                for b in &mut data[first..] {
                    b.make_ascii_lowercase();
                }
                ByteString(Bytes::from(data))
            }
        }
    }

    /// Returns true if the content equals the ASCII string `s` exactly.
    pub fn equals_ascii(&self, s: &str) -> bool {
        self.0.as_ref() == s.as_bytes()
    }

    /// Concatenates `parts` into a single byte string.
    pub fn concat(parts: &[ByteString]) -> ByteString {
        let total: usize = parts.iter().map(|p| p.len()).sum();
        let mut data = Vec::with_capacity(total);
        for part in parts {
            data.extend_from_slice(part.as_slice());
        }
        ByteString(Bytes::from(data))
    }

    /// Reads exactly `byte_count` bytes from `reader`.
    pub fn read<R: Read>(reader: &mut R, byte_count: usize) -> Result<ByteString, Error> {
        let mut data = vec![0u8; byte_count];
        read_fully(reader, &mut data)?;
        Ok(ByteString(Bytes::from(data)))
    }

    /// Reads exactly `byte_count` bytes from `reader`, lowercasing ASCII as
    /// it goes.
    pub fn read_lowercase<R: Read>(reader: &mut R, byte_count: usize) -> Result<ByteString, Error> {
        let mut data = vec![0u8; byte_count];
        read_fully(reader, &mut data)?;
        data.make_ascii_lowercase();
        Ok(ByteString(Bytes::from(data)))
    }

    /// Writes the content to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        writer.write_all(&self.0)?;
        Ok(())
    }
}

fn read_fully<R: Read>(reader: &mut R, data: &mut [u8]) -> Result<(), Error> {
    reader.read_exact(data).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::Eof,
        _ => Error::Io(e),
    })
}

impl AsRef<[u8]> for ByteString {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(data: Vec<u8>) -> ByteString {
        ByteString::from_vec(data)
    }
}

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) if !s.chars().any(char::is_control) => write!(f, "ByteString({s:?})"),
            _ => write!(f, "ByteString(0x{})", hex(&self.0)),
        }
    }
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}
