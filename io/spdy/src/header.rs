use std::fmt;

use io_buf::ByteString;

/// A single name/value pair from a decoded header block. Names are always
/// ASCII-lowercase.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Header {
    pub name: ByteString,
    pub value: ByteString,
}

impl Header {
    pub fn new(name: &str, value: &str) -> Header {
        Header {
            name: ByteString::encode_utf8(name),
            value: ByteString::encode_utf8(value),
        }
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name.utf8(), self.value.utf8()) {
            (Ok(name), Ok(value)) => write!(f, "{name}: {value}"),
            _ => write!(f, "{:?}: {:?}", self.name, self.value),
        }
    }
}
