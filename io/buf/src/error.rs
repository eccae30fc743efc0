use std::fmt;
use std::io;

/// Errors surfaced by buffer and stream operations.
#[derive(Debug)]
pub enum Error {
    /// The stream was exhausted before the requested bytes arrived.
    Eof,
    /// A deadline was reached during an operation.
    Timeout,
    /// A framing invariant was violated (bad magic, bad length, truncated
    /// deflate data, leftover compressed bytes).
    MalformedInput(String),
    /// A checksum comparison failed. The field names which value mismatched.
    ChecksumMismatch {
        field: &'static str,
        expected: u32,
        actual: u32,
    },
    /// A wrapped error from the external byte stream.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Eof => write!(f, "unexpected end of stream"),
            Error::Timeout => write!(f, "deadline reached"),
            Error::MalformedInput(msg) => write!(f, "malformed input: {msg}"),
            Error::ChecksumMismatch {
                field,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "{field}: actual 0x{actual:08x} != expected 0x{expected:08x}"
                )
            }
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Allows the `io::Read`/`io::Write` adapter views to surface core errors.
impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        match e {
            Error::Eof => io::Error::new(io::ErrorKind::UnexpectedEof, e),
            Error::Timeout => io::Error::new(io::ErrorKind::TimedOut, e),
            Error::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Error::Eof), "unexpected end of stream");
        assert_eq!(format!("{}", Error::Timeout), "deadline reached");
        assert_eq!(
            format!("{}", Error::MalformedInput("numberOfPairs > 1024".into())),
            "malformed input: numberOfPairs > 1024"
        );
        assert_eq!(
            format!(
                "{}",
                Error::ChecksumMismatch {
                    field: "ISIZE",
                    expected: 0x0d,
                    actual: 0x0e,
                }
            ),
            "ISIZE: actual 0x0000000e != expected 0x0000000d"
        );
    }

    #[test]
    fn test_io_round_trip() {
        let inner = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let err = Error::from(inner);
        assert!(matches!(err, Error::Io(_)));

        let back: io::Error = err.into();
        assert_eq!(back.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_into_io_error_kinds() {
        let eof: io::Error = Error::Eof.into();
        assert_eq!(eof.kind(), io::ErrorKind::UnexpectedEof);

        let timeout: io::Error = Error::Timeout.into();
        assert_eq!(timeout.kind(), io::ErrorKind::TimedOut);

        let bad: io::Error = Error::MalformedInput("nope".into()).into();
        assert_eq!(bad.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_is_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<Error>();
    }
}
