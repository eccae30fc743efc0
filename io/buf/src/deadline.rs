//! Explicit expiry times for blocking I/O.
//!
//! Every `Source` and `Sink` call carries a [`Deadline`]; there is no hidden
//! timeout state and no thread interruption. Cancellation is expressed by
//! passing an already-elapsed deadline or by closing the underlying stream.

use std::time::{Duration, Instant};

use crate::error::Error;

/// A monotonic point in time after which blocking operations fail with
/// [`Error::Timeout`].
///
/// Deadline expiry never corrupts buffer state: bytes transferred before the
/// expiry remain in place, and a caller may continue using the buffers after
/// a `Timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires.
    pub const NONE: Deadline = Deadline(None);

    /// A deadline at the given instant.
    pub fn at(instant: Instant) -> Deadline {
        Deadline(Some(instant))
    }

    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Deadline {
        Deadline(Some(Instant::now() + timeout))
    }

    /// Returns an error if the deadline has been reached.
    pub fn check(&self) -> Result<(), Error> {
        match self.0 {
            Some(instant) if Instant::now() >= instant => Err(Error::Timeout),
            _ => Ok(()),
        }
    }
}
