//! io-buf - Segmented pooled buffers and deadline-aware streaming I/O.
//!
//! This crate owns all byte movement between sockets, compressors, and
//! protocol code: a [`Buffer`] backed by pooled fixed-size segments, the
//! [`Source`]/[`Sink`] stream abstraction, adapters to and from
//! [`std::io`], and decompressing sources for deflate and gzip data.
//!
//! # Design
//!
//! - **Segmented storage**: a buffer is a queue of 2 KiB segments from a
//!   process-wide pool. Growing never reallocates, and moving bytes
//!   between buffers splices whole segments instead of copying.
//! - **Explicit deadlines**: every blocking call takes a [`Deadline`].
//!   There is no hidden timeout state and no thread interruption.
//! - **Synchronous**: all I/O happens on the calling thread. Parallelism
//!   belongs to callers driving independent pipelines.
//!
//! # Example
//!
//! ```
//! use io_buf::Buffer;
//!
//! let mut buffer = Buffer::new();
//! buffer.write_utf8("hello world");
//! assert_eq!(buffer.index_of(b' ', 0), 5);
//! assert_eq!(buffer.read_byte_string(5).unwrap().as_slice(), b"hello");
//! ```
//!
//! Decompressing a gzip stream pulled from any `io::Read`:
//!
//! ```ignore
//! use io_buf::{Buffer, Deadline, GzipSource, Source, StreamSource};
//!
//! let mut gzip = GzipSource::new(StreamSource::new(socket));
//! let mut body = Buffer::new();
//! while gzip.read(&mut body, 8192, Deadline::NONE)?.is_some() {}
//! ```

mod buffer;
mod byte_string;
mod deadline;
mod error;
mod gzip;
mod inflate;
mod segment;
mod source;

pub mod pool;

pub use buffer::Buffer;
pub use byte_string::ByteString;
pub use deadline::Deadline;
pub use error::Error;
pub use gzip::GzipSource;
pub use inflate::{Inflater, InflaterSource};
pub use segment::Segment;
pub use source::{
    require, seek, skip_source, Sink, SinkWriter, Source, SourceReader, StreamSink, StreamSource,
};
