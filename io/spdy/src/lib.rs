//! spdy - SPDY/3 compressed header block decoding.
//!
//! SPDY/3 carries request and response headers as name/value blocks:
//! zlib-compressed pair lists seeded with a protocol-wide preset
//! dictionary. The compressed size of each block is known from the frame
//! header, the decompressed size is not, and all blocks on a connection
//! share a single zlib stream.
//!
//! This crate provides:
//!
//! - `dictionary`: the SPDY/3 dictionary constant
//! - [`Header`]: a decoded name/value pair
//! - [`NameValueBlockReader`]: the strict, window-bounded block decoder
//!
//! Byte movement and decompression come from the `io-buf` crate.

pub mod dictionary;

mod header;
mod name_value;

pub use header::Header;
pub use name_value::{LimitedSource, NameValueBlockReader};
