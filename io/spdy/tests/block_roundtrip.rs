//! Encode-then-decode coverage for SPDY/3 name/value blocks.

use std::io;

use flate2::{Compress, Compression, FlushCompress};
use io_buf::{Buffer, Deadline, Error, StreamSource};
use spdy::dictionary::DICTIONARY;
use spdy::{Header, NameValueBlockReader};

/// Compresses name/value blocks the way a SPDY/3 peer would: one zlib
/// stream for the whole connection, dictionary-seeded, sync-flushed at
/// each block boundary so the compressed size is known per frame.
struct BlockEncoder {
    z: Compress,
}

impl BlockEncoder {
    fn new() -> BlockEncoder {
        let mut z = Compress::new(Compression::default(), true);
        z.set_dictionary(DICTIONARY).unwrap();
        BlockEncoder { z }
    }

    fn encode(&mut self, pairs: &[(&[u8], &[u8])]) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
        for (name, value) in pairs {
            payload.extend_from_slice(&(name.len() as u32).to_be_bytes());
            payload.extend_from_slice(name);
            payload.extend_from_slice(&(value.len() as u32).to_be_bytes());
            payload.extend_from_slice(value);
        }
        self.deflate(&payload)
    }

    /// Compresses a raw payload; used to hand-craft invalid blocks too.
    fn deflate(&mut self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut scratch = [0u8; 4096];
        let mut consumed = 0;
        while consumed < payload.len() {
            let before_in = self.z.total_in();
            let before_out = self.z.total_out();
            self.z
                .compress(&payload[consumed..], &mut scratch, FlushCompress::None)
                .unwrap();
            consumed += (self.z.total_in() - before_in) as usize;
            out.extend_from_slice(&scratch[..(self.z.total_out() - before_out) as usize]);
        }
        // Sync-flush so the block ends on a byte boundary.
        loop {
            let before_out = self.z.total_out();
            self.z
                .compress(&[], &mut scratch, FlushCompress::Sync)
                .unwrap();
            let produced = (self.z.total_out() - before_out) as usize;
            out.extend_from_slice(&scratch[..produced]);
            if produced < scratch.len() {
                break;
            }
        }
        out
    }
}

fn reader_over(bytes: Vec<u8>) -> NameValueBlockReader<StreamSource<io::Cursor<Vec<u8>>>> {
    NameValueBlockReader::new(Buffer::new(), StreamSource::new(io::Cursor::new(bytes)))
}

#[test]
fn round_trip_lowercases_names() {
    let mut encoder = BlockEncoder::new();
    let block = encoder.encode(&[
        (b"Host", b"example.com"),
        (b"User-Agent", b"ok/1"),
    ]);
    let length = block.len() as u64;

    let mut reader = reader_over(block);
    let headers = reader.read_name_value_block(length).unwrap();
    assert_eq!(
        headers,
        vec![
            Header::new("host", "example.com"),
            Header::new("user-agent", "ok/1"),
        ]
    );
}

#[test]
fn values_are_preserved_verbatim() {
    let mut encoder = BlockEncoder::new();
    let block = encoder.encode(&[(b"X-Mixed", b"CaSe \x00 bytes \xff kept")]);
    let length = block.len() as u64;

    let mut reader = reader_over(block);
    let headers = reader.read_name_value_block(length).unwrap();
    assert_eq!(headers[0].name.as_slice(), b"x-mixed");
    assert_eq!(headers[0].value.as_slice(), b"CaSe \x00 bytes \xff kept");
}

#[test]
fn multiple_blocks_share_one_zlib_stream() {
    let mut encoder = BlockEncoder::new();
    let first = encoder.encode(&[(b"Host", b"example.com")]);
    let second = encoder.encode(&[(b"Accept-Encoding", b"gzip")]);

    let mut stream = first.clone();
    stream.extend_from_slice(&second);
    let mut reader = reader_over(stream);

    let headers = reader.read_name_value_block(first.len() as u64).unwrap();
    assert_eq!(headers, vec![Header::new("host", "example.com")]);

    let headers = reader.read_name_value_block(second.len() as u64).unwrap();
    assert_eq!(headers, vec![Header::new("accept-encoding", "gzip")]);
}

#[test]
fn framing_remainder_is_drained_first() {
    let mut encoder = BlockEncoder::new();
    let block = encoder.encode(&[(b"Host", b"example.com")]);
    let length = block.len() as u64;

    // The framer read ahead: half the block is already buffered.
    let split = block.len() / 2;
    let mut buffered = Buffer::new();
    buffered.write(&block[..split]);
    let mut reader = NameValueBlockReader::new(
        buffered,
        StreamSource::new(io::Cursor::new(block[split..].to_vec())),
    );

    let headers = reader.read_name_value_block(length).unwrap();
    assert_eq!(headers, vec![Header::new("host", "example.com")]);
}

#[test]
fn too_many_pairs_is_rejected() {
    let mut encoder = BlockEncoder::new();
    let block = encoder.deflate(&1025u32.to_be_bytes());
    let length = block.len() as u64;

    let mut reader = reader_over(block);
    let err = reader.read_name_value_block(length).unwrap_err();
    assert!(matches!(err, Error::MalformedInput(msg) if msg.contains("1025")));
}

#[test]
fn negative_pair_count_is_rejected() {
    let mut encoder = BlockEncoder::new();
    let block = encoder.deflate(&0x8000_0001u32.to_be_bytes());
    let length = block.len() as u64;

    let mut reader = reader_over(block);
    assert!(matches!(
        reader.read_name_value_block(length),
        Err(Error::MalformedInput(_))
    ));
}

#[test]
fn empty_name_is_rejected() {
    let mut encoder = BlockEncoder::new();
    let block = encoder.encode(&[(b"", b"value")]);
    let length = block.len() as u64;

    let mut reader = reader_over(block);
    assert!(matches!(
        reader.read_name_value_block(length),
        Err(Error::MalformedInput(_))
    ));
}

#[test]
fn overstated_length_is_rejected() {
    // The frame claims two more compressed bytes than the stream holds;
    // the residue cannot be drained, so the block fails.
    let mut encoder = BlockEncoder::new();
    let block = encoder.encode(&[(b"Host", b"example.com")]);
    let length = block.len() as u64 + 2;

    let mut reader = reader_over(block);
    assert!(matches!(
        reader.read_name_value_block(length),
        Err(Error::MalformedInput(_))
    ));
}

#[test]
fn understated_length_starves_the_decoder() {
    // The frame claims only half the compressed bytes; the window closes
    // before the pairs can be decoded.
    let mut encoder = BlockEncoder::new();
    let block = encoder.encode(&[(b"Host", b"example.com")]);
    let length = block.len() as u64 / 2;

    let mut reader = reader_over(block);
    assert!(matches!(
        reader.read_name_value_block(length),
        Err(Error::MalformedInput(_)) | Err(Error::Eof)
    ));
}

#[test]
fn many_pairs_round_trip() {
    let names: Vec<Vec<u8>> = (0..1024).map(|i| format!("X-Header-{i}").into_bytes()).collect();
    let pairs: Vec<(&[u8], &[u8])> = names
        .iter()
        .map(|name| (name.as_slice(), b"value".as_slice()))
        .collect();

    let mut encoder = BlockEncoder::new();
    let block = encoder.encode(&pairs);
    let length = block.len() as u64;

    let mut reader = reader_over(block);
    let headers = reader.read_name_value_block(length).unwrap();
    assert_eq!(headers.len(), 1024);
    assert_eq!(headers[0].name.as_slice(), b"x-header-0");
    assert_eq!(headers[1023].name.as_slice(), b"x-header-1023");
}

#[test]
fn close_is_idempotent() {
    let mut reader = reader_over(Vec::new());
    reader.close(Deadline::NONE).unwrap();
    reader.close(Deadline::NONE).unwrap();
}
