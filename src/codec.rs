use std::io;
use std::io::{
    Read,
    Write,
};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// gzip a buffer.
pub fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len()), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Reverse [compress]. Fails on anything that is not a complete gzip stream.
pub fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out: Vec<u8> = vec!();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
