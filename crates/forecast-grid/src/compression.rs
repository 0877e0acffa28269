//! Gzip-wrapped payloads.

use std::borrow::Cow;
use std::io::Read;

use signals_common::{SignalError, SignalResult};

/// Gzip member header.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Decompress gzip data.
pub fn decompress_gzip(data: &[u8]) -> SignalResult<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SignalError::Decode(format!("gzip: {}", e)))?;
    Ok(decompressed)
}

/// Inflate the payload if it is gzip-wrapped, otherwise borrow it.
pub fn maybe_inflate(data: &[u8]) -> SignalResult<Cow<'_, [u8]>> {
    if is_gzip(data) {
        decompress_gzip(data).map(Cow::Owned)
    } else {
        Ok(Cow::Borrowed(data))
    }
}
