//! LZ4 body compression/decompression.

use crate::types::error::{KarmaError, KarmaResult};

/// Compress snapshot body bytes with LZ4 (prepend size for decompression).
pub fn compress_body(body: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(body)
}

/// Decompress an LZ4-compressed snapshot body.
pub fn decompress_body(data: &[u8]) -> KarmaResult<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data).map_err(|e| KarmaError::Compression(e.to_string()))
}
