//! # zlib Compression Helpers
//!
//! Single-shot deflate/inflate used for the gzipped book-keeping blobs
//! and any attribute data stored compressed. Three entry points:
//!
//! - [`gzip`]: deflate at the default level; fails unless the stream
//!   finishes with the input fully consumed.
//! - [`gunzip_fixed`]: inflate into a caller buffer of known capacity;
//!   fails unless the stream ends cleanly inside the buffer.
//! - [`gunzip_streaming`]: inflate a stream of unknown inflated size
//!   through a fixed 16 KiB chunk buffer, growing the output as needed.
//!
//! All failures surface as [`StorageError::Compression`].

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::config::GZIP_CHUNK_SIZE;
use crate::error::{Result, StorageError};

/// Deflates `input` in one shot at the default compression level.
pub fn gzip(input: &[u8]) -> Result<Vec<u8>> {
    // Worst-case deflate bound: incompressible input grows slightly.
    let bound = input.len() + input.len() / 1000 + 64;
    let mut out = vec![0u8; bound];

    let mut compress = Compress::new(Compression::default(), true);
    let status = compress
        .compress(input, &mut out, FlushCompress::Finish)
        .map_err(|e| StorageError::Compression(format!("deflate failed: {e}")))?;

    if status != Status::StreamEnd || compress.total_in() as usize != input.len() {
        return Err(StorageError::Compression(
            "deflate did not consume the full input".to_string(),
        ));
    }

    out.truncate(compress.total_out() as usize);
    Ok(out)
}

/// Inflates `input` into `out`, returning the number of bytes written.
/// Fails if the deflate stream does not end cleanly within `out`.
pub fn gunzip_fixed(input: &[u8], out: &mut [u8]) -> Result<usize> {
    let mut decompress = Decompress::new(true);
    let status = decompress
        .decompress(input, out, FlushDecompress::Finish)
        .map_err(|e| StorageError::Compression(format!("inflate failed: {e}")))?;

    if status != Status::StreamEnd {
        return Err(StorageError::Compression(
            "inflate did not reach end of stream".to_string(),
        ));
    }
    Ok(decompress.total_out() as usize)
}

/// Inflates a stream whose inflated size is unknown up front.
pub fn gunzip_streaming(input: &[u8]) -> Result<Vec<u8>> {
    let mut decompress = Decompress::new(true);
    let mut out = Vec::with_capacity(GZIP_CHUNK_SIZE);
    let mut chunk = vec![0u8; GZIP_CHUNK_SIZE];

    loop {
        let consumed = decompress.total_in() as usize;
        let produced_before = decompress.total_out();
        let status = decompress
            .decompress(&input[consumed..], &mut chunk, FlushDecompress::Finish)
            .map_err(|e| StorageError::Compression(format!("inflate failed: {e}")))?;

        let produced = (decompress.total_out() - produced_before) as usize;
        if produced > 0 {
            out.extend_from_slice(&chunk[..produced]);
        }

        match status {
            Status::StreamEnd => return Ok(out),
            _ => {
                if produced == 0 && decompress.total_in() as usize == consumed {
                    // No forward progress: the stream is truncated.
                    return Err(StorageError::Compression(
                        "truncated deflate stream".to_string(),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random bytes for compression tests.
    fn pseudo_random_bytes(len: usize, mut seed: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            out.push((seed >> 33) as u8);
        }
        out
    }

    #[test]
    fn round_trip_fixed_buffer() {
        let input = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let compressed = gzip(&input).unwrap();
        assert!(compressed.len() < input.len());

        let mut out = vec![0u8; input.len()];
        let n = gunzip_fixed(&compressed, &mut out).unwrap();
        assert_eq!(&out[..n], &input[..]);
    }

    #[test]
    fn round_trip_empty_input() {
        let compressed = gzip(b"").unwrap();
        assert_eq!(gunzip_streaming(&compressed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn fixed_buffer_too_small_is_an_error() {
        let input = vec![7u8; 4096];
        let compressed = gzip(&input).unwrap();
        let mut out = vec![0u8; 16];
        assert!(matches!(
            gunzip_fixed(&compressed, &mut out),
            Err(StorageError::Compression(_))
        ));
    }

    #[test]
    fn corrupt_stream_is_an_error() {
        let garbage = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0x02];
        let mut out = vec![0u8; 64];
        assert!(gunzip_fixed(&garbage, &mut out).is_err());
        assert!(gunzip_streaming(&garbage).is_err());
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let input = pseudo_random_bytes(64 * 1024, 3);
        let compressed = gzip(&input).unwrap();
        let truncated = &compressed[..compressed.len() / 2];
        assert!(matches!(
            gunzip_streaming(truncated),
            Err(StorageError::Compression(_))
        ));
    }

    #[test]
    fn streaming_round_trip_spans_many_chunks() {
        let input = pseudo_random_bytes(1024 * 1024, 42);
        let compressed = gzip(&input).unwrap();
        let inflated = gunzip_streaming(&compressed).unwrap();
        assert_eq!(inflated.len(), input.len());
        assert_eq!(inflated, input);
    }

    #[test]
    fn streaming_handles_highly_compressible_input() {
        let input = vec![0u8; 512 * 1024];
        let compressed = gzip(&input).unwrap();
        assert!(compressed.len() < 4096);
        assert_eq!(gunzip_streaming(&compressed).unwrap(), input);
    }
}
