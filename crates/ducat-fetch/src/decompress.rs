//! LZMA decompression for bi5 files.

use lzma_rs::lzma_decompress;
use std::io::Cursor;
use thiserror::Error;

/// Errors that can occur during decompression.
#[derive(Error, Debug)]
pub enum DecompressError {
    /// LZMA decompression failed.
    #[error("LZMA decompression failed: {0}")]
    LzmaError(String),
}

/// Decompresses LZMA-compressed bi5 data.
///
/// A payload may hold several LZMA streams back to back; their outputs are
/// concatenated. Trailing bytes that do not form a valid stream after at
/// least one good stream are ignored. An empty payload decodes to nothing.
///
/// # Errors
///
/// Returns an error if the first stream cannot be decoded.
pub fn decompress_bi5(compressed: &[u8]) -> Result<Vec<u8>, DecompressError> {
    let mut decompressed = Vec::new();
    let mut cursor = Cursor::new(compressed);
    let mut streams = 0usize;

    while (cursor.position() as usize) < compressed.len() {
        let mut chunk = Vec::new();
        match lzma_decompress(&mut cursor, &mut chunk) {
            Ok(()) => {
                decompressed.extend_from_slice(&chunk);
                streams += 1;
            }
            Err(e) if streams == 0 => return Err(DecompressError::LzmaError(e.to_string())),
            Err(e) => {
                tracing::debug!(error = %e, streams, "ignoring trailing bytes after lzma streams");
                break;
            }
        }
    }

    Ok(decompressed)
}
