use std::path::Path;

use crate::error::{HashError, HashResult};

/// Hex-encoded blake3 digest of an in-memory buffer.
pub fn checksum_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Hex-encoded blake3 digest of a file's contents.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the file cannot be read.
pub fn calculate_checksum<P: AsRef<Path>>(file_path: P) -> HashResult<String> {
    let file_path = file_path.as_ref();
    let mut hasher = blake3::Hasher::new();
    let contents = std::fs::read(file_path).map_err(|err| HashError::ReadFailed {
        path: file_path.to_path_buf(),
        source: err,
    })?;
    hasher.update(&contents);
    Ok(hasher.finalize().to_hex().to_string())
}
