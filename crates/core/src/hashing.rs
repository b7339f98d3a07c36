//! Shared SHA-256 hex digest utilities.
//!
//! Used by the part listing and the batch engine so both sides agree on the
//! identity of a part.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Stable identity hash of a part file: data source, directory and file name.
///
/// Fields are NUL-separated so `("a/b", "c")` and `("a", "b/c")` never collide.
pub fn part_identity_hash(ds_name: &str, dir_path: &str, file_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ds_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(dir_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(file_name.as_bytes());
    format!("{:x}", hasher.finalize())
}
