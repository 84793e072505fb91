use sha2::{Digest, Sha256};
use crate::error::{InstallError, Result};

/// Length of a hex-encoded SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// Strips the `sha256:` prefix from a hash if present and lowercases it.
/// This is useful for comparing hashes from different sources uniformly.
pub fn format_hash(hash: &str) -> String {
    let hash = hash.trim();
    hash.strip_prefix("sha256:")
        .unwrap_or(hash)
        .to_ascii_lowercase()
}

/// Returns `true` if `hash` (after [`format_hash`]) is a well-formed SHA-256 hex digest.
pub fn is_valid_digest(hash: &str) -> bool {
    let hash = format_hash(hash);
    hash.len() == SHA256_HEX_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest.as_slice())
}

/// Verifies that `bytes` hash to `expected`.
///
/// The digest is computed over the exact byte sequence that was downloaded.
/// Nothing downstream may parse the bytes before this returns `Ok`.
///
/// # Errors
/// Returns [`InstallError::HashMismatch`] carrying both digests if they differ.
pub fn verify(bytes: &[u8], expected: &str) -> Result<()> {
    let expected = format_hash(expected);
    let actual = sha256_hex(bytes);
    if actual != expected {
        return Err(InstallError::HashMismatch { expected, actual });
    }
    Ok(())
}
