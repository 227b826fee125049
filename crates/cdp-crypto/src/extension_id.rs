//! Deterministic extension-ID derivation (spec §4.G): SHA-256 of a
//! normalized input, truncated to 16 bytes, each nibble remapped into the
//! browser's `a`..`p` alphabet.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

/// Which byte encoding the canonical path is hashed as. The browser's own
/// derivation diverges by platform, so the two must match or the ID will
/// differ from what the browser computes for the same logical path
/// (spec §9, "platform canonicalization is load-bearing").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEncoding {
    /// UTF-8 bytes of the canonical path, used as-is.
    Posix,
    /// UTF-16LE bytes of the path after drive-letter upper-casing and
    /// separator normalization to `\`.
    Windows,
}

/// Derive an extension ID from an already-canonicalized absolute path.
/// Canonicalization (symlink resolution, `..` elimination) is the caller's
/// responsibility since it needs filesystem access this crate doesn't take.
pub fn derive_from_path(canonical_path: &str, encoding: PathEncoding) -> String {
    let bytes = match encoding {
        PathEncoding::Posix => canonical_path.as_bytes().to_vec(),
        PathEncoding::Windows => {
            let normalized = normalize_windows_path(canonical_path);
            normalized.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
        }
    };
    derive_from_bytes(&bytes)
}

/// Derive an extension ID from a manifest `key` field (base64-encoded
/// public key bytes).
pub fn derive_from_manifest_key(key_b64: &str) -> Result<String, base64::DecodeError> {
    let decoded = BASE64.decode(key_b64)?;
    Ok(derive_from_bytes(&decoded))
}

fn normalize_windows_path(path: &str) -> String {
    let mut chars: Vec<char> = path.replace('/', "\\").chars().collect();
    if chars.len() >= 2 && chars[1] == ':' {
        chars[0] = chars[0].to_ascii_uppercase();
    }
    chars.into_iter().collect()
}

fn derive_from_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest[..16]
        .iter()
        .flat_map(|byte| [byte >> 4, byte & 0x0f])
        .map(|nibble| (b'a' + nibble) as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_path_derivation_is_stable() {
        let a = derive_from_path("/opt/ext/foo", PathEncoding::Posix);
        let b = derive_from_path("/opt/ext/foo", PathEncoding::Posix);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| ('a'..='p').contains(&c)));
    }

    #[test]
    fn posix_and_windows_encodings_diverge_for_the_same_logical_path() {
        let posix = derive_from_path("/opt/ext/foo", PathEncoding::Posix);
        let windows = derive_from_path("C:\\opt\\ext\\foo", PathEncoding::Windows);
        assert_ne!(posix, windows);
    }

    #[test]
    fn windows_drive_letter_is_upper_cased_before_hashing() {
        let lower = derive_from_path("c:\\opt\\ext\\foo", PathEncoding::Windows);
        let upper = derive_from_path("C:\\opt\\ext\\foo", PathEncoding::Windows);
        assert_eq!(lower, upper);
    }

    #[test]
    fn manifest_key_derivation_rejects_invalid_base64() {
        assert!(derive_from_manifest_key("not base64!!").is_err());
    }
}
