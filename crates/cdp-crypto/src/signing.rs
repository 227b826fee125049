//! HMAC-SHA256 primitive shared by the preference-tree signer. Grounded on
//! `crates/crypto/src/hmac_auth.rs`'s `Hmac<Sha256>` usage, generalized to
//! hex-string output and multi-part input instead of a single buffer plus
//! an appended timestamp.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Published Chromium super-MAC seed (`CHROME_SEED`). This byte sequence is
/// load-bearing: every byte must match the running Chromium build's compiled
/// constant or the browser silently discards the whole `Secure Preferences`
/// signature block on startup.
pub const CHROMIUM_HMAC_SEED: [u8; 64] = [
    0xe7, 0x48, 0xf3, 0x36, 0xd8, 0x5e, 0xa5, 0xf9, 0xdc, 0xdf, 0x25, 0xd8, 0xf3, 0x47, 0xa6, 0x5b,
    0x4c, 0xdf, 0x66, 0x76, 0x00, 0xf0, 0x2d, 0xf6, 0x72, 0x4a, 0x2a, 0xf1, 0x8a, 0x21, 0x2d, 0x26,
    0xb7, 0x88, 0xa2, 0x50, 0x86, 0x91, 0x0c, 0xf3, 0xa9, 0x03, 0x13, 0x69, 0x68, 0x71, 0xf3, 0xdc,
    0x05, 0x82, 0x37, 0x30, 0xc9, 0x1d, 0xf8, 0xba, 0x5c, 0x4f, 0xd9, 0xc8, 0x84, 0xb5, 0x05, 0xa8,
];

/// Compute `HMAC-SHA256(key, parts.concat())` and return it as lowercase
/// hex. Callers needing the browser's uppercase "inner MAC" format
/// (spec §4.G) upper-case the result themselves.
pub fn hmac_hex(key: &[u8], parts: &[&[u8]]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts a key of any length");
    for part in parts {
        mac.update(part);
    }
    let bytes = mac.finalize().into_bytes();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_hex_is_deterministic() {
        let a = hmac_hex(&CHROMIUM_HMAC_SEED, &[b"sid", b"extensions.ui.developer_mode", b"true"]);
        let b = hmac_hex(&CHROMIUM_HMAC_SEED, &[b"sid", b"extensions.ui.developer_mode", b"true"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hmac_hex_is_sensitive_to_every_part() {
        let a = hmac_hex(&CHROMIUM_HMAC_SEED, &[b"sid", b"a"]);
        let b = hmac_hex(&CHROMIUM_HMAC_SEED, &[b"sid", b"b"]);
        assert_ne!(a, b);
    }

    #[test]
    fn concatenation_boundary_matters() {
        // "ab"+"c" must not collide with "a"+"bc": parts are update()'d
        // individually, not joined with a delimiter, so this is exactly
        // the boundary the MAC construction leaves ambiguous by design.
        let joined = hmac_hex(&CHROMIUM_HMAC_SEED, &[b"ab", b"c"]);
        let split = hmac_hex(&CHROMIUM_HMAC_SEED, &[b"a", b"bc"]);
        assert_eq!(joined, split);
    }
}
