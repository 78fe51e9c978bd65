//! Secret decoding: turns user-entered text into key bytes.
//!
//! Four encodings are recognised, tried in a fixed order with no
//! backtracking between them:
//!
//! 1. `0x`-prefixed hex
//! 2. plain hex of even length
//! 3. RFC 4648 base-32 (optional `=` padding)
//! 4. standard base-64
//!
//! Hex and base-32 share the digits 2–7 and the letters A–F, so anything
//! that is valid hex is decoded as hex.

use lazy_static::lazy_static;
use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::otp::encoding;
use crate::otp::types::*;

lazy_static! {
    static ref PREFIXED_HEX: Regex = Regex::new(r"^0x[0-9a-fA-F]+$").unwrap();
    static ref PLAIN_HEX: Regex = Regex::new(r"^[0-9a-fA-F]+$").unwrap();
    static ref BASE32: Regex = Regex::new(r"^[A-Za-z2-7]+=*$").unwrap();
    static ref BASE64: Regex = Regex::new(r"^[A-Za-z0-9+/=]+$").unwrap();
}

/// The encoding a secret string was recognised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretEncoding {
    PrefixedHex,
    Hex,
    Base32,
    Base64,
}

/// Classify a trimmed secret string by the first pattern it matches.
pub fn detect_encoding(input: &str) -> Option<SecretEncoding> {
    if PREFIXED_HEX.is_match(input) {
        Some(SecretEncoding::PrefixedHex)
    } else if PLAIN_HEX.is_match(input) && input.len() % 2 == 0 {
        Some(SecretEncoding::Hex)
    } else if BASE32.is_match(input) {
        Some(SecretEncoding::Base32)
    } else if BASE64.is_match(input) {
        Some(SecretEncoding::Base64)
    } else {
        None
    }
}

/// Decode a trimmed secret string into raw key bytes.
pub fn decode_secret(input: &str) -> Result<Vec<u8>, OtpError> {
    if input.is_empty() {
        return Err(OtpError::new(
            OtpErrorKind::InvalidSecretFormat,
            "Secret is empty",
        ));
    }

    let detected = detect_encoding(input).ok_or_else(|| {
        OtpError::new(
            OtpErrorKind::UnsupportedSecretEncoding,
            "Secret is not hex, base-32 or base-64",
        )
    })?;

    let bytes = match detected {
        SecretEncoding::PrefixedHex => encoding::hex_to_bytes(&input[2..]).map_err(|e| {
            OtpError::new(OtpErrorKind::UnsupportedSecretEncoding, "Invalid hex secret")
                .with_detail(e.to_string())
        })?,
        SecretEncoding::Hex => encoding::hex_to_bytes(input).map_err(|e| {
            OtpError::new(OtpErrorKind::UnsupportedSecretEncoding, "Invalid hex secret")
                .with_detail(e.to_string())
        })?,
        SecretEncoding::Base32 => encoding::base32_to_bytes(input).ok_or_else(|| {
            OtpError::new(OtpErrorKind::UnsupportedSecretEncoding, "Invalid base-32 secret")
        })?,
        SecretEncoding::Base64 => encoding::base64_to_bytes(input).map_err(|e| {
            OtpError::new(OtpErrorKind::UnsupportedSecretEncoding, "Invalid base-64 secret")
                .with_detail(e.to_string())
        })?,
    };

    if bytes.is_empty() {
        return Err(OtpError::new(
            OtpErrorKind::InvalidSecretFormat,
            "Secret decodes to zero bytes",
        ));
    }

    log::debug!("decoded {:?} secret ({} bytes)", detected, bytes.len());
    Ok(bytes)
}

/// Stable rate-limit key for a secret: the first 16 hex digits of its
/// SHA-256 digest. Reveals nothing usable about the key itself.
pub fn fingerprint(secret: &[u8]) -> String {
    let digest = Sha256::digest(secret);
    hex::encode(&digest[..8])
}

/// Generate a random base-32 secret of `byte_length` bytes.
pub fn generate_secret(byte_length: usize) -> String {
    let mut buf = vec![0u8; byte_length];
    rand::thread_rng().fill_bytes(&mut buf);
    encoding::bytes_to_base32(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Precedence ───────────────────────────────────────────────

    #[test]
    fn hex_wins_over_base32() {
        assert_eq!(detect_encoding("2A2B2C2D"), Some(SecretEncoding::Hex));
        assert_eq!(decode_secret("2A2B2C2D").unwrap(), vec![0x2A, 0x2B, 0x2C, 0x2D]);
    }

    #[test]
    fn odd_length_hex_falls_through_to_base32() {
        assert_eq!(detect_encoding("ABCDE"), Some(SecretEncoding::Base32));
    }

    #[test]
    fn prefixed_hex() {
        assert_eq!(detect_encoding("0xdeadBEEF"), Some(SecretEncoding::PrefixedHex));
        assert_eq!(decode_secret("0xdeadBEEF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn prefixed_hex_odd_length_is_rejected() {
        let err = decode_secret("0xabc").unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::UnsupportedSecretEncoding);
    }

    #[test]
    fn base32_secret() {
        assert_eq!(detect_encoding("JBSWY3DPEHPK3PXP"), Some(SecretEncoding::Base32));
        assert_eq!(decode_secret("JBSWY3DPEHPK3PXP").unwrap(), b"Hello!\xde\xad\xbe\xef");
    }

    #[test]
    fn base32_with_padding() {
        assert_eq!(decode_secret("MZXW6===").unwrap(), b"foo");
    }

    #[test]
    fn base32_case_insensitive() {
        let upper = decode_secret("JBSWY3DPEHPK3PXP").unwrap();
        let lower = decode_secret("jbswy3dpehpk3pxp").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn base64_fallback() {
        // '1' and '+' rule out both hex and base-32
        assert_eq!(detect_encoding("aGVsbG8+d29ybGQ1"), Some(SecretEncoding::Base64));
        assert_eq!(decode_secret("aGVsbG8+d29ybGQ1").unwrap(), b"hello>world5");
    }

    #[test]
    fn base64_decode_failure_is_unsupported() {
        // odd-length hex skips the hex rules, '1' rules out base-32,
        // and a single base-64 symbol cannot hold a byte
        let err = decode_secret("1").unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::UnsupportedSecretEncoding);
    }

    // ── Failures ─────────────────────────────────────────────────

    #[test]
    fn garbage_is_unsupported() {
        let err = decode_secret("not-a-valid-secret!!").unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::UnsupportedSecretEncoding);
    }

    #[test]
    fn empty_is_invalid_format() {
        let err = decode_secret("").unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidSecretFormat);
    }

    #[test]
    fn too_short_base32_is_invalid_format() {
        let err = decode_secret("M").unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidSecretFormat);
    }

    // ── Fingerprint / generation ─────────────────────────────────

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = fingerprint(b"12345678901234567890");
        let b = fingerprint(b"12345678901234567890");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, fingerprint(b"12345678901234567891"));
    }

    #[test]
    fn generated_secret_decodes_to_requested_length() {
        let s = generate_secret(20);
        assert_eq!(s.len(), 32);
        assert_eq!(decode_secret(&s).unwrap().len(), 20);
    }
}
