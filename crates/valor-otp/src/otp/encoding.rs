//! Low-level byte helpers shared by the decoder and the generator.

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine as _};

/// Standard-alphabet base-64 that tolerates missing or present padding.
const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode an even-length hex string (either case).
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s)
}

/// Decode RFC 4648 base-32.
///
/// Case-insensitive; `=` padding is dropped first. Each symbol contributes
/// five bits, packed big-endian, and a trailing group of bits too short to
/// fill a byte is discarded rather than padded. Returns `None` if a
/// character outside the alphabet is present.
pub fn base32_to_bytes(s: &str) -> Option<Vec<u8>> {
    let unpadded: String = s.chars().filter(|&c| c != '=').collect();
    base32::decode(
        base32::Alphabet::Rfc4648 { padding: false },
        &unpadded.to_uppercase(),
    )
}

/// Encode raw bytes as unpadded, uppercase base-32.
pub fn bytes_to_base32(bytes: &[u8]) -> String {
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, bytes)
}

/// Decode standard-alphabet base-64.
pub fn base64_to_bytes(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_LENIENT.decode(s)
}

/// Remove every whitespace character, not just the ends.
pub fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Constant-time comparison (to prevent timing attacks on code verification).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
