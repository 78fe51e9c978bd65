//! Core types for the OTP engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Smallest code length accepted by the generator.
pub const MIN_DIGITS: u8 = 6;
/// Largest code length accepted by the generator.
pub const MAX_DIGITS: u8 = 10;
/// Code length used when none (or an invalid one) is given.
pub const DEFAULT_DIGITS: u8 = 6;
/// TOTP step used when none (or an invalid one) is given.
pub const DEFAULT_PERIOD: u32 = 30;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Algorithm
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hash algorithm used for HMAC-based OTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Algorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri_name())
    }
}

impl Algorithm {
    /// Parse the `algorithm` URI parameter. Only the three canonical names
    /// are accepted (case-insensitively); anything else yields `None`.
    pub fn from_uri_name(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SHA1" => Some(Self::Sha1),
            "SHA256" => Some(Self::Sha256),
            "SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// URI-safe name for `otpauth://` parameters.
    pub fn uri_name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  OTP type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Whether a configuration is time-based or counter-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpType {
    #[default]
    Totp,
    Hotp,
}

impl fmt::Display for OtpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Totp => write!(f, "totp"),
            Self::Hotp => write!(f, "hotp"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Secret material
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Raw key bytes. Wiped on drop, redacted in `Debug`, never serialized.
#[derive(Clone)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Borrow the raw key material.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {} bytes])", self.0.len())
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for SecretBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  OTP configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fully-resolved description of one OTP source.
///
/// Everything but the HOTP counter is fixed once built. The counter belongs
/// to the caller: the generator reads it, never bumps it.
#[derive(Debug, Clone, Serialize)]
pub struct OtpConfig {
    kind: OtpType,
    #[serde(skip)]
    secret: SecretBytes,
    algorithm: Algorithm,
    digits: u8,
    period: u32,
    counter: u64,
    issuer: Option<String>,
    label: Option<String>,
}

impl OtpConfig {
    /// A TOTP configuration with SHA-1, 6 digits and a 30 second step.
    pub fn totp(secret: impl Into<SecretBytes>) -> Self {
        Self {
            kind: OtpType::Totp,
            secret: secret.into(),
            algorithm: Algorithm::default(),
            digits: DEFAULT_DIGITS,
            period: DEFAULT_PERIOD,
            counter: 0,
            issuer: None,
            label: None,
        }
    }

    /// An HOTP configuration starting at `counter`.
    pub fn hotp(secret: impl Into<SecretBytes>, counter: u64) -> Self {
        let mut config = Self::totp(secret);
        config.kind = OtpType::Hotp;
        config.counter = counter;
        config
    }

    /// Builder: set algorithm.
    pub fn with_algorithm(mut self, algo: Algorithm) -> Self {
        self.algorithm = algo;
        self
    }

    /// Builder: set digit count. Not range-checked here; the generator
    /// rejects values outside `MIN_DIGITS..=MAX_DIGITS`.
    pub fn with_digits(mut self, digits: u8) -> Self {
        self.digits = digits;
        self
    }

    /// Builder: set time period.
    pub fn with_period(mut self, period: u32) -> Self {
        self.period = period;
        self
    }

    /// Builder: set the HOTP counter.
    pub fn with_counter(mut self, counter: u64) -> Self {
        self.counter = counter;
        self
    }

    /// Builder: set issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Builder: set label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn kind(&self) -> OtpType {
        self.kind
    }

    pub fn secret(&self) -> &SecretBytes {
        &self.secret
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn digits(&self) -> u8 {
        self.digits
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Move the HOTP counter forward by one and return the new value.
    /// Call this after a code has been shown to the user, then persist it.
    pub fn advance_counter(&mut self) -> u64 {
        self.counter = self.counter.saturating_add(1);
        self.counter
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Generated code result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A generated OTP code with associated timing info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCode {
    /// The zero-padded code (e.g. "012345").
    pub code: String,
    pub kind: OtpType,
    /// Seconds left in the current step (TOTP only).
    pub remaining_seconds: Option<u32>,
    /// Step length in seconds (TOTP only).
    pub period: Option<u32>,
    /// Elapsed fraction of the step, 0.0 = fresh (TOTP only).
    pub progress: Option<f64>,
    /// The time step (TOTP) or counter (HOTP) that produced the code.
    pub counter: u64,
}

impl GeneratedCode {
    /// Counter value the caller should persist once this HOTP code has been
    /// used. `None` for TOTP.
    pub fn next_counter(&self) -> Option<u64> {
        match self.kind {
            OtpType::Hotp => Some(self.counter.saturating_add(1)),
            OtpType::Totp => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Verification result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of verifying a user-supplied code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub valid: bool,
    /// How many steps or counters off the match was (0 = exact).
    pub drift: i64,
    /// The counter value that matched (if any).
    pub matched_counter: Option<u64>,
}

impl VerifyResult {
    pub(crate) fn rejected() -> Self {
        Self {
            valid: false,
            drift: 0,
            matched_counter: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error kind for this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OtpErrorKind {
    /// Input matched no supported encoding, or hex/base-64 decoding failed.
    UnsupportedSecretEncoding,
    /// Input was recognised but decoded to nothing usable.
    InvalidSecretFormat,
    /// `otpauth://` URI without a `secret` parameter.
    MissingSecret,
    /// Malformed `otpauth://` URI syntax.
    InvalidUri,
    /// URI host other than `totp` or `hotp`.
    UnsupportedOtpType,
    /// Configuration that cannot produce a code (empty key, bad digits).
    InvalidConfiguration,
    /// Enrollment URI could not be rendered as a QR code.
    QrEncodeFailed,
}

impl OtpErrorKind {
    /// Stable machine-readable code for surfacing to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedSecretEncoding | Self::InvalidSecretFormat | Self::MissingSecret => {
                "INVALID_SECRET"
            }
            Self::InvalidUri | Self::UnsupportedOtpType | Self::InvalidConfiguration => {
                "INVALID_INPUT"
            }
            Self::QrEncodeFailed => "INTERNAL_ERROR",
        }
    }
}

/// Crate-level error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{kind:?}] {message}{}", detail_suffix(.detail))]
pub struct OtpError {
    pub kind: OtpErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(" ({})", d),
        None => String::new(),
    }
}

impl OtpError {
    pub fn new(kind: OtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<OtpError> for String {
    fn from(e: OtpError) -> String {
        e.to_string()
    }
}
