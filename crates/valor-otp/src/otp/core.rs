//! Core OTP generation: RFC 4226 (HOTP) and RFC 6238 (TOTP).
//!
//! Implements HMAC-based One-Time Password with SHA-1, SHA-256, and SHA-512,
//! time-step calculation, code verification with a configurable drift
//! window, and countdown helpers for callers that poll.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::otp::encoding::constant_time_eq;
use crate::otp::types::*;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Raw HMAC-OTP (RFC 4226 §5.3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute an HOTP code for the given raw key bytes and counter.
pub fn hotp_raw(key: &[u8], counter: u64, digits: u8, algo: Algorithm) -> Result<String, OtpError> {
    let hmac_result = compute_hmac(key, &counter.to_be_bytes(), algo)?;
    Ok(truncate(&hmac_result, digits))
}

/// Compute HMAC(key, message) using the specified algorithm.
fn compute_hmac(key: &[u8], data: &[u8], algo: Algorithm) -> Result<Vec<u8>, OtpError> {
    fn run<M: Mac + hmac::digest::KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, OtpError> {
        let mut mac = <M as hmac::digest::KeyInit>::new_from_slice(key).map_err(|e| {
            OtpError::new(OtpErrorKind::InvalidConfiguration, "HMAC rejected the key")
                .with_detail(e.to_string())
        })?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    match algo {
        Algorithm::Sha1 => run::<Hmac<Sha1>>(key, data),
        Algorithm::Sha256 => run::<Hmac<Sha256>>(key, data),
        Algorithm::Sha512 => run::<Hmac<Sha512>>(key, data),
    }
}

/// Dynamic truncation per RFC 4226 §5.3.
fn truncate(hmac_result: &[u8], digits: u8) -> String {
    let offset = (hmac_result[hmac_result.len() - 1] & 0x0f) as usize;
    let binary = ((hmac_result[offset] as u64 & 0x7f) << 24)
        | ((hmac_result[offset + 1] as u64) << 16)
        | ((hmac_result[offset + 2] as u64) << 8)
        | (hmac_result[offset + 3] as u64);
    // u64 so that 10^10 does not overflow
    let modulus = 10u64.pow(digits as u32);
    let code = binary % modulus;
    format!("{:0>width$}", code, width = digits as usize)
}

/// Reject configurations that cannot produce a well-formed code. The parser
/// never builds these, but `OtpConfig` can be assembled by hand.
fn validate(config: &OtpConfig) -> Result<(), OtpError> {
    if config.secret().is_empty() {
        return Err(OtpError::new(
            OtpErrorKind::InvalidConfiguration,
            "Secret is empty",
        ));
    }
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&config.digits()) {
        return Err(OtpError::new(
            OtpErrorKind::InvalidConfiguration,
            format!(
                "Digits must be between {} and {}, got {}",
                MIN_DIGITS,
                MAX_DIGITS,
                config.digits()
            ),
        ));
    }
    if config.kind() == OtpType::Totp && config.period() == 0 {
        return Err(OtpError::new(
            OtpErrorKind::InvalidConfiguration,
            "Period must be positive",
        ));
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TOTP time steps (RFC 6238)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute the time-step counter for a given unix timestamp.
pub fn time_step_at(unix_seconds: u64, period: u32) -> u64 {
    unix_seconds / period as u64
}

/// Seconds remaining until the step containing `unix_seconds` expires.
/// Always in `1..=period`.
pub fn seconds_remaining_at(unix_seconds: u64, period: u32) -> u32 {
    let p = period as u64;
    (p - unix_seconds % p) as u32
}

/// Progress fraction for a specific timestamp (0.0 = fresh code).
pub fn progress_fraction_at(unix_seconds: u64, period: u32) -> f64 {
    let elapsed = (unix_seconds % period as u64) as f64;
    elapsed / period as f64
}

/// `true` exactly on a step boundary, when a polling caller should
/// recompute.
pub fn is_step_boundary(unix_seconds: u64, period: u32) -> bool {
    period > 0 && unix_seconds % period as u64 == 0
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  High-level: generate from config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Generate the current code for a configuration.
///
/// HOTP uses the configured counter and leaves it untouched; bump it with
/// [`OtpConfig::advance_counter`] once the code has been used.
pub fn generate_code(config: &OtpConfig) -> Result<GeneratedCode, OtpError> {
    generate_code_at(config, current_unix_time())
}

/// Generate a `GeneratedCode` at a specific unix timestamp.
pub fn generate_code_at(config: &OtpConfig, unix_seconds: u64) -> Result<GeneratedCode, OtpError> {
    validate(config)?;
    let key = config.secret().expose();
    match config.kind() {
        OtpType::Totp => {
            let period = config.period();
            let step = time_step_at(unix_seconds, period);
            let code = hotp_raw(key, step, config.digits(), config.algorithm())?;
            Ok(GeneratedCode {
                code,
                kind: OtpType::Totp,
                remaining_seconds: Some(seconds_remaining_at(unix_seconds, period)),
                period: Some(period),
                progress: Some(progress_fraction_at(unix_seconds, period)),
                counter: step,
            })
        }
        OtpType::Hotp => {
            let code = hotp_raw(key, config.counter(), config.digits(), config.algorithm())?;
            Ok(GeneratedCode {
                code,
                kind: OtpType::Hotp,
                remaining_seconds: None,
                period: None,
                progress: None,
                counter: config.counter(),
            })
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Verification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Verify a user-supplied code against a configuration.
///
/// `drift_window` is how many steps (TOTP, both directions) or counters
/// (HOTP, look-ahead only) to accept around the current value.
pub fn verify_code(
    config: &OtpConfig,
    code: &str,
    drift_window: u32,
) -> Result<VerifyResult, OtpError> {
    verify_code_at(config, code, drift_window, current_unix_time())
}

/// Verify at a specific timestamp.
pub fn verify_code_at(
    config: &OtpConfig,
    code: &str,
    drift_window: u32,
    unix_seconds: u64,
) -> Result<VerifyResult, OtpError> {
    validate(config)?;

    if code.len() != config.digits() as usize || !code.chars().all(|c| c.is_ascii_digit()) {
        return Ok(VerifyResult::rejected());
    }

    let base_counter = match config.kind() {
        OtpType::Totp => time_step_at(unix_seconds, config.period()),
        OtpType::Hotp => config.counter(),
    };
    let start = match config.kind() {
        OtpType::Hotp => base_counter,
        OtpType::Totp => base_counter.saturating_sub(drift_window as u64),
    };
    let end = base_counter.saturating_add(drift_window as u64);

    let key = config.secret().expose();
    for c in start..=end {
        let generated = hotp_raw(key, c, config.digits(), config.algorithm())?;
        if constant_time_eq(generated.as_bytes(), code.as_bytes()) {
            let drift = c as i64 - base_counter as i64;
            return Ok(VerifyResult {
                valid: true,
                drift,
                matched_counter: Some(c),
            });
        }
    }

    Ok(VerifyResult::rejected())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Utility helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Current unix timestamp in seconds.
pub fn current_unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Format an OTP code with a space in the middle (e.g. "123 456").
pub fn format_code_display(code: &str) -> String {
    if code.len() <= 4 {
        return code.to_string();
    }
    let mid = code.len() / 2;
    format!("{} {}", &code[..mid], &code[mid..])
}
