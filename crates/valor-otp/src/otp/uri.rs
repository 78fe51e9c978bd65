//! Input parsing: `otpauth://` URIs and bare secrets.
//!
//! Key-URI format (Google Authenticator wiki, RFC 6238/4226 conventions):
//! `otpauth://totp/ISSUER:LABEL?secret=BASE32&issuer=ISSUER&algorithm=SHA1&digits=6&period=30`
//!
//! The OTP type and the secret are hard requirements. `algorithm`, `digits`,
//! `period` and `counter` are coerced back to their defaults when missing or
//! out of range so that slightly malformed third-party URIs still work.

use std::collections::HashMap;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::otp::encoding::strip_whitespace;
use crate::otp::secret::decode_secret;
use crate::otp::types::*;

const SCHEME_PREFIX: &str = "otpauth://";

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Parse
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse whatever the user typed: an `otpauth://` URI (scheme matched
/// case-insensitively) or a bare secret in any supported encoding.
///
/// A bare secret yields a TOTP configuration with SHA-1, 6 digits and a
/// 30 second period.
pub fn parse_input(input: &str) -> Result<OtpConfig, OtpError> {
    let trimmed = input.trim();
    if is_otpauth_uri(trimmed) {
        return parse_otpauth_uri(trimmed);
    }

    let secret = strip_whitespace(trimmed);
    let bytes = decode_secret(&secret)?;
    Ok(OtpConfig::totp(bytes))
}

fn is_otpauth_uri(s: &str) -> bool {
    s.get(..SCHEME_PREFIX.len())
        .map(|prefix| prefix.eq_ignore_ascii_case(SCHEME_PREFIX))
        .unwrap_or(false)
}

/// Parse an `otpauth://` URI into an `OtpConfig`.
pub fn parse_otpauth_uri(uri: &str) -> Result<OtpConfig, OtpError> {
    let url = url::Url::parse(uri.trim()).map_err(|e| {
        OtpError::new(OtpErrorKind::InvalidUri, "Invalid otpauth URI").with_detail(e.to_string())
    })?;

    if url.scheme() != "otpauth" {
        return Err(OtpError::new(
            OtpErrorKind::InvalidUri,
            format!("Expected scheme 'otpauth', got '{}'", url.scheme()),
        ));
    }

    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
        _ => {
            return Err(OtpError::new(
                OtpErrorKind::InvalidUri,
                "URI does not name an OTP type",
            ))
        }
    };
    let kind = match host.as_str() {
        "totp" => OtpType::Totp,
        "hotp" => OtpType::Hotp,
        other => {
            return Err(OtpError::new(
                OtpErrorKind::UnsupportedOtpType,
                format!("Unsupported OTP type '{}'", other),
            ))
        }
    };

    let path = url.path();
    let path = path.strip_prefix('/').unwrap_or(path);
    let label = percent_decode_str(path).decode_utf8_lossy().trim().to_string();

    let params = query_params(url.query().unwrap_or(""));

    let secret = params
        .get("secret")
        .map(|s| strip_whitespace(s))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            OtpError::new(OtpErrorKind::MissingSecret, "URI has no 'secret' parameter")
        })?;
    let bytes = decode_secret(&secret)?;

    let algorithm = match params.get("algorithm") {
        Some(raw) => Algorithm::from_uri_name(raw).unwrap_or_else(|| {
            log::warn!("unsupported algorithm '{}' in otpauth URI, using SHA1", raw);
            Algorithm::Sha1
        }),
        None => Algorithm::Sha1,
    };

    let digits = match params.get("digits") {
        Some(raw) => coerce_digits(raw).unwrap_or_else(|| {
            log::warn!("digits '{}' out of range, using {}", raw, DEFAULT_DIGITS);
            DEFAULT_DIGITS
        }),
        None => DEFAULT_DIGITS,
    };

    let mut config = match kind {
        OtpType::Totp => {
            let period = match params.get("period") {
                Some(raw) => coerce_period(raw).unwrap_or_else(|| {
                    log::warn!("period '{}' is not positive, using {}", raw, DEFAULT_PERIOD);
                    DEFAULT_PERIOD
                }),
                None => DEFAULT_PERIOD,
            };
            OtpConfig::totp(bytes).with_period(period)
        }
        OtpType::Hotp => {
            let counter = match params.get("counter") {
                Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                    log::warn!("counter '{}' is not a non-negative integer, using 0", raw);
                    0
                }),
                None => 0,
            };
            OtpConfig::hotp(bytes, counter)
        }
    }
    .with_algorithm(algorithm)
    .with_digits(digits);

    if let Some(issuer) = params.get("issuer").filter(|i| !i.is_empty()) {
        config = config.with_issuer(issuer.as_str());
    }
    if !label.is_empty() {
        config = config.with_label(label);
    }

    log::debug!(
        "parsed otpauth {} URI ({}, {} digits)",
        config.kind(),
        config.algorithm(),
        config.digits()
    );
    Ok(config)
}

/// Split a raw query string into decoded key/value pairs. Keys are
/// lower-cased and the first occurrence of a key wins. `+` is kept as a
/// literal plus so base-64 secrets survive unescaped.
fn query_params(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode_str(key).decode_utf8_lossy().to_ascii_lowercase();
        let value = percent_decode_str(value).decode_utf8_lossy().into_owned();
        params.entry(key).or_insert(value);
    }
    params
}

fn coerce_digits(raw: &str) -> Option<u8> {
    let d = raw.trim().parse::<i64>().ok()?;
    if (MIN_DIGITS as i64..=MAX_DIGITS as i64).contains(&d) {
        Some(d as u8)
    } else {
        None
    }
}

fn coerce_period(raw: &str) -> Option<u32> {
    let p = raw.trim().parse::<i64>().ok()?;
    if p > 0 {
        u32::try_from(p).ok()
    } else {
        None
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Enrollment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the enrollment URI for a freshly generated base-32 secret, as shown
/// to the user (or encoded in a QR code) when setting up an authenticator.
pub fn key_uri(label: &str, issuer: &str, secret_b32: &str) -> String {
    let label = utf8_percent_encode(label, URI_COMPONENT).to_string();
    if issuer.is_empty() {
        return format!("otpauth://totp/{}?secret={}", label, secret_b32);
    }
    let issuer = utf8_percent_encode(issuer, URI_COMPONENT).to_string();
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}",
        issuer, label, secret_b32, issuer
    )
}
