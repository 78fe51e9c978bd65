//! High-level facade: admission-check, parse, generate.
//!
//! The engine itself is stateless. The only shared state is the
//! [`RateGovernor`] handed in by the host.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::governor::RateGovernor;
use crate::otp::core;
use crate::otp::encoding::strip_whitespace;
use crate::otp::secret;
use crate::otp::types::*;
use crate::otp::uri;

/// Outcome of a reveal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reveal {
    Code(GeneratedCode),
    /// The governor refused this secret for now.
    Throttled { retry_after_seconds: u64 },
}

impl Reveal {
    pub fn code(&self) -> Option<&GeneratedCode> {
        match self {
            Self::Code(c) => Some(c),
            Self::Throttled { .. } => None,
        }
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }
}

/// Central OTP service.
#[derive(Debug, Clone)]
pub struct OtpService {
    governor: Arc<RateGovernor>,
}

impl OtpService {
    pub fn new(governor: Arc<RateGovernor>) -> Self {
        Self { governor }
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Code generation
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Parse `input` (bare secret or `otpauth://` URI) and reveal its
    /// current code.
    pub fn reveal(&self, input: &str) -> Result<Reveal, OtpError> {
        self.reveal_at(input, core::current_unix_time())
    }

    /// The input is admission-checked before it is decoded, keyed by a
    /// fingerprint of its whitespace-free text, so undecodable input is
    /// throttled like any other.
    pub fn reveal_at(&self, input: &str, unix_seconds: u64) -> Result<Reveal, OtpError> {
        let key = secret::fingerprint(strip_whitespace(input).as_bytes());
        if let Some(throttled) = self.admit(&key) {
            return Ok(throttled);
        }
        let config = uri::parse_input(input)?;
        self.generate(&config, &key, unix_seconds)
    }

    /// Reveal for an already-parsed configuration, keyed by the secret
    /// bytes. The HOTP counter is read, not advanced.
    pub fn reveal_config(&self, config: &OtpConfig) -> Result<Reveal, OtpError> {
        self.reveal_config_at(config, core::current_unix_time())
    }

    pub fn reveal_config_at(
        &self,
        config: &OtpConfig,
        unix_seconds: u64,
    ) -> Result<Reveal, OtpError> {
        let key = secret::fingerprint(config.secret().expose());
        if let Some(throttled) = self.admit(&key) {
            return Ok(throttled);
        }
        self.generate(config, &key, unix_seconds)
    }

    fn admit(&self, key: &str) -> Option<Reveal> {
        let admission = self.governor.check(key);
        if admission.allowed {
            return None;
        }
        let retry = admission.retry_after_seconds.unwrap_or(1);
        log::warn!("reveal throttled for {} (retry in {}s)", key, retry);
        Some(Reveal::Throttled {
            retry_after_seconds: retry,
        })
    }

    fn generate(
        &self,
        config: &OtpConfig,
        key: &str,
        unix_seconds: u64,
    ) -> Result<Reveal, OtpError> {
        let generated = core::generate_code_at(config, unix_seconds)?;
        log::debug!(
            "revealed {} code for {} ({} {} digits, counter {})",
            generated.kind,
            key,
            config.algorithm(),
            config.digits(),
            generated.counter
        );
        Ok(Reveal::Code(generated))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Verification
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Check a user-supplied code. Not rate-limited.
    pub fn verify(
        &self,
        config: &OtpConfig,
        code: &str,
        drift_window: u32,
    ) -> Result<VerifyResult, OtpError> {
        core::verify_code(config, code.trim(), drift_window)
    }
}
