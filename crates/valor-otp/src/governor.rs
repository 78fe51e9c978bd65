//! Fixed-window rate governor.
//!
//! Bounds how often a code may be (re)computed for a given key, normally a
//! secret [`fingerprint`](crate::otp::fingerprint). The host builds one
//! [`RateGovernor`] and shares it by `Arc`; there is no global table.
//!
//! Windows are fixed, not sliding: up to `2 × max_requests` attempts can pass
//! across a window boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Environment variable overriding [`GovernorConfig::max_requests`].
pub const ENV_MAX_REQUESTS: &str = "VALOR_RATE_LIMIT_REQUESTS";
/// Environment variable overriding [`GovernorConfig::window`], in seconds.
pub const ENV_WINDOW_SECS: &str = "VALOR_RATE_LIMIT_WINDOW";

const DEFAULT_MAX_REQUESTS: u32 = 10;
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Limits applied to every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorConfig {
    pub max_requests: u32,
    #[serde(rename = "window_ms", with = "duration_ms")]
    pub window: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
        }
    }
}

impl GovernorConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Defaults, overridden by `VALOR_RATE_LIMIT_REQUESTS` and
    /// `VALOR_RATE_LIMIT_WINDOW` when they hold positive integers.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(max) = positive_from(&lookup, ENV_MAX_REQUESTS) {
            config.max_requests = max as u32;
        }
        if let Some(secs) = positive_from(&lookup, ENV_WINDOW_SECS) {
            config.window = Duration::from_secs(secs);
        }
        config
    }
}

fn positive_from<F>(lookup: &F, name: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 && v <= u32::MAX as u64 => Some(v),
        _ => {
            log::warn!("ignoring {}={:?}: expected a positive integer", name, raw);
            None
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Admission
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of a single [`RateGovernor::check`]. A denial is a value, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub allowed: bool,
    /// Whole seconds until the key's window ends (denials only, at least 1).
    pub retry_after_seconds: Option<u64>,
}

impl Admission {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_seconds: None,
        }
    }

    fn deny(retry_after_seconds: u64) -> Self {
        Self {
            allowed: false,
            retry_after_seconds: Some(retry_after_seconds),
        }
    }
}

/// Per-key window.
#[derive(Debug, Clone, Copy)]
struct RateLimitState {
    window_start: Instant,
    count: u32,
}

impl RateLimitState {
    fn expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) > window
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Governor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-wide window table behind a single lock.
#[derive(Debug)]
pub struct RateGovernor {
    config: GovernorConfig,
    windows: Mutex<HashMap<String, RateLimitState>>,
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(GovernorConfig::default())
    }
}

impl RateGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt for `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> Admission {
        self.check_at(key, Instant::now())
    }

    /// Same as [`check`](Self::check) at an explicit instant.
    pub fn check_at(&self, key: &str, now: Instant) -> Admission {
        let window = self.config.window;
        let mut windows = self.lock();

        windows.retain(|k, state| k == key || !state.expired(now, window));

        match windows.get_mut(key) {
            Some(state) if !state.expired(now, window) => {
                if state.count < self.config.max_requests {
                    state.count += 1;
                    Admission::allow()
                } else {
                    let remaining =
                        window.saturating_sub(now.saturating_duration_since(state.window_start));
                    let retry = ceil_secs(remaining).max(1);
                    log::debug!("rate limit hit for {} (retry in {}s)", key, retry);
                    Admission::deny(retry)
                }
            }
            _ => {
                windows.insert(
                    key.to_string(),
                    RateLimitState {
                        window_start: now,
                        count: 1,
                    },
                );
                if self.config.max_requests == 0 {
                    return Admission::deny(ceil_secs(window).max(1));
                }
                Admission::allow()
            }
        }
    }

    /// Attempts recorded for `key` in its current window.
    pub fn count(&self, key: &str) -> u32 {
        self.lock().get(key).map(|s| s.count).unwrap_or(0)
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitState>> {
        // A panic mid-update leaves at worst one stale count.
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}
