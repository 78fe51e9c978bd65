//! Tracing subscriber setup.
//!
//! Library crates log through the `log` facade; the `tracing-log` bridge
//! routes those records into the same subscriber.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// JSON when built with the `logs-json` feature, text otherwise.
    pub fn from_features() -> Self {
        if cfg!(feature = "logs-json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Parse a filter directive, falling back to `info` when it is invalid.
pub fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("invalid log filter {:?} ({}), using info", directive, e);
        EnvFilter::new("info")
    })
}

/// Install the global subscriber. Logs go to stderr so stdout carries only
/// codes. Calling this twice is harmless; the second call is ignored.
pub fn init_logging(directive: &str, format: LogFormat) {
    let filter = env_filter(directive);
    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    if result.is_ok() {
        tracing::debug!(?format, "logging initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_directive_falls_back() {
        let filter = env_filter("valor=loudest");
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn good_directive_is_kept() {
        let filter = env_filter("valor_otp=debug");
        assert_eq!(filter.to_string(), "valor_otp=debug");
    }

    #[test]
    fn default_format_follows_features() {
        let expected = if cfg!(feature = "logs-json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        };
        assert_eq!(LogFormat::from_features(), expected);
    }
}
