//! Poll loop state for the live code display.
//!
//! The generator is pure, so the ticker only decides *when* to call it:
//! when nothing is cached, when the TOTP step has moved on, or exactly on a
//! step boundary. Between those it re-derives the countdown locally.

use valor_otp::otp::core::{
    format_code_display, is_step_boundary, progress_fraction_at, seconds_remaining_at,
    time_step_at,
};
use valor_otp::otp::{GeneratedCode, OtpConfig, OtpError, OtpService, OtpType, Reveal};

const BAR_WIDTH: usize = 20;

/// What one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// A newly generated code.
    Fresh(GeneratedCode),
    /// The cached code with an updated countdown.
    Countdown(GeneratedCode),
    Throttled { retry_after_seconds: u64 },
}

impl Tick {
    pub fn code(&self) -> Option<&GeneratedCode> {
        match self {
            Tick::Fresh(c) | Tick::Countdown(c) => Some(c),
            Tick::Throttled { .. } => None,
        }
    }
}

pub struct Ticker {
    service: OtpService,
    config: OtpConfig,
    cached: Option<GeneratedCode>,
}

impl Ticker {
    pub fn new(service: OtpService, config: OtpConfig) -> Self {
        Self {
            service,
            config,
            cached: None,
        }
    }

    /// Whether the code must be regenerated at `unix_seconds`.
    pub fn needs_recompute(&self, unix_seconds: u64) -> bool {
        let cached = match &self.cached {
            Some(c) => c,
            None => return true,
        };
        match self.config.kind() {
            OtpType::Hotp => false,
            OtpType::Totp => {
                let period = self.config.period();
                period == 0
                    || cached.counter != time_step_at(unix_seconds, period)
                    || is_step_boundary(unix_seconds, period)
            }
        }
    }

    pub fn tick_at(&mut self, unix_seconds: u64) -> Result<Tick, OtpError> {
        if !self.needs_recompute(unix_seconds) {
            if let Some(cached) = &self.cached {
                return Ok(Tick::Countdown(self.refresh_countdown(cached, unix_seconds)));
            }
        }

        match self.service.reveal_config_at(&self.config, unix_seconds)? {
            Reveal::Code(code) => {
                tracing::debug!(kind = %code.kind, step = code.counter, "code recomputed");
                self.cached = Some(code.clone());
                Ok(Tick::Fresh(code))
            }
            Reveal::Throttled {
                retry_after_seconds,
            } => {
                tracing::warn!(retry_after_seconds, "code generation throttled");
                Ok(Tick::Throttled {
                    retry_after_seconds,
                })
            }
        }
    }

    fn refresh_countdown(&self, cached: &GeneratedCode, unix_seconds: u64) -> GeneratedCode {
        let mut code = cached.clone();
        if let Some(period) = code.period {
            code.remaining_seconds = Some(seconds_remaining_at(unix_seconds, period));
            code.progress = Some(progress_fraction_at(unix_seconds, period));
        }
        code
    }
}

/// Text bar for the remaining share of a step: `[########............]`.
pub fn progress_bar(progress: f64) -> String {
    let remaining = (1.0 - progress.clamp(0.0, 1.0)) * BAR_WIDTH as f64;
    let filled = (remaining.round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

/// One display line for a generated code.
pub fn render_code(code: &GeneratedCode) -> String {
    let digits = format_code_display(&code.code);
    match (code.remaining_seconds, code.progress) {
        (Some(remaining), Some(progress)) => {
            format!("{}  {} {:>2}s", digits, progress_bar(progress), remaining)
        }
        _ => match code.next_counter() {
            Some(next) => format!("{}  (counter {}, next {})", digits, code.counter, next),
            None => digits,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_test::traced_test;
    use valor_otp::governor::{GovernorConfig, RateGovernor};

    const RFC_SECRET: &[u8] = b"12345678901234567890";

    fn ticker(config: OtpConfig, max: u32) -> Ticker {
        let governor = RateGovernor::new(GovernorConfig::new(max, Duration::from_secs(60)));
        Ticker::new(OtpService::new(Arc::new(governor)), config)
    }

    #[test]
    fn first_tick_is_fresh_then_countdown() {
        let mut t = ticker(OtpConfig::totp(RFC_SECRET), 10);
        let first = t.tick_at(31).unwrap();
        assert!(matches!(first, Tick::Fresh(_)));
        assert_eq!(first.code().unwrap().code, "287082");

        let second = t.tick_at(40).unwrap();
        match second {
            Tick::Countdown(c) => {
                assert_eq!(c.code, "287082");
                assert_eq!(c.remaining_seconds, Some(20));
            }
            other => panic!("expected countdown, got {:?}", other),
        }
    }

    #[test]
    fn recomputes_on_boundary_and_step_change() {
        let t = {
            let mut t = ticker(OtpConfig::totp(RFC_SECRET), 10);
            t.tick_at(31).unwrap();
            t
        };
        assert!(!t.needs_recompute(45));
        assert!(t.needs_recompute(60));
        // a skipped boundary still triggers via the step change
        assert!(t.needs_recompute(61));
    }

    #[test]
    #[traced_test]
    fn only_boundaries_consume_governor_budget() {
        let mut t = ticker(OtpConfig::totp(RFC_SECRET), 2);
        for now in 31..60 {
            t.tick_at(now).unwrap();
        }
        assert!(matches!(t.tick_at(60).unwrap(), Tick::Fresh(_)));
        assert!(matches!(
            t.tick_at(90).unwrap(),
            Tick::Throttled { .. }
        ));
        assert!(logs_contain("code generation throttled"));
    }

    #[test]
    fn hotp_is_computed_once() {
        let mut t = ticker(OtpConfig::hotp(RFC_SECRET, 1), 10);
        assert!(matches!(t.tick_at(0).unwrap(), Tick::Fresh(_)));
        assert!(!t.needs_recompute(3600));
        assert_eq!(t.tick_at(3600).unwrap().code().unwrap().code, "287082");
    }

    #[test]
    fn progress_bar_shrinks() {
        assert_eq!(progress_bar(0.0), format!("[{}]", "#".repeat(20)));
        assert_eq!(progress_bar(1.0), format!("[{}]", ".".repeat(20)));
        assert_eq!(progress_bar(0.5), format!("[{}{}]", "#".repeat(10), ".".repeat(10)));
    }

    #[test]
    fn render_lines() {
        let mut t = ticker(OtpConfig::totp(RFC_SECRET), 10);
        let line = render_code(t.tick_at(59).unwrap().code().unwrap());
        assert!(line.starts_with("287 082  ["));
        assert!(line.ends_with(" 1s"));

        let mut h = ticker(OtpConfig::hotp(RFC_SECRET, 0), 10);
        let line = render_code(h.tick_at(0).unwrap().code().unwrap());
        assert_eq!(line, "755 224  (counter 0, next 1)");
    }
}
