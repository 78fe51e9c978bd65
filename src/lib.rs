//! Terminal host for the Valor OTP engine.
//!
//! Owns the process-wide [`RateGovernor`], turns [`Settings`] into one of
//! the run modes and prints results. All OTP logic lives in `valor-otp`.

pub mod logging;
pub mod settings;
pub mod ticker;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use valor_otp::governor::RateGovernor;
use valor_otp::otp::core::current_unix_time;
use valor_otp::otp::{
    generate_secret, key_uri, parse_input, qr_data_uri, qr_terminal, OtpConfig, OtpError,
    OtpService, Reveal, VerifyResult,
};

use settings::{Mode, Settings};
use ticker::{render_code, Tick, Ticker};

/// Error surfaced to the user: an engine error or an I/O failure.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("{0} [{code}]", code = .0.kind.code())]
    Otp(#[from] OtpError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no secret or otpauth:// URI given")]
    MissingInput,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn run(settings: Settings) -> ExitCode {
    match execute(settings).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = %e, "run failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(settings: Settings) -> Result<ExitCode, HostError> {
    if let Mode::GenerateSecret(label) = &settings.mode {
        let out = enrollment_output(&settings, label.as_deref())?;
        println!("{}", out);
        return Ok(ExitCode::SUCCESS);
    }

    let input = match &settings.input {
        Some(input) => input.clone(),
        None => read_stdin_line().await?,
    };
    if input.trim().is_empty() {
        return Err(HostError::MissingInput);
    }

    let governor = Arc::new(RateGovernor::new(settings.governor));
    tracing::info!(
        max_requests = settings.governor.max_requests,
        window_secs = settings.governor.window.as_secs(),
        "rate governor ready"
    );
    let service = OtpService::new(governor);

    let reveal = match &settings.mode {
        Mode::Verify(code) => {
            let config = build_config(&input, settings.counter)?;
            let result = service.verify(&config, code, settings.drift_window)?;
            println!("{}", verify_output(&result, settings.json));
            return Ok(if result.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Mode::Watch => {
            let config = build_config(&input, settings.counter)?;
            if config.kind() == valor_otp::otp::OtpType::Totp {
                watch(Ticker::new(service, config), settings.json).await?;
                return Ok(ExitCode::SUCCESS);
            }
            service.reveal_config(&config)?
        }
        // raw input goes through the governor before it is decoded
        _ if settings.counter.is_none() => service.reveal(input.trim())?,
        _ => service.reveal_config(&build_config(&input, settings.counter)?)?,
    };
    println!("{}", reveal_output(&reveal, settings.json));
    Ok(if reveal.is_throttled() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Building blocks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse user input and apply a counter override, if any.
pub fn build_config(input: &str, counter: Option<u64>) -> Result<OtpConfig, HostError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(HostError::MissingInput);
    }
    let config = parse_input(trimmed)?;
    Ok(match counter {
        Some(c) => config.with_counter(c),
        None => config,
    })
}

async fn read_stdin_line() -> Result<String, HostError> {
    read_input_line(tokio::io::BufReader::new(tokio::io::stdin())).await
}

/// First line of `reader`, which must hold a secret or URI.
pub async fn read_input_line<R>(mut reader: R) -> Result<String, HostError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    if line.trim().is_empty() {
        return Err(HostError::MissingInput);
    }
    Ok(line)
}

/// Print the live code once per second until Ctrl-C.
async fn watch(mut ticker: Ticker, json: bool) -> Result<(), HostError> {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let tick = ticker.tick_at(current_unix_time())?;
                write_tick(&mut stdout, &tick, json)?;
            }
            _ = tokio::signal::ctrl_c() => {
                if !json {
                    writeln!(stdout)?;
                }
                tracing::info!("interrupted");
                return Ok(());
            }
        }
    }
}

fn write_tick<W: Write>(out: &mut W, tick: &Tick, json: bool) -> std::io::Result<()> {
    if json {
        // one object per fresh code, nothing for countdown ticks
        return match tick {
            Tick::Fresh(code) => writeln!(out, "{}", to_json(&Reveal::Code(code.clone()))),
            Tick::Countdown(_) => Ok(()),
            Tick::Throttled {
                retry_after_seconds,
            } => writeln!(
                out,
                "{}",
                to_json(&Reveal::Throttled {
                    retry_after_seconds: *retry_after_seconds
                })
            ),
        };
    }
    match tick {
        Tick::Fresh(code) | Tick::Countdown(code) => write!(out, "\r{}", render_code(code))?,
        Tick::Throttled {
            retry_after_seconds,
        } => write!(out, "\rthrottled, retry in {}s", retry_after_seconds)?,
    }
    out.flush()
}

pub fn reveal_output(reveal: &Reveal, json: bool) -> String {
    if json {
        return to_json(reveal);
    }
    match reveal {
        Reveal::Code(code) => render_code(code),
        Reveal::Throttled {
            retry_after_seconds,
        } => format!(
            "Too many attempts. Please try again in {} seconds.",
            retry_after_seconds
        ),
    }
}

pub fn verify_output(result: &VerifyResult, json: bool) -> String {
    if json {
        return to_json(result);
    }
    if result.valid {
        format!("valid (drift {})", result.drift)
    } else {
        "invalid".to_string()
    }
}

#[derive(Serialize)]
struct Enrollment<'a> {
    secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<&'a str>,
    /// PNG data URI of the QR code for `uri`.
    #[serde(skip_serializing_if = "Option::is_none")]
    qr_code: Option<String>,
}

/// New secret, plus an enrollment URI and its QR code when a label is
/// given. Text output draws the QR code below the URI.
pub fn enrollment_output(settings: &Settings, label: Option<&str>) -> Result<String, HostError> {
    let secret = generate_secret(settings.secret_bytes);
    let uri = label.map(|l| key_uri(l, &settings.issuer, &secret));
    if settings.json {
        let qr_code = uri.as_deref().map(qr_data_uri).transpose()?;
        return Ok(to_json(&Enrollment {
            secret: &secret,
            uri: uri.as_deref(),
            qr_code,
        }));
    }
    Ok(match uri {
        Some(uri) => {
            let qr = qr_terminal(&uri)?;
            format!("{}\n{}\n{}", secret, uri, qr)
        }
        None => secret,
    })
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use valor_otp::otp::OtpErrorKind;

    #[test]
    fn build_config_applies_counter_override() {
        let config = build_config("otpauth://hotp/x?secret=JBSWY3DPEHPK3PXP&counter=3", Some(9))
            .unwrap();
        assert_eq!(config.counter(), 9);
    }

    #[test]
    fn build_config_rejects_blank_input() {
        assert!(matches!(build_config("  \n", None), Err(HostError::MissingInput)));
    }

    #[test]
    fn host_error_shows_machine_code() {
        let err = build_config("not-a-valid-secret!!", None).unwrap_err();
        match &err {
            HostError::Otp(e) => assert_eq!(e.kind, OtpErrorKind::UnsupportedSecretEncoding),
            other => panic!("unexpected {:?}", other),
        }
        assert!(err.to_string().ends_with("[INVALID_SECRET]"));
    }

    #[tokio::test]
    async fn input_line_is_read_from_a_stream() {
        let stream = tokio_test::io::Builder::new()
            .read(b"JBSWY3DPEHPK3PXP\nignored\n")
            .build();
        let line = read_input_line(tokio::io::BufReader::new(stream)).await.unwrap();
        assert_eq!(build_config(&line, None).unwrap().secret().len(), 10);
    }

    #[tokio::test]
    async fn empty_stream_is_missing_input() {
        let stream = tokio_test::io::Builder::new().build();
        let err = read_input_line(tokio::io::BufReader::new(stream)).await.unwrap_err();
        assert!(matches!(err, HostError::MissingInput));
    }

    #[test]
    fn throttled_text_matches_user_message() {
        let out = reveal_output(
            &Reveal::Throttled {
                retry_after_seconds: 12,
            },
            false,
        );
        assert_eq!(out, "Too many attempts. Please try again in 12 seconds.");
    }

    // ── enrollment ──

    fn enrollment_settings(json: bool) -> Settings {
        Settings {
            json,
            issuer: "Acme".into(),
            ..Settings::default()
        }
    }

    #[test]
    fn enrollment_text_draws_qr_below_uri() {
        let out = enrollment_output(&enrollment_settings(false), Some("alice")).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0].len(), 32);
        assert!(lines[1].starts_with("otpauth://totp/Acme:alice?secret="));
        assert!(lines.len() > 10);
        assert!(lines[2..].iter().all(|l| l.chars().all(|c| " ▀▄█".contains(c))));
    }

    #[test]
    fn enrollment_json_carries_qr_data_uri() {
        let out = enrollment_output(&enrollment_settings(true), Some("alice")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(v["uri"].as_str().unwrap().starts_with("otpauth://totp/"));
        assert!(v["qr_code"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[test]
    fn unlabelled_enrollment_is_just_the_secret() {
        let out = enrollment_output(&enrollment_settings(false), None).unwrap();
        assert_eq!(out.lines().count(), 1);
        let out = enrollment_output(&enrollment_settings(true), None).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(v.get("uri").is_none());
        assert!(v.get("qr_code").is_none());
    }

    #[test]
    fn countdown_ticks_are_silent_in_json() {
        let code = valor_otp::otp::GeneratedCode {
            code: "287082".into(),
            kind: valor_otp::otp::OtpType::Totp,
            remaining_seconds: Some(1),
            period: Some(30),
            progress: Some(29.0 / 30.0),
            counter: 1,
        };
        let mut buf = Vec::new();
        write_tick(&mut buf, &Tick::Countdown(code.clone()), true).unwrap();
        assert!(buf.is_empty());
        write_tick(&mut buf, &Tick::Fresh(code), true).unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert!(line.starts_with(r#"{"status":"code","code":"287082""#));
    }

    #[test]
    fn text_ticks_rewrite_the_line() {
        let mut buf = Vec::new();
        write_tick(
            &mut buf,
            &Tick::Throttled {
                retry_after_seconds: 3,
            },
            false,
        )
        .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "\rthrottled, retry in 3s");
    }
}
