use std::sync::Arc;
use std::time::{Duration, Instant};

use valor_lib::settings::{Mode, Settings};
use valor_lib::ticker::{Tick, Ticker};
use valor_lib::{build_config, enrollment_output, reveal_output, verify_output, HostError};
use valor_otp::governor::{GovernorConfig, RateGovernor};
use valor_otp::otp::core::{generate_code_at, verify_code_at};
use valor_otp::otp::{decode_secret, parse_input, OtpErrorKind, OtpService, OtpType, Reveal};

fn service(max: u32, window: Duration) -> OtpService {
    OtpService::new(Arc::new(RateGovernor::new(GovernorConfig::new(max, window))))
}

// ── Decoder and parser ───────────────────────────────────────────────

#[test]
fn hex_takes_precedence_over_base32() {
    assert_eq!(decode_secret("2A2B2C2D").unwrap(), vec![0x2A, 0x2B, 0x2C, 0x2D]);
}

#[test]
fn garbage_secret_is_reported_not_panicked() {
    let err = parse_input("not-a-valid-secret!!").unwrap_err();
    assert_eq!(err.kind, OtpErrorKind::UnsupportedSecretEncoding);
}

#[test]
fn uri_digits_are_coerced() {
    let config = parse_input("otpauth://totp/x?secret=JBSWY3DPEHPK3PXP&digits=99").unwrap();
    assert_eq!(config.digits(), 6);
}

#[test]
fn uri_and_bare_secret_agree() {
    let bare = parse_input("JBSWY3DPEHPK3PXP").unwrap();
    let uri = parse_input(
        "otpauth://totp/ACME%20Co:john@example.com?secret=JBSW%20Y3DP%20EHPK%203PXP&issuer=ACME%20Co",
    )
    .unwrap();
    assert_eq!(uri.label(), Some("ACME Co:john@example.com"));
    assert_eq!(uri.issuer(), Some("ACME Co"));
    assert_eq!(
        generate_code_at(&bare, 1_700_000_000).unwrap().code,
        generate_code_at(&uri, 1_700_000_000).unwrap().code
    );
}

// ── Generator ────────────────────────────────────────────────────────

#[test]
fn rfc6238_through_a_uri() {
    // "12345678901234567890" in base-32
    let uri = "otpauth://totp/rfc?secret=GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ&digits=8";
    let config = parse_input(uri).unwrap();
    assert_eq!(generate_code_at(&config, 59).unwrap().code, "94287082");
    assert_eq!(generate_code_at(&config, 1234567890).unwrap().code, "89005924");
}

#[test]
fn hotp_counter_is_owned_by_the_caller() {
    let mut config =
        build_config("otpauth://hotp/x?secret=GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ", None).unwrap();
    assert_eq!(config.kind(), OtpType::Hotp);

    let first = generate_code_at(&config, 0).unwrap();
    let again = generate_code_at(&config, 999).unwrap();
    assert_eq!(first.code, "755224");
    assert_eq!(first, again);

    config.advance_counter();
    assert_eq!(generate_code_at(&config, 0).unwrap().code, "287082");
    assert_eq!(first.next_counter(), Some(config.counter()));
}

#[test]
fn verify_accepts_neighbouring_step() {
    let config = parse_input("3132333435363738393031323334353637383930").unwrap();
    let previous = generate_code_at(&config, 29).unwrap().code;
    let result = verify_code_at(&config, &previous, 1, 45).unwrap();
    assert!(result.valid);
    assert_eq!(result.drift, -1);
    assert_eq!(verify_output(&result, false), "valid (drift -1)");
}

// ── Governor ─────────────────────────────────────────────────────────

#[test]
fn governor_fourth_call_denied_then_resets() {
    let governor = RateGovernor::new(GovernorConfig::new(3, Duration::from_millis(1000)));
    let t0 = Instant::now();
    for _ in 0..3 {
        assert!(governor.check_at("fp", t0).allowed);
    }
    let denied = governor.check_at("fp", t0 + Duration::from_millis(200));
    assert!(!denied.allowed);
    assert!(denied.retry_after_seconds.unwrap() > 0);

    assert!(governor.check_at("fp", t0 + Duration::from_millis(1200)).allowed);
    assert_eq!(governor.count("fp"), 1);
}

#[tokio::test]
async fn shared_governor_holds_across_tasks() {
    let svc = service(5, Duration::from_secs(60));
    let mut handles = Vec::new();
    for _ in 0..10 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.reveal_at("JBSWY3DPEHPK3PXP", 59).unwrap()
        }));
    }
    let mut codes = 0;
    let mut throttled = 0;
    for h in handles {
        match h.await.unwrap() {
            Reveal::Code(_) => codes += 1,
            Reveal::Throttled { .. } => throttled += 1,
        }
    }
    assert_eq!(codes, 5);
    assert_eq!(throttled, 5);
}

#[tokio::test]
async fn ticker_drives_a_poll_loop() {
    let config = parse_input("3132333435363738393031323334353637383930").unwrap();
    let mut ticker = Ticker::new(service(10, Duration::from_secs(60)), config);
    let mut fresh = 0;
    let mut interval = tokio::time::interval(Duration::from_millis(1));
    // simulated clock: 58, 59, 60, 61
    for now in 58..62 {
        interval.tick().await;
        if let Tick::Fresh(code) = ticker.tick_at(now).unwrap() {
            fresh += 1;
            assert!(code.remaining_seconds.unwrap() >= 1);
        }
    }
    assert_eq!(fresh, 2);
}

// ── Host output ──────────────────────────────────────────────────────

#[test]
fn reveal_output_as_json() {
    let svc = service(1, Duration::from_secs(60));
    let reveal = svc.reveal_at("JBSWY3DPEHPK3PXP", 59).unwrap();
    let value: serde_json::Value = serde_json::from_str(&reveal_output(&reveal, true)).unwrap();
    assert_eq!(value["status"], "code");
    assert_eq!(value["kind"], "totp");
    assert_eq!(value["remaining_seconds"], 1);
}

#[test]
fn enrollment_round_trips_through_the_parser() {
    let settings = Settings {
        mode: Mode::GenerateSecret(Some("alice@example.com".into())),
        issuer: "Valor Auth".into(),
        ..Settings::default()
    };
    let out = enrollment_output(&settings, Some("alice@example.com")).unwrap();
    let mut lines = out.lines();
    let secret = lines.next().unwrap();
    let uri = lines.next().unwrap();
    assert!(lines.next().is_some(), "QR code follows the URI");

    let config = parse_input(uri).unwrap();
    assert_eq!(config.secret().expose(), decode_secret(secret).unwrap().as_slice());
    assert_eq!(config.issuer(), Some("Valor Auth"));
    assert_eq!(config.label(), Some("Valor Auth:alice@example.com"));
}

#[test]
fn unsupported_type_surfaces_machine_code() {
    let err = build_config("otpauth://motp/x?secret=JBSWY3DPEHPK3PXP", None).unwrap_err();
    assert!(matches!(&err, HostError::Otp(e) if e.kind == OtpErrorKind::UnsupportedOtpType));
    assert!(err.to_string().ends_with("[INVALID_INPUT]"));
}
