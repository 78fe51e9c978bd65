//! Host settings: command-line options plus environment.

use std::time::Duration;

use valor_otp::governor::GovernorConfig;

/// Environment variable holding the tracing filter directive.
pub const ENV_LOG: &str = "VALOR_LOG";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_DRIFT_WINDOW: u32 = 1;
const DEFAULT_ISSUER: &str = "Valor";
const DEFAULT_SECRET_BYTES: usize = 20;

/// What the binary should do once started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Keep printing the live code until interrupted.
    Watch,
    /// Print a single code and exit.
    Once,
    /// Check a code and exit with its verdict.
    Verify(String),
    /// Print a fresh base-32 secret, plus an enrollment URI when labelled.
    GenerateSecret(Option<String>),
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub mode: Mode,
    /// Bare secret or `otpauth://` URI. Read from stdin when absent.
    pub input: Option<String>,
    /// Print machine-readable JSON instead of text.
    pub json: bool,
    /// HOTP counter overriding the one in the input.
    pub counter: Option<u64>,
    /// Steps (TOTP) or counters (HOTP) tolerated by `--verify`.
    pub drift_window: u32,
    pub issuer: String,
    pub secret_bytes: usize,
    pub governor: GovernorConfig,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: Mode::Watch,
            input: None,
            json: false,
            counter: None,
            drift_window: DEFAULT_DRIFT_WINDOW,
            issuer: DEFAULT_ISSUER.to_string(),
            secret_bytes: DEFAULT_SECRET_BYTES,
            governor: GovernorConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Settings {
    /// Build settings from the process arguments and environment.
    pub fn from_env_and_args() -> Result<Self, String> {
        Self::parse(
            std::env::args().skip(1),
            |name| std::env::var(name).ok(),
        )
    }

    /// Parse `args` (without the program name) using `lookup` for
    /// environment variables.
    pub fn parse<I, F>(args: I, lookup: F) -> Result<Self, String>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings {
            governor: GovernorConfig::from_lookup(&lookup),
            ..Settings::default()
        };
        if let Some(filter) = lookup(ENV_LOG).filter(|f| !f.trim().is_empty()) {
            settings.log_filter = filter;
        }

        let args: Vec<String> = args.into_iter().collect();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--help" | "-h" => {
                    settings.mode = Mode::Help;
                    return Ok(settings);
                }
                "--once" => {
                    settings.mode = Mode::Once;
                    i += 1;
                }
                "--json" => {
                    settings.json = true;
                    i += 1;
                }
                "--counter" => {
                    settings.counter = Some(number_arg(&args, i)?);
                    i += 2;
                }
                "--window" => {
                    settings.drift_window = number_arg(&args, i)?;
                    i += 2;
                }
                "--verify" => {
                    let code = value_arg(&args, i)?;
                    settings.mode = Mode::Verify(code.to_string());
                    i += 2;
                }
                "--issuer" => {
                    settings.issuer = value_arg(&args, i)?.to_string();
                    i += 2;
                }
                "--bytes" => {
                    settings.secret_bytes = number_arg(&args, i)?;
                    if settings.secret_bytes == 0 {
                        return Err("--bytes must be positive".to_string());
                    }
                    i += 2;
                }
                "--rate-limit" => {
                    settings.governor.max_requests = number_arg(&args, i)?;
                    i += 2;
                }
                "--rate-window" => {
                    // same bound as VALOR_RATE_LIMIT_WINDOW
                    let secs: u32 = number_arg(&args, i)?;
                    if secs == 0 {
                        return Err("--rate-window must be positive".to_string());
                    }
                    settings.governor.window = Duration::from_secs(secs as u64);
                    i += 2;
                }
                "--generate-secret" => {
                    // optional label: taken unless the next token is a flag
                    let label = args
                        .get(i + 1)
                        .filter(|next| !next.starts_with("--"))
                        .cloned();
                    i += if label.is_some() { 2 } else { 1 };
                    settings.mode = Mode::GenerateSecret(label);
                }
                other if other.starts_with("--") => {
                    return Err(format!("unknown option {}", other));
                }
                other => {
                    if settings.input.is_some() {
                        return Err("only one secret or URI may be given".to_string());
                    }
                    settings.input = Some(other.to_string());
                    i += 1;
                }
            }
        }
        Ok(settings)
    }
}

fn value_arg<'a>(args: &'a [String], i: usize) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(|s| s.as_str())
        .ok_or_else(|| format!("{} requires a value", args[i]))
}

fn number_arg<T: std::str::FromStr>(args: &[String], i: usize) -> Result<T, String> {
    let raw = value_arg(args, i)?;
    raw.parse()
        .map_err(|_| format!("{} expects a non-negative integer, got {:?}", args[i], raw))
}

pub fn print_usage() {
    eprintln!("Usage: valor [OPTIONS] [SECRET | otpauth://URI]");
    eprintln!();
    eprintln!("Reads the secret from stdin when none is given.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --once                    Print one code and exit");
    eprintln!("  --json                    Print results as JSON");
    eprintln!("  --counter <N>             HOTP counter to use instead of the URI's");
    eprintln!("  --verify <CODE>           Check CODE instead of printing one");
    eprintln!("  --window <N>              Drift window for --verify (default: 1)");
    eprintln!("  --generate-secret [LABEL] New secret; URI and QR code if LABEL is given");
    eprintln!("  --issuer <NAME>           Issuer for generated URIs (default: Valor)");
    eprintln!("  --bytes <N>               Length of generated secrets (default: 20)");
    eprintln!("  --rate-limit <N>          Reveals allowed per window (default: 10)");
    eprintln!("  --rate-window <SECS>      Rate window length (default: 60)");
    eprintln!("  --help                    Show this help message");
    eprintln!();
    eprintln!("Environment variables:");
    eprintln!("  VALOR_LOG                  Log filter (default: info)");
    eprintln!("  VALOR_RATE_LIMIT_REQUESTS  Reveals allowed per window");
    eprintln!("  VALOR_RATE_LIMIT_WINDOW    Rate window length in seconds");
}
