//! OTP engine: sub-modules.

pub mod types;
pub mod encoding;
pub mod secret;
pub mod uri;
pub mod core;
pub mod qr;
pub mod service;

// Re-export top-level items for convenience.
pub use types::*;
pub use secret::{decode_secret, fingerprint, generate_secret};
pub use uri::{key_uri, parse_input, parse_otpauth_uri};
pub use qr::{qr_data_uri, qr_png, qr_terminal};
pub use service::{OtpService, Reveal};
