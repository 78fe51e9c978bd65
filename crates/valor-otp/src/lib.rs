//! # Valor – One-Time Password Engine
//!
//! Stateless HOTP/TOTP engine plus an admission gate:
//!
//! - **Secret decoding** – hex (`0x`-prefixed or plain), base-32 and base-64
//!   secrets, tried in a fixed precedence order
//! - **otpauth:// URIs** – Parsing with permissive coercion of auxiliary parameters
//! - **RFC 4226 / 6238** – HOTP & TOTP generation with SHA-1, SHA-256, SHA-512
//! - **Verification** – Drift-window checks with constant-time comparison
//! - **Rate governor** – Fixed-window limiter keyed by a secret fingerprint

pub mod governor;
pub mod otp;
