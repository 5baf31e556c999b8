//! Time-based one-time passwords (RFC 6238, HMAC-SHA1).
//!
//! Parameters are the ones every authenticator app defaults to: 6 digits,
//! 30 second steps, 20-byte secrets shared as unpadded base32.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Digits in a code.
pub const DIGITS: usize = 6;
/// Seconds per time step.
pub const STEP_SECONDS: u64 = 30;
/// Steps accepted either side of the current one, to absorb clock drift.
pub const SKEW_STEPS: u64 = 1;
/// Bytes of a generated secret (160 bits, the RFC 4226 recommendation).
pub const SECRET_BYTES: usize = 20;
/// Shortest secret accepted from a client (RFC 4226 minimum of 128 bits).
const MIN_SECRET_BYTES: usize = 16;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Why a base32 secret was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("secret is not valid base32")]
    InvalidBase32,
    #[error("secret must be at least {min} bytes")]
    TooShort { min: usize },
}

/// A TOTP shared secret.
///
/// `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret(Vec<u8>);

impl TotpSecret {
    /// Generate a fresh random secret.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = vec![0_u8; SECRET_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse a base32 secret. Case, spaces and `=` padding are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError`] if the text is not base32 or decodes to fewer
    /// than 16 bytes.
    pub fn from_base32(encoded: &str) -> Result<Self, SecretError> {
        let bytes = base32_decode(encoded).ok_or(SecretError::InvalidBase32)?;
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(SecretError::TooShort {
                min: MIN_SECRET_BYTES,
            });
        }
        Ok(Self(bytes))
    }

    /// Unpadded base32, as shown to the user and stored in the database.
    #[must_use]
    pub fn to_base32(&self) -> String {
        base32_encode(&self.0)
    }

    /// The code for an RFC 4226 counter value.
    #[must_use]
    pub fn code_at_counter(&self, counter: u64) -> Option<String> {
        let mut mac = HmacSha1::new_from_slice(&self.0).ok()?;
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        // Dynamic truncation
        let offset = usize::from(digest.last()? & 0x0f);
        let [a, b, c, d] = <[u8; 4]>::try_from(digest.get(offset..offset + 4)?).ok()?;
        let binary = u32::from_be_bytes([a & 0x7f, b, c, d]);

        Some(format!("{:06}", binary % 1_000_000))
    }

    /// The code for a Unix timestamp.
    #[must_use]
    pub fn code_at(&self, unix_seconds: u64) -> Option<String> {
        self.code_at_counter(unix_seconds / STEP_SECONDS)
    }

    /// Check a submitted code against the steps around `unix_seconds`.
    ///
    /// Anything other than exactly six ASCII digits (after trimming) is
    /// rejected before any HMAC is computed.
    #[must_use]
    pub fn verify(&self, code: &str, unix_seconds: u64) -> bool {
        let code = code.trim();
        if !is_well_formed(code) {
            return false;
        }

        let current = unix_seconds / STEP_SECONDS;
        let mut matched = false;
        for counter in current.saturating_sub(SKEW_STEPS)..=current.saturating_add(SKEW_STEPS) {
            if let Some(expected) = self.code_at_counter(counter) {
                matched |= constant_time_compare(&expected, code);
            }
        }
        matched
    }

    /// `otpauth://` URI for QR enrollment.
    #[must_use]
    pub fn provisioning_uri(&self, issuer: &str, account: &str) -> String {
        let issuer = urlencoding::encode(issuer);
        let account = urlencoding::encode(account);
        format!(
            "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={DIGITS}&period={STEP_SECONDS}",
            secret = self.to_base32(),
        )
    }
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TotpSecret([REDACTED])")
    }
}

/// Seconds since the Unix epoch, clamped to zero for pre-1970 clocks.
#[must_use]
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Whether `code` is exactly [`DIGITS`] ASCII digits.
#[must_use]
pub fn is_well_formed(code: &str) -> bool {
    code.len() == DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}

/// Constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

// =============================================================================
// Base32 (RFC 4648, no padding)
// =============================================================================

fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(5) * 8);
    let mut buffer: u16 = 0;
    let mut bits: u32 = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | u16::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(alphabet_char((buffer >> bits) & 0x1f));
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(alphabet_char((buffer << (5 - bits)) & 0x1f));
    }
    out
}

fn alphabet_char(index: u16) -> char {
    BASE32_ALPHABET
        .get(usize::from(index))
        .map_or('A', |&c| char::from(c))
}

fn base32_decode(encoded: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for c in encoded.chars() {
        if c.is_whitespace() || c == '=' {
            continue;
        }
        let upper = u8::try_from(c.to_ascii_uppercase()).ok()?;
        let value = BASE32_ALPHABET.iter().position(|&a| a == upper)?;
        buffer = (buffer << 5) | u32::try_from(value).ok()?;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(u8::try_from((buffer >> bits) & 0xff).ok()?);
            buffer &= (1 << bits) - 1;
        }
    }
    Some(out)
}
