//! Invite code codec: generation, normalisation and display helpers.
//!
//! A code is ten symbols drawn from an alphabet without visually confusable
//! characters (`0`/`O`, `1`/`I`/`L`). People see it grouped as
//! `XXXX-XXXX-XX`; input is accepted in any case and with any separators.

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};

use crate::{Error, Result};

/// The symbols a code may contain.
pub const ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Number of symbols in a normalised code.
pub const CODE_LEN: usize = 10;

/// Number of leading symbols that may be shown without revealing the code.
pub const PREFIX_LEN: usize = 4;

const SEPARATOR: char = '-';

// Bytes at or above this value are discarded so every symbol is equally
// likely.
const REJECT_FROM: usize = 256 / ALPHABET.len() * ALPHABET.len();

// ─── Generation ──────────────────────────────────────────────────────────────

/// Generate a fresh code from the operating system's CSPRNG, formatted for
/// display.
pub fn generate() -> Result<String> { generate_from(&mut OsRng) }

/// Generate a code from `rng`. Fails if the generator reports an error; there
/// is no fallback source.
pub fn generate_from<R: RngCore + ?Sized>(rng: &mut R) -> Result<String> {
  let mut symbols = String::with_capacity(CODE_LEN);
  let mut buf = [0u8; 16];

  while symbols.len() < CODE_LEN {
    rng
      .try_fill_bytes(&mut buf)
      .map_err(|e| Error::Random(e.to_string()))?;

    for byte in buf.iter().map(|b| usize::from(*b)) {
      if byte < REJECT_FROM && symbols.len() < CODE_LEN {
        symbols.push(char::from(ALPHABET[byte % ALPHABET.len()]));
      }
    }
  }

  Ok(format(&symbols))
}

// ─── Normalisation ───────────────────────────────────────────────────────────

/// Uppercase and strip separators and whitespace. Idempotent.
pub fn normalize(input: &str) -> String {
  input
    .chars()
    .filter(|c| *c != SEPARATOR && !c.is_whitespace())
    .map(|c| c.to_ascii_uppercase())
    .collect()
}

/// `true` iff `input` normalises to exactly [`CODE_LEN`] alphabet symbols.
pub fn validate_format(input: &str) -> bool {
  let normalized = normalize(input);
  normalized.len() == CODE_LEN
    && normalized.bytes().all(|b| ALPHABET.contains(&b))
}

/// The first [`PREFIX_LEN`] normalised symbols.
pub fn prefix(code: &str) -> String {
  normalize(code).chars().take(PREFIX_LEN).collect()
}

// ─── Display ─────────────────────────────────────────────────────────────────

/// Group a code as `XXXX-XXXX-XX`.
pub fn format(code: &str) -> String {
  let normalized = normalize(code);
  let mut out = String::with_capacity(normalized.len() + 2);
  for (i, c) in normalized.chars().enumerate() {
    if i == 4 || i == 8 {
      out.push(SEPARATOR);
    }
    out.push(c);
  }
  out
}

/// Display form of a stored prefix with the secret part masked.
pub fn redact(prefix: &str) -> String { format!("{prefix}-****-**") }

/// Human-readable time remaining, e.g. `"23h 45m"`, `"12m"` or `"expired"`.
pub fn expires_in(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let remaining = expires_at - now;
  if remaining <= chrono::Duration::zero() {
    return "expired".to_owned();
  }

  let hours = remaining.num_hours();
  let minutes = remaining.num_minutes() % 60;
  if hours > 0 {
    format!("{hours}h {minutes}m")
  } else {
    format!("{minutes}m")
  }
}
