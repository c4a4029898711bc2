//! One-way hashing of invite codes.
//!
//! Codes are short and typed by people, so they are stored only as salted
//! argon2id PHC strings. Verification is deliberately slow; the blocking work
//! is moved off the async runtime by the `*_blocking` helpers.

use argon2::{
  Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier,
  Version,
  password_hash::{self, SaltString},
};
use rand_core::OsRng;

use crate::{Error, Result, code, invite::InviteCode};

/// Hashes and verifies invite codes. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct CodeHasher {
  params: Params,
}

impl Default for CodeHasher {
  fn default() -> Self { Self { params: Params::default() } }
}

impl CodeHasher {
  /// Build a hasher with explicit argon2 cost parameters.
  pub fn with_cost(memory_kib: u32, iterations: u32, lanes: u32) -> Result<Self> {
    let params = Params::new(memory_kib, iterations, lanes, None)
      .map_err(|e| Error::Hash(e.to_string()))?;
    Ok(Self { params })
  }

  fn argon2(&self) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
  }

  /// Normalise `code` and hash it with a fresh salt.
  pub fn hash(&self, code: &str) -> Result<String> {
    let normalized = code::normalize(code);
    let salt = SaltString::generate(&mut OsRng);
    self
      .argon2()
      .hash_password(normalized.as_bytes(), &salt)
      .map(|hash| hash.to_string())
      .map_err(|e| Error::Hash(e.to_string()))
  }

  /// Check `code` against a stored PHC string.
  ///
  /// A mismatch is `Ok(false)`; only a malformed stored hash is an error.
  pub fn verify(&self, code: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::Hash(e.to_string()))?;
    let normalized = code::normalize(code);
    match self.argon2().verify_password(normalized.as_bytes(), &parsed) {
      Ok(()) => Ok(true),
      Err(password_hash::Error::Password) => Ok(false),
      Err(e) => Err(Error::Hash(e.to_string())),
    }
  }

  /// [`hash`](Self::hash) on the blocking thread pool.
  pub async fn hash_blocking(&self, code: String) -> Result<String> {
    let hasher = self.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&code)).await?
  }

  /// Test `code` against each candidate in turn and return the first match.
  ///
  /// Candidates with a malformed stored hash are skipped.
  pub async fn find_match(
    &self,
    code:       String,
    candidates: Vec<InviteCode>,
  ) -> Result<Option<InviteCode>> {
    let hasher = self.clone();
    tokio::task::spawn_blocking(move || {
      for candidate in candidates {
        match hasher.verify(&code, &candidate.code_hash) {
          Ok(true) => return Ok(Some(candidate)),
          Ok(false) => {}
          Err(e) => {
            tracing::warn!(code_id = %candidate.code_id, error = %e, "skipping unreadable code hash");
          }
        }
      }
      Ok(None)
    })
    .await?
  }
}
