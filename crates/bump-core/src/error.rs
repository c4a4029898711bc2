//! Error types for `bump-core`.
//!
//! Every business-rule violation is a distinct, expected outcome. Only
//! infrastructure failures (storage, hashing, randomness) collapse into
//! [`ErrorKind::Internal`].

use thiserror::Error;

/// The outcome categories a caller is expected to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Conflict,
  Forbidden,
  Validation,
  RateLimited,
  Internal,
}

#[derive(Debug, Error)]
pub enum Error {
  /// Absent, not owned by the caller, or in a terminal state. These cases
  /// are reported identically.
  #[error("not found: {0}")]
  NotFound(&'static str),

  #[error("conflict: {0}")]
  Conflict(&'static str),

  #[error("forbidden: {0}")]
  Forbidden(&'static str),

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("too many attempts, try again later")]
  RateLimited,

  #[error("random source unavailable: {0}")]
  Random(String),

  #[error("code hashing failed: {0}")]
  Hash(String),

  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::NotFound(_) => ErrorKind::NotFound,
      Self::Conflict(_) => ErrorKind::Conflict,
      Self::Forbidden(_) => ErrorKind::Forbidden,
      Self::Validation(_) => ErrorKind::Validation,
      Self::RateLimited => ErrorKind::RateLimited,
      Self::Random(_) | Self::Hash(_) | Self::Task(_) | Self::Store(_) => {
        ErrorKind::Internal
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
