//! Throttling of failed invite-code redemptions.
//!
//! Every redemption attempt is recorded. A user with too many failures in the
//! trailing window is refused before their code is even looked at.

use chrono::{DateTime, Duration, Utc};

use crate::{Error, Result, service::SharingService, store::SharingStore};

/// Throttle settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
  pub max_failures: u32,
  pub window:       Duration,
}

impl Default for RateLimit {
  fn default() -> Self { Self { max_failures: 5, window: Duration::hours(1) } }
}

impl RateLimit {
  pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> { now - self.window }

  /// `true` while `failures` is below the limit.
  pub fn allows(&self, failures: u32) -> bool { failures < self.max_failures }
}

/// One recorded redemption attempt.
#[derive(Debug, Clone)]
pub struct CodeAttempt {
  pub user_id:      String,
  pub attempted_at: DateTime<Utc>,
  pub success:      bool,
  pub origin:       Option<String>,
}

impl<S: SharingStore> SharingService<S> {
  /// Failed attempts by `user_id` within the configured window.
  pub async fn count_recent_failures(&self, user_id: &str) -> Result<u32> {
    let since = self.policy.rate_limit.window_start(self.now());
    self
      .store
      .count_failed_attempts(user_id, since)
      .await
      .map_err(Error::store)
  }

  pub async fn record_attempt(
    &self,
    user_id: &str,
    success: bool,
    origin:  Option<&str>,
  ) -> Result<()> {
    let attempt = CodeAttempt {
      user_id: user_id.to_owned(),
      attempted_at: self.now(),
      success,
      origin: origin.map(str::to_owned),
    };
    self.store.record_attempt(attempt).await.map_err(Error::store)
  }

  /// Refuse with `RateLimited` once the user has used up their failures.
  ///
  /// If the count cannot be read the attempt is allowed through.
  pub(crate) async fn ensure_not_throttled(&self, user_id: &str) -> Result<()> {
    match self.count_recent_failures(user_id).await {
      Ok(failures) if !self.policy.rate_limit.allows(failures) => {
        tracing::warn!(user_id, failures, "redemption throttled");
        Err(Error::RateLimited)
      }
      Ok(_) => Ok(()),
      Err(e) => {
        tracing::warn!(user_id, error = %e, "could not count failed attempts");
        Ok(())
      }
    }
  }

  /// Record an attempt; failure to do so is logged and otherwise ignored.
  pub(crate) async fn note_attempt(&self, user_id: &str, success: bool, origin: Option<&str>) {
    if let Err(e) = self.record_attempt(user_id, success, origin).await {
      tracing::warn!(user_id, success, error = %e, "could not record redemption attempt");
    }
  }
}
