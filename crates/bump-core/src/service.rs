//! [`SharingService`]: the entry point for every access-controlled operation.
//!
//! The service is generic over a [`SharingStore`] backend and carries the
//! policy knobs (privileged identities, throttle, invite lifetime), the code
//! hasher and a clock. Operations are defined next to their domain types in
//! the sibling modules.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use mockable::{Clock, DefaultClock};

use crate::{
  Error, Result,
  hasher::CodeHasher,
  limiter::RateLimit,
  pregnancy::Pregnancy,
  sharing::PrivilegedEmails,
  store::SharingStore,
};

/// How long an issued invite code stays redeemable, in hours.
pub const DEFAULT_INVITE_TTL_HOURS: i64 = 48;

/// Tunable rules applied by the sharing engine.
#[derive(Debug, Clone)]
pub struct SharingPolicy {
  /// Redeemers with one of these emails always receive write access.
  pub privileged: PrivilegedEmails,
  pub rate_limit: RateLimit,
  pub invite_ttl: Duration,
}

impl Default for SharingPolicy {
  fn default() -> Self {
    Self {
      privileged: PrivilegedEmails::default(),
      rate_limit: RateLimit::default(),
      invite_ttl: Duration::hours(DEFAULT_INVITE_TTL_HOURS),
    }
  }
}

pub struct SharingService<S> {
  pub(crate) store:  Arc<S>,
  pub(crate) clock:  Arc<dyn Clock + Send + Sync>,
  pub(crate) hasher: CodeHasher,
  pub(crate) policy: SharingPolicy,
}

impl<S: SharingStore> SharingService<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      clock: Arc::new(DefaultClock),
      hasher: CodeHasher::default(),
      policy: SharingPolicy::default(),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_hasher(mut self, hasher: CodeHasher) -> Self {
    self.hasher = hasher;
    self
  }

  pub fn with_policy(mut self, policy: SharingPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn policy(&self) -> &SharingPolicy { &self.policy }

  pub(crate) fn now(&self) -> DateTime<Utc> { self.clock.utc() }

  /// The pregnancy `owner_id` owns, or `Forbidden`.
  pub(crate) async fn owned_pregnancy(&self, owner_id: &str) -> Result<Pregnancy> {
    self
      .store
      .pregnancy_by_owner(owner_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::Forbidden("only the pregnancy owner may do this"))
  }
}
