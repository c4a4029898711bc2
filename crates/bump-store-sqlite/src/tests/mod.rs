//! Integration tests for `SqliteStore`, and for the sharing engine running on
//! top of it, against an in-memory database.

mod entries;
mod pairing;
mod persistence;
mod sharing;

use std::sync::{Arc, Mutex};

use bump_core::{
  SharingPolicy, SharingService,
  hasher::CodeHasher,
  invite::RedeemRequest,
  pregnancy::{Pregnancy, Profile},
};
use chrono::{DateTime, Duration, Local, TimeZone as _, Utc};
use mockable::Clock;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// A clock that only moves when told to.
pub struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
  fn new() -> Self { Self(Mutex::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap())) }

  fn advance(&self, delta: Duration) { *self.0.lock().unwrap() += delta; }
}

impl Clock for TestClock {
  fn local(&self) -> DateTime<Local> { self.utc().with_timezone(&Local) }

  fn utc(&self) -> DateTime<Utc> { *self.0.lock().unwrap() }
}

struct Harness {
  service: Arc<SharingService<SqliteStore>>,
  clock:   Arc<TestClock>,
}

async fn harness() -> Harness { harness_with(SharingPolicy::default()).await }

async fn harness_with(policy: SharingPolicy) -> Harness {
  let clock = Arc::new(TestClock::new());
  let service = SharingService::new(Arc::new(store().await))
    .with_clock(clock.clone())
    .with_hasher(CodeHasher::with_cost(1024, 1, 1).unwrap())
    .with_policy(policy);
  Harness { service: Arc::new(service), clock }
}

impl Harness {
  async fn pregnancy_for(&self, owner_id: &str) -> Pregnancy {
    self
      .service
      .create_pregnancy(owner_id, Profile::default())
      .await
      .unwrap()
  }
}

fn redeem(code: &str, user_id: &str) -> RedeemRequest {
  RedeemRequest {
    code:         code.to_owned(),
    user_id:      user_id.to_owned(),
    display_name: Some(format!("{user_id} name")),
    email:        None,
    origin:       Some("127.0.0.1".to_owned()),
  }
}
