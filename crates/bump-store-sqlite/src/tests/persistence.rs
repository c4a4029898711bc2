//! Direct exercises of `SqliteStore` without the engine in front.

use bump_core::{
  access::Permission,
  invite::{InviteRole, NewInviteCode},
  limiter::CodeAttempt,
  pairing::NewPairingRequest,
  pregnancy::{PartnerStatus, Pregnancy, Profile},
  store::{Outcome, SharingStore},
};
use chrono::{Duration, TimeZone as _, Utc};
use uuid::Uuid;

use super::store;
use crate::SqliteStore;

fn now() -> chrono::DateTime<Utc> { Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() }

async fn insert(s: &SqliteStore, owner_id: &str) -> Pregnancy {
  match s.insert_pregnancy(owner_id, &Profile::default(), now()).await.unwrap() {
    Outcome::Applied(pregnancy) => pregnancy,
    other => panic!("insert failed: {other:?}"),
  }
}

#[tokio::test]
async fn insert_and_get_pregnancy() {
  let s = store().await;
  let created = insert(&s, "mom").await;
  assert_eq!(created.partner_status, PartnerStatus::None);
  assert!(created.display_partner_card);

  let fetched = s.get_pregnancy(created.pregnancy_id).await.unwrap().unwrap();
  assert_eq!(fetched.owner_id, "mom");
  assert_eq!(fetched.created_at, now());
  assert!(s.get_pregnancy(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn owner_is_unique() {
  let s = store().await;
  let first = insert(&s, "mom").await;
  let second = s.insert_pregnancy("mom", &Profile::default(), now()).await.unwrap();
  assert!(matches!(second, Outcome::Unavailable));
  assert_eq!(s.pregnancy_by_owner("mom").await.unwrap().unwrap().pregnancy_id, first.pregnancy_id);
}

#[tokio::test]
async fn missing_pregnancy_updates_return_none() {
  let s = store().await;
  let id = Uuid::new_v4();
  assert!(s.update_profile(id, &Profile::default(), now()).await.unwrap().is_none());
  assert!(s.set_archived(id, true, now()).await.unwrap().is_none());
  assert!(s.set_coowner(id, None, now()).await.unwrap().is_none());
}

#[tokio::test]
async fn active_codes_exclude_expired() {
  let s = store().await;
  let pregnancy = insert(&s, "mom").await;
  for hours in [1, 48] {
    s.insert_invite_code(NewInviteCode {
      pregnancy_id: pregnancy.pregnancy_id,
      code_hash:    "$argon2id$placeholder".to_owned(),
      code_prefix:  "A7K9".to_owned(),
      role:         InviteRole::Support,
      permission:   Permission::Read,
      created_at:   now(),
      expires_at:   now() + Duration::hours(hours),
    })
    .await
    .unwrap();
  }

  let later = now() + Duration::hours(2);
  assert_eq!(s.active_invite_codes(pregnancy.pregnancy_id, now()).await.unwrap().len(), 2);
  assert_eq!(s.active_invite_codes(pregnancy.pregnancy_id, later).await.unwrap().len(), 1);
  assert_eq!(s.all_active_invite_codes(later).await.unwrap().len(), 1);

  let code = &s.all_active_invite_codes(later).await.unwrap()[0];
  assert_eq!(code.role, InviteRole::Support);
  assert_eq!(code.code_prefix, "A7K9");
}

#[tokio::test]
async fn failed_attempts_are_counted_in_window() {
  let s = store().await;
  let attempt = |offset_minutes: i64, success: bool| CodeAttempt {
    user_id:      "guesser".to_owned(),
    attempted_at: now() + Duration::minutes(offset_minutes),
    success,
    origin:       None,
  };
  s.record_attempt(attempt(0, false)).await.unwrap();
  s.record_attempt(attempt(30, false)).await.unwrap();
  s.record_attempt(attempt(40, true)).await.unwrap();
  s.record_attempt(attempt(50, false)).await.unwrap();

  assert_eq!(s.count_failed_attempts("guesser", now()).await.unwrap(), 3);
  assert_eq!(
    s.count_failed_attempts("guesser", now() + Duration::minutes(20)).await.unwrap(),
    2
  );
  assert_eq!(s.count_failed_attempts("someone", now()).await.unwrap(), 0);
}

#[tokio::test]
async fn pairing_target_resolves_by_latest_email() {
  let s = store().await;
  s.remember_user("mom", "old@example.com", now()).await.unwrap();
  s.remember_user("mom", "Ana@Example.com", now() + Duration::minutes(1)).await.unwrap();

  let request = |email: &str| NewPairingRequest {
    requester_id:   "dad".to_owned(),
    requester_name: None,
    target_email:   email.to_owned(),
    created_at:     now(),
  };

  let resolved = s.insert_pairing_request(request("ana@example.COM")).await.unwrap();
  assert_eq!(resolved.target_id.as_deref(), Some("mom"));

  let stale = s.insert_pairing_request(request("old@example.com")).await.unwrap();
  assert!(stale.target_id.is_none());

  assert_eq!(s.pending_pairing_requests("mom").await.unwrap().len(), 1);
}
