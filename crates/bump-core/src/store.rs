//! The `SharingStore` trait.
//!
//! Implemented by storage backends (e.g. `bump-store-sqlite`). The engines in
//! this crate depend on this abstraction only. Operations that must be atomic
//! (code redemption, pairing approval) are single trait methods so that a
//! backend can run each inside one transaction.

use std::{collections::BTreeMap, future::Future};

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  access::Permission,
  entry::{Entry, EntryQuery, NewEntry},
  invite::{CodeClaim, InviteCode, NewInviteCode},
  limiter::CodeAttempt,
  pairing::{NewPairingRequest, PairingRequest},
  pregnancy::{Coowner, Pregnancy, Profile, Supporter},
};

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
  Applied(T),
  /// The precondition no longer held (already redeemed, expired, revoked,
  /// not pending, not addressed to the caller, owner already has a
  /// pregnancy). Nothing was written.
  Unavailable,
  /// The pregnancy already has a different approved partner. Nothing was
  /// written.
  PartnerTaken,
}

/// Abstraction over a sharing store backend.
///
/// Timestamps are supplied by the caller so that expiry decisions follow the
/// service's clock rather than the backend's.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SharingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Record the email an authenticated user presented, replacing any
  /// previous one.
  fn remember_user<'a>(
    &'a self,
    user_id: &'a str,
    email: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Pregnancies ───────────────────────────────────────────────────────

  /// Insert a pregnancy owned by `owner_id`. `Unavailable` if the user
  /// already owns one.
  fn insert_pregnancy<'a>(
    &'a self,
    owner_id: &'a str,
    profile: &'a Profile,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Outcome<Pregnancy>, Self::Error>> + Send + 'a;

  fn get_pregnancy(
    &self,
    pregnancy_id: Uuid,
  ) -> impl Future<Output = Result<Option<Pregnancy>, Self::Error>> + Send + '_;

  fn pregnancy_by_owner<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<Pregnancy>, Self::Error>> + Send + 'a;

  fn pregnancy_by_coowner<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<Pregnancy>, Self::Error>> + Send + 'a;

  /// The pregnancy on which `user_id` is the approved partner. If several
  /// match, the most recently updated wins.
  fn pregnancy_by_partner<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<Pregnancy>, Self::Error>> + Send + 'a;

  /// The pregnancy on which `user_id` is an active supporter, with the
  /// membership. If several match, the most recent membership wins.
  fn pregnancy_by_supporter<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<(Pregnancy, Supporter)>, Self::Error>> + Send + 'a;

  /// Overwrite the profile fields that are `Some` in `profile`.
  fn update_profile<'a>(
    &'a self,
    pregnancy_id: Uuid,
    profile: &'a Profile,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Pregnancy>, Self::Error>> + Send + 'a;

  fn set_outcome<'a>(
    &'a self,
    pregnancy_id: Uuid,
    outcome: Option<&'a str>,
    outcome_date: Option<NaiveDate>,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Pregnancy>, Self::Error>> + Send + 'a;

  fn set_archived(
    &self,
    pregnancy_id: Uuid,
    archived: bool,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Pregnancy>, Self::Error>> + Send + '_;

  fn set_coowner<'a>(
    &'a self,
    pregnancy_id: Uuid,
    coowner: Option<&'a Coowner>,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Pregnancy>, Self::Error>> + Send + 'a;

  // ── Invite codes ──────────────────────────────────────────────────────

  fn insert_invite_code(
    &self,
    code: NewInviteCode,
  ) -> impl Future<Output = Result<InviteCode, Self::Error>> + Send + '_;

  /// Codes on `pregnancy_id` that are active at `now`, newest first.
  fn active_invite_codes(
    &self,
    pregnancy_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<InviteCode>, Self::Error>> + Send + '_;

  /// Every code active at `now`, across all pregnancies.
  fn all_active_invite_codes(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<InviteCode>, Self::Error>> + Send + '_;

  /// Atomically consume a code and grant the access it carries.
  ///
  /// The code is marked redeemed only if it is still active at
  /// `claim.claimed_at`; of several concurrent claims on one code at most one
  /// is `Applied`. A father code sets the pregnancy's partner and a support
  /// code creates or revives the claimant's membership. Returns the updated
  /// pregnancy.
  fn redeem_invite_code(
    &self,
    claim: CodeClaim,
  ) -> impl Future<Output = Result<Outcome<Pregnancy>, Self::Error>> + Send + '_;

  /// Revoke an active code belonging to a pregnancy owned by `owner_id`.
  /// Returns `false` if no such code exists.
  fn revoke_invite_code<'a>(
    &'a self,
    code_id: Uuid,
    owner_id: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Supporters ────────────────────────────────────────────────────────

  /// Active supporters of `pregnancy_id`, newest first.
  fn active_supporters(
    &self,
    pregnancy_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Supporter>, Self::Error>> + Send + '_;

  /// Soft-remove an active supporter of `pregnancy_id`. Returns `false` if
  /// no such supporter exists.
  fn remove_supporter(
    &self,
    supporter_id: Uuid,
    pregnancy_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn set_supporter_permission(
    &self,
    supporter_id: Uuid,
    pregnancy_id: Uuid,
    permission: Permission,
  ) -> impl Future<Output = Result<Option<Supporter>, Self::Error>> + Send + '_;

  // ── Attempts ──────────────────────────────────────────────────────────

  /// Failed redemption attempts by `user_id` at or after `since`.
  fn count_failed_attempts<'a>(
    &'a self,
    user_id: &'a str,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + 'a;

  fn record_attempt(
    &self,
    attempt: CodeAttempt,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Pairing ───────────────────────────────────────────────────────────

  /// Insert a pending request, resolving `target_email` against the user
  /// directory (case-insensitively).
  fn insert_pairing_request(
    &self,
    request: NewPairingRequest,
  ) -> impl Future<Output = Result<PairingRequest, Self::Error>> + Send + '_;

  /// Pending requests whose resolved target is `target_id`, newest first.
  fn pending_pairing_requests<'a>(
    &'a self,
    target_id: &'a str,
  ) -> impl Future<Output = Result<Vec<PairingRequest>, Self::Error>> + Send + 'a;

  /// Atomically approve a pending request addressed to `target_id` and make
  /// its requester the partner on the pregnancy `target_id` owns.
  fn approve_pairing_request<'a>(
    &'a self,
    request_id: Uuid,
    target_id: &'a str,
    permission: Permission,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Outcome<PairingRequest>, Self::Error>> + Send + 'a;

  /// Deny a pending request addressed to `target_id`.
  fn deny_pairing_request<'a>(
    &'a self,
    request_id: Uuid,
    target_id: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<PairingRequest>, Self::Error>> + Send + 'a;

  /// Withdraw a pending request made by `requester_id`.
  fn cancel_pairing_request<'a>(
    &'a self,
    request_id: Uuid,
    requester_id: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<PairingRequest>, Self::Error>> + Send + 'a;

  /// Change the partner permission on the pregnancy owned by `owner_id`.
  /// Returns `None` if there is no approved partner.
  fn update_partner_permission<'a>(
    &'a self,
    owner_id: &'a str,
    permission: Permission,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Pregnancy>, Self::Error>> + Send + 'a;

  /// Clear the partner fields, first on a pregnancy `user_id` owns, then on
  /// one where `user_id` is the partner. Returns `false` if neither matched.
  fn remove_pairing<'a>(
    &'a self,
    user_id: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Entries ───────────────────────────────────────────────────────────

  /// Insert or replace the entry keyed by (pregnancy, type, client id),
  /// clearing any deletion mark.
  fn upsert_entry(
    &self,
    pregnancy_id: Uuid,
    entry: NewEntry,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Entry, Self::Error>> + Send + '_;

  /// Upsert every entry in one transaction; all or nothing.
  fn upsert_entries(
    &self,
    pregnancy_id: Uuid,
    entries: Vec<NewEntry>,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Entry>, Self::Error>> + Send + '_;

  /// Entries matching `query`, newest first.
  fn entries<'a>(
    &'a self,
    pregnancy_id: Uuid,
    query: &'a EntryQuery,
  ) -> impl Future<Output = Result<Vec<Entry>, Self::Error>> + Send + 'a;

  /// Soft-delete the live entry with `client_id`. Returns `false` if none.
  fn delete_entry<'a>(
    &'a self,
    pregnancy_id: Uuid,
    client_id: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Settings ──────────────────────────────────────────────────────────

  /// Every setting document on `pregnancy_id`, keyed by type.
  fn settings(
    &self,
    pregnancy_id: Uuid,
  ) -> impl Future<Output = Result<BTreeMap<String, serde_json::Value>, Self::Error>> + Send + '_;

  /// Insert or replace the document stored under `setting_type`.
  fn upsert_setting<'a>(
    &'a self,
    pregnancy_id: Uuid,
    setting_type: &'a str,
    data: &'a serde_json::Value,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
