use bump_core::{
  ErrorKind,
  access::{AccessRole, Permission},
  invite::InviteRole,
  pairing::{PairingSide, RequestStatus},
  store::SharingStore as _,
};
use mockable::Clock as _;

use super::{Harness, harness, redeem};

async fn registered(h: &Harness, user_id: &str, email: &str) {
  h.service
    .store()
    .remember_user(user_id, email, h.clock.utc())
    .await
    .unwrap();
}

#[tokio::test]
async fn approved_request_makes_the_requester_partner() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  registered(&h, "mom", "Mom@Example.com").await;

  let request = h
    .service
    .create_pairing_request("dad", Some("Dan".to_owned()), "mom@example.com")
    .await
    .unwrap();
  assert_eq!(request.status, RequestStatus::Pending);
  assert_eq!(request.target_id.as_deref(), Some("mom"));

  let pending = h.service.pending_pairing_requests("mom").await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].request_id, request.request_id);

  let approved = h
    .service
    .approve_pairing_request(request.request_id, "mom", Permission::Write)
    .await
    .unwrap();
  assert_eq!(approved.status, RequestStatus::Approved);
  assert_eq!(approved.permission, Some(Permission::Write));
  assert!(approved.resolved_at.is_some());

  let access = h.service.resolve_access("dad").await.unwrap();
  assert_eq!(access.role, AccessRole::Father);
  assert_eq!(access.permission, Permission::Write);
  assert_eq!(access.pregnancy.partner_name.as_deref(), Some("Dan"));
  assert!(h.service.pending_pairing_requests("mom").await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_email_is_accepted_but_addressed_to_no_one() {
  let h = harness().await;
  let request = h
    .service
    .create_pairing_request("dad", None, "nobody@example.com")
    .await
    .unwrap();
  assert!(request.target_id.is_none());

  let err = h
    .service
    .create_pairing_request("dad", None, "  ")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn only_the_target_can_approve() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  h.pregnancy_for("other").await;
  registered(&h, "mom", "mom@example.com").await;
  let request = h
    .service
    .create_pairing_request("dad", None, "mom@example.com")
    .await
    .unwrap();

  let err = h
    .service
    .approve_pairing_request(request.request_id, "other", Permission::Read)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn target_without_pregnancy_cannot_approve() {
  let h = harness().await;
  registered(&h, "mom", "mom@example.com").await;
  let request = h
    .service
    .create_pairing_request("dad", None, "mom@example.com")
    .await
    .unwrap();

  let err = h
    .service
    .approve_pairing_request(request.request_id, "mom", Permission::Read)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  // Nothing was written.
  assert_eq!(h.service.pending_pairing_requests("mom").await.unwrap().len(), 1);
}

#[tokio::test]
async fn denied_and_cancelled_requests_are_terminal() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  registered(&h, "mom", "mom@example.com").await;

  let denied = h
    .service
    .create_pairing_request("dad", None, "mom@example.com")
    .await
    .unwrap();
  let resolved = h
    .service
    .deny_pairing_request(denied.request_id, "mom")
    .await
    .unwrap();
  assert_eq!(resolved.status, RequestStatus::Denied);
  let err = h
    .service
    .approve_pairing_request(denied.request_id, "mom", Permission::Read)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let cancelled = h
    .service
    .create_pairing_request("dad", None, "mom@example.com")
    .await
    .unwrap();
  let err = h
    .service
    .cancel_pairing_request(cancelled.request_id, "mom")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  let resolved = h
    .service
    .cancel_pairing_request(cancelled.request_id, "dad")
    .await
    .unwrap();
  assert_eq!(resolved.status, RequestStatus::Cancelled);

  let err = h
    .service
    .approve_pairing_request(cancelled.request_id, "mom", Permission::Read)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  let err = h
    .service
    .deny_pairing_request(cancelled.request_id, "mom")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert!(h.service.resolve_access("dad").await.is_err());
}

#[tokio::test]
async fn approval_cannot_replace_an_existing_partner() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  registered(&h, "mom", "mom@example.com").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Father, None)
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&issued.code, "dad")).await.unwrap();

  let request = h
    .service
    .create_pairing_request("impostor", None, "mom@example.com")
    .await
    .unwrap();
  let err = h
    .service
    .approve_pairing_request(request.request_id, "mom", Permission::Write)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);

  // Rolled back: still pending, partner unchanged.
  assert_eq!(h.service.pending_pairing_requests("mom").await.unwrap().len(), 1);
  let access = h.service.resolve_access("dad").await.unwrap();
  assert_eq!(access.role, AccessRole::Father);
  assert!(h.service.resolve_access("impostor").await.is_err());
}

#[tokio::test]
async fn father_code_conflicts_after_legacy_pairing() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  registered(&h, "mom", "mom@example.com").await;
  let stale = h
    .service
    .issue_invite_code("mom", InviteRole::Father, None)
    .await
    .unwrap();

  let request = h
    .service
    .create_pairing_request("dad", None, "mom@example.com")
    .await
    .unwrap();
  h.service
    .approve_pairing_request(request.request_id, "mom", Permission::Read)
    .await
    .unwrap();

  let err = h
    .service
    .issue_invite_code("mom", InviteRole::Father, None)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
  let err = h
    .service
    .redeem_invite_code(redeem(&stale.code, "other"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn partner_permission_can_be_changed_by_owner() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let err = h
    .service
    .update_partner_permission("mom", Permission::Write)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Father, None)
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&issued.code, "dad")).await.unwrap();
  assert_eq!(h.service.resolve_access("dad").await.unwrap().permission, Permission::Read);

  h.service
    .update_partner_permission("mom", Permission::Write)
    .await
    .unwrap();
  assert_eq!(h.service.resolve_access("dad").await.unwrap().permission, Permission::Write);
}

#[tokio::test]
async fn either_side_can_remove_the_pairing() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Father, None)
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&issued.code, "dad")).await.unwrap();

  h.service.remove_pairing("dad").await.unwrap();
  assert!(h.service.resolve_access("dad").await.is_err());
  let err = h.service.remove_pairing("mom").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  // The slot is free again.
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Father, None)
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&issued.code, "dad2")).await.unwrap();
  h.service.remove_pairing("mom").await.unwrap();
  assert!(h.service.resolve_access("dad2").await.is_err());
}

#[tokio::test]
async fn pairing_status_from_each_side() {
  let h = harness().await;
  h.service
    .create_pregnancy(
      "mom",
      bump_core::pregnancy::Profile { mom_name: Some("Ana".to_owned()), ..Default::default() },
    )
    .await
    .unwrap();

  let view = h.service.pairing_status("mom").await.unwrap();
  assert!(!view.paired);
  assert_eq!(view.role, Some(PairingSide::Owner));

  let view = h.service.pairing_status("dad").await.unwrap();
  assert!(!view.paired);
  assert!(view.role.is_none());

  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Father, Some(Permission::Write))
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&issued.code, "dad")).await.unwrap();

  let view = h.service.pairing_status("mom").await.unwrap();
  assert!(view.paired);
  let partner = view.partner.unwrap();
  assert_eq!(partner.user_id, "dad");
  assert_eq!(partner.permission, Permission::Write);

  let view = h.service.pairing_status("dad").await.unwrap();
  assert!(view.paired);
  assert_eq!(view.role, Some(PairingSide::Partner));
  let owner = view.partner.unwrap();
  assert_eq!(owner.user_id, "mom");
  assert_eq!(owner.name.as_deref(), Some("Ana"));
}
