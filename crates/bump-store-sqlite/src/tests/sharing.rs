use bump_core::{
  ErrorKind, SharingPolicy,
  access::{AccessRole, Permission},
  code,
  invite::InviteRole,
  limiter::RateLimit,
  pregnancy::PartnerStatus,
  sharing::PrivilegedEmails,
};
use chrono::Duration;
use mockable::Clock as _;

use super::{harness, harness_with, redeem};

// ─── Issue ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn issued_code_is_valid_and_defaults_to_read() {
  let h = harness().await;
  h.pregnancy_for("mom").await;

  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();
  assert!(code::validate_format(&issued.code));
  assert_eq!(issued.permission, Permission::Read);
  assert_eq!(issued.expires_at - h.clock.utc(), Duration::hours(48));
}

#[tokio::test]
async fn only_an_owner_can_issue() {
  let h = harness().await;
  let err = h
    .service
    .issue_invite_code("nobody", InviteRole::Support, None)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn active_codes_are_listed_newest_first_and_redacted() {
  let h = harness().await;
  h.pregnancy_for("mom").await;

  let first = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();
  h.clock.advance(Duration::minutes(1));
  let second = h
    .service
    .issue_invite_code("mom", InviteRole::Father, Some(Permission::Write))
    .await
    .unwrap();

  let listed = h.service.list_active_codes("mom").await.unwrap();
  assert_eq!(listed.len(), 2);
  assert_eq!(listed[0].code_id, second.code_id);
  assert_eq!(listed[1].code_id, first.code_id);
  assert_eq!(listed[0].code_prefix, format!("{}-****-**", code::prefix(&second.code)));
  assert_eq!(listed[1].expires_in, "47h 59m");
}

// ─── Redeem ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn support_code_grants_read_once() {
  let h = harness().await;
  let pregnancy = h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();

  let redemption = h
    .service
    .redeem_invite_code(redeem(&issued.code, "grandma"))
    .await
    .unwrap();
  assert_eq!(redemption.role, AccessRole::Support);
  assert_eq!(redemption.permission, Permission::Read);
  assert_eq!(redemption.pregnancy.pregnancy_id, pregnancy.pregnancy_id);

  let access = h.service.resolve_access("grandma").await.unwrap();
  assert_eq!(access.role, AccessRole::Support);
  assert_eq!(access.permission, Permission::Read);
  assert_eq!(access.pregnancy.pregnancy_id, pregnancy.pregnancy_id);

  let err = h
    .service
    .redeem_invite_code(redeem(&issued.code, "grandpa"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert_eq!(h.service.resolve_access("grandpa").await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn redemption_accepts_any_case_and_spacing() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();

  let typed = code::normalize(&issued.code).to_lowercase();
  h.service.redeem_invite_code(redeem(&typed, "aunt")).await.unwrap();
}

#[tokio::test]
async fn father_code_fills_the_partner_slot() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Father, Some(Permission::Write))
    .await
    .unwrap();

  let redemption = h
    .service
    .redeem_invite_code(redeem(&issued.code, "dad"))
    .await
    .unwrap();
  assert_eq!(redemption.role, AccessRole::Father);
  assert_eq!(redemption.pregnancy.partner_id.as_deref(), Some("dad"));
  assert_eq!(redemption.pregnancy.partner_name.as_deref(), Some("dad name"));
  assert!(redemption.pregnancy.has_approved_partner());

  let access = h.service.resolve_access("dad").await.unwrap();
  assert_eq!(access.role, AccessRole::Father);
  assert_eq!(access.permission, Permission::Write);
}

#[tokio::test]
async fn second_father_code_conflicts_once_partnered() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Father, None)
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&issued.code, "dad")).await.unwrap();

  let err = h
    .service
    .issue_invite_code("mom", InviteRole::Father, None)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);

  // Support codes are unaffected.
  h.service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();
}

#[tokio::test]
async fn stale_father_code_cannot_replace_partner() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let a = h
    .service
    .issue_invite_code("mom", InviteRole::Father, None)
    .await
    .unwrap();
  let b = h
    .service
    .issue_invite_code("mom", InviteRole::Father, None)
    .await
    .unwrap();

  h.service.redeem_invite_code(redeem(&a.code, "dad")).await.unwrap();
  let err = h
    .service
    .redeem_invite_code(redeem(&b.code, "other"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);

  let access = h.service.resolve_access("dad").await.unwrap();
  assert_eq!(access.pregnancy.partner_id.as_deref(), Some("dad"));
  // The rejected claim was rolled back, so the code is still listed.
  let listed = h.service.list_active_codes("mom").await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].code_id, b.code_id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemptions_succeed_exactly_once() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();

  let mut handles = Vec::new();
  for i in 0..8 {
    let service = h.service.clone();
    let request = redeem(&issued.code, &format!("user-{i}"));
    handles.push(tokio::spawn(async move { service.redeem_invite_code(request).await }));
  }

  let mut successes = 0;
  for handle in handles {
    match handle.await.unwrap() {
      Ok(_) => successes += 1,
      Err(e) => assert_eq!(e.kind(), ErrorKind::NotFound),
    }
  }
  assert_eq!(successes, 1);
  assert_eq!(h.service.list_supporters("mom").await.unwrap().len(), 1);
}

#[tokio::test]
async fn expired_code_is_not_found() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();

  h.clock.advance(Duration::hours(49));
  let err = h
    .service
    .redeem_invite_code(redeem(&issued.code, "late"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert!(h.service.list_active_codes("mom").await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_code_is_a_validation_error() {
  let h = harness().await;
  let err = h
    .service
    .redeem_invite_code(redeem("HELLO", "someone"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert_eq!(h.service.count_recent_failures("someone").await.unwrap(), 1);
}

#[tokio::test]
async fn privileged_email_gets_write_and_a_hidden_card() {
  let policy = SharingPolicy {
    privileged: PrivilegedEmails::new(["admin@example.com"]),
    ..SharingPolicy::default()
  };
  let h = harness_with(policy).await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, Some(Permission::Read))
    .await
    .unwrap();

  let mut request = redeem(&issued.code, "admin");
  request.email = Some("Admin@Example.com".to_owned());
  let redemption = h.service.redeem_invite_code(request).await.unwrap();
  assert_eq!(redemption.permission, Permission::Write);

  let supporters = h.service.list_supporters("mom").await.unwrap();
  assert_eq!(supporters.len(), 1);
  assert_eq!(supporters[0].permission, Permission::Write);
  assert!(!supporters[0].display_partner_card);

  let access = h.service.resolve_access("admin").await.unwrap();
  assert_eq!(access.permission, Permission::Write);
}

#[tokio::test]
async fn privileged_email_on_a_father_code_gets_write_and_a_hidden_card() {
  let policy = SharingPolicy {
    privileged: PrivilegedEmails::new(["admin@example.com"]),
    ..SharingPolicy::default()
  };
  let h = harness_with(policy).await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Father, Some(Permission::Read))
    .await
    .unwrap();

  let mut request = redeem(&issued.code, "admin");
  request.email = Some(" admin@example.com ".to_owned());
  let redemption = h.service.redeem_invite_code(request).await.unwrap();
  assert_eq!(redemption.role, AccessRole::Father);
  assert_eq!(redemption.permission, Permission::Write);

  let pregnancy = &redemption.pregnancy;
  assert_eq!(pregnancy.partner_id.as_deref(), Some("admin"));
  assert_eq!(pregnancy.partner_status, PartnerStatus::Approved);
  assert_eq!(pregnancy.partner_permission, Some(Permission::Write));
  assert!(!pregnancy.display_partner_card);

  let access = h.service.resolve_access("admin").await.unwrap();
  assert_eq!(access.role, AccessRole::Father);
  assert_eq!(access.permission, Permission::Write);
  assert!(h.service.list_supporters("mom").await.unwrap().is_empty());
}

#[tokio::test]
async fn unprivileged_email_keeps_the_code_permission() {
  let policy = SharingPolicy {
    privileged: PrivilegedEmails::new(["admin@example.com"]),
    ..SharingPolicy::default()
  };
  let h = harness_with(policy).await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();

  let mut request = redeem(&issued.code, "friend");
  request.email = Some("friend@example.com".to_owned());
  let redemption = h.service.redeem_invite_code(request).await.unwrap();
  assert_eq!(redemption.permission, Permission::Read);
  assert!(h.service.list_supporters("mom").await.unwrap()[0].display_partner_card);
}

// ─── Throttle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sixth_attempt_after_five_failures_is_throttled() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();

  for _ in 0..5 {
    let wrong = code::generate().unwrap();
    let err = h
      .service
      .redeem_invite_code(redeem(&wrong, "guesser"))
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
  }

  // Even the right code is refused while throttled.
  let err = h
    .service
    .redeem_invite_code(redeem(&issued.code, "guesser"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::RateLimited);

  // Other users are unaffected.
  assert_eq!(h.service.count_recent_failures("someone-else").await.unwrap(), 0);

  h.clock.advance(Duration::minutes(61));
  h.service
    .redeem_invite_code(redeem(&issued.code, "guesser"))
    .await
    .unwrap();
}

#[tokio::test]
async fn throttle_follows_the_configured_policy() {
  let policy = SharingPolicy {
    rate_limit: RateLimit { max_failures: 2, window: Duration::minutes(10) },
    ..SharingPolicy::default()
  };
  let h = harness_with(policy).await;

  for _ in 0..2 {
    let err = h
      .service
      .redeem_invite_code(redeem("nope", "guesser"))
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
  }
  let err = h
    .service
    .redeem_invite_code(redeem("nope", "guesser"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::RateLimited);
}

#[tokio::test]
async fn successful_attempts_do_not_count_as_failures() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&issued.code, "aunt")).await.unwrap();
  assert_eq!(h.service.count_recent_failures("aunt").await.unwrap(), 0);
}

// ─── Revoke ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn revoke_is_owner_only_and_single_shot() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  h.pregnancy_for("stranger").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();

  let err = h
    .service
    .revoke_invite_code(issued.code_id, "stranger")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  h.service.revoke_invite_code(issued.code_id, "mom").await.unwrap();
  let err = h
    .service
    .revoke_invite_code(issued.code_id, "mom")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let err = h
    .service
    .redeem_invite_code(redeem(&issued.code, "aunt"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn redeemed_code_cannot_be_revoked() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&issued.code, "aunt")).await.unwrap();

  let err = h
    .service
    .revoke_invite_code(issued.code_id, "mom")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ─── Supporters ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn removed_supporter_loses_access_and_can_rejoin() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let first = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&first.code, "aunt")).await.unwrap();

  let supporter = h.service.list_supporters("mom").await.unwrap().remove(0);
  h.service.remove_supporter(supporter.supporter_id, "mom").await.unwrap();
  assert_eq!(h.service.resolve_access("aunt").await.unwrap_err().kind(), ErrorKind::NotFound);
  assert!(h.service.list_supporters("mom").await.unwrap().is_empty());

  let err = h
    .service
    .remove_supporter(supporter.supporter_id, "mom")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let second = h
    .service
    .issue_invite_code("mom", InviteRole::Support, Some(Permission::Write))
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&second.code, "aunt")).await.unwrap();

  let supporters = h.service.list_supporters("mom").await.unwrap();
  assert_eq!(supporters.len(), 1);
  assert_eq!(supporters[0].supporter_id, supporter.supporter_id);
  assert_eq!(supporters[0].permission, Permission::Write);
  assert_eq!(supporters[0].invited_via_code, Some(second.code_id));
}

#[tokio::test]
async fn only_the_owner_manages_supporters() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&issued.code, "aunt")).await.unwrap();
  let supporter = h.service.list_supporters("mom").await.unwrap().remove(0);

  let err = h
    .service
    .remove_supporter(supporter.supporter_id, "aunt")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  let err = h
    .service
    .update_supporter_permission(supporter.supporter_id, "aunt", Permission::Write)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert_eq!(h.service.list_supporters("aunt").await.unwrap_err().kind(), ErrorKind::Forbidden);

  let updated = h
    .service
    .update_supporter_permission(supporter.supporter_id, "mom", Permission::Write)
    .await
    .unwrap();
  assert_eq!(updated.permission, Permission::Write);
  assert_eq!(h.service.resolve_access("aunt").await.unwrap().permission, Permission::Write);
}

#[tokio::test]
async fn sharing_status_collects_everything() {
  let h = harness().await;
  let pregnancy = h.pregnancy_for("mom").await;

  let status = h.service.sharing_status("mom").await.unwrap();
  assert_eq!(status.pregnancy_id, pregnancy.pregnancy_id);
  assert!(status.partner.is_none());
  assert!(status.supporters.is_empty());
  assert!(status.active_codes.is_empty());

  let father = h
    .service
    .issue_invite_code("mom", InviteRole::Father, Some(Permission::Write))
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&father.code, "dad")).await.unwrap();
  let support = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&support.code, "aunt")).await.unwrap();
  h.service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();

  let status = h.service.sharing_status("mom").await.unwrap();
  let partner = status.partner.unwrap();
  assert_eq!(partner.user_id, "dad");
  assert_eq!(partner.permission, Permission::Write);
  assert_eq!(status.supporters.len(), 1);
  assert_eq!(status.active_codes.len(), 1);

  assert_eq!(h.service.sharing_status("dad").await.unwrap_err().kind(), ErrorKind::Forbidden);
}
