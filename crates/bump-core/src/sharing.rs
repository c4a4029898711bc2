//! The invite/sharing engine.
//!
//! An owner issues single-use codes carrying a role and a permission level.
//! Anyone holding a code may redeem it once before it expires; redemption
//! either fills the partner slot (father codes) or adds a supporter
//! membership (support codes).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  access::Permission,
  code,
  invite::{ActiveCode, CodeClaim, InviteRole, IssuedCode, NewInviteCode, RedeemRequest, Redemption},
  pregnancy::Supporter,
  service::SharingService,
  store::{Outcome, SharingStore},
};

// ─── Privileged identities ───────────────────────────────────────────────────

/// Emails whose holders always receive write access and a hidden partner
/// card on redemption. Compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct PrivilegedEmails(HashSet<String>);

impl PrivilegedEmails {
  pub fn new<I, T>(emails: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
  {
    emails.into_iter().collect()
  }

  pub fn contains(&self, email: &str) -> bool {
    self.0.contains(&email.trim().to_lowercase())
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<T: AsRef<str>> FromIterator<T> for PrivilegedEmails {
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    Self(
      iter
        .into_iter()
        .map(|e| e.as_ref().trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect(),
    )
  }
}

// ─── Status view ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerCard {
  pub user_id:              String,
  pub name:                 Option<String>,
  pub permission:           Permission,
  pub display_partner_card: bool,
}

/// Everything an owner sees on their sharing screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingStatus {
  pub pregnancy_id: Uuid,
  pub partner:      Option<PartnerCard>,
  pub supporters:   Vec<Supporter>,
  pub active_codes: Vec<ActiveCode>,
}

// ─── Operations ──────────────────────────────────────────────────────────────

impl<S: SharingStore> SharingService<S> {
  /// Issue a new code for the caller's pregnancy and return its plaintext.
  ///
  /// The plaintext is not retrievable afterwards.
  pub async fn issue_invite_code(
    &self,
    owner_id:   &str,
    role:       InviteRole,
    permission: Option<Permission>,
  ) -> Result<IssuedCode> {
    let pregnancy = self.owned_pregnancy(owner_id).await?;
    if role == InviteRole::Father && pregnancy.has_approved_partner() {
      return Err(Error::Conflict("pregnancy already has a partner"));
    }

    let permission = permission.unwrap_or_default();
    let plaintext = code::generate()?;
    let code_hash = self.hasher.hash_blocking(plaintext.clone()).await?;
    let now = self.now();

    let stored = self
      .store
      .insert_invite_code(NewInviteCode {
        pregnancy_id: pregnancy.pregnancy_id,
        code_hash,
        code_prefix: code::prefix(&plaintext),
        role,
        permission,
        created_at: now,
        expires_at: now + self.policy.invite_ttl,
      })
      .await
      .map_err(Error::store)?;

    tracing::info!(
      pregnancy_id = %stored.pregnancy_id,
      code_id = %stored.code_id,
      role = %role,
      %permission,
      "issued invite code"
    );

    Ok(IssuedCode {
      code_id: stored.code_id,
      code: plaintext,
      role,
      permission,
      expires_at: stored.expires_at,
    })
  }

  /// Redeem a code on behalf of `request.user_id`.
  ///
  /// Every attempt is recorded. Unknown, expired, revoked and already-used
  /// codes are indistinguishable to the caller (`NotFound`).
  pub async fn redeem_invite_code(&self, request: RedeemRequest) -> Result<Redemption> {
    let RedeemRequest { code, user_id, display_name, email, origin } = request;
    let origin = origin.as_deref();

    self.ensure_not_throttled(&user_id).await?;

    if !code::validate_format(&code) {
      self.note_attempt(&user_id, false, origin).await;
      return Err(Error::Validation("invalid code format".to_owned()));
    }

    let now = self.now();
    let candidates = match self.store.all_active_invite_codes(now).await {
      Ok(candidates) => candidates,
      Err(e) => {
        self.note_attempt(&user_id, false, origin).await;
        return Err(Error::store(e));
      }
    };
    let prefix = code::prefix(&code);
    let candidates = candidates
      .into_iter()
      .filter(|c| c.code_prefix == prefix && c.is_active(now))
      .collect();

    let Some(matched) = self.hasher.find_match(code, candidates).await? else {
      self.note_attempt(&user_id, false, origin).await;
      return Err(Error::NotFound("invalid or expired code"));
    };

    let privileged = email.as_deref().is_some_and(|e| self.policy.privileged.contains(e));
    let permission = if privileged { Permission::Write } else { matched.permission };

    let claim = CodeClaim {
      code_id: matched.code_id,
      user_id: user_id.clone(),
      display_name,
      permission,
      display_card: !privileged,
      claimed_at: now,
    };

    let pregnancy = match self.store.redeem_invite_code(claim).await {
      Ok(Outcome::Applied(pregnancy)) => pregnancy,
      Ok(Outcome::Unavailable) => {
        self.note_attempt(&user_id, false, origin).await;
        return Err(Error::NotFound("code already redeemed or expired"));
      }
      Ok(Outcome::PartnerTaken) => {
        self.note_attempt(&user_id, false, origin).await;
        return Err(Error::Conflict("pregnancy already has a partner"));
      }
      Err(e) => {
        self.note_attempt(&user_id, false, origin).await;
        return Err(Error::store(e));
      }
    };

    self.note_attempt(&user_id, true, origin).await;
    tracing::info!(
      pregnancy_id = %pregnancy.pregnancy_id,
      code_id = %matched.code_id,
      role = %matched.role,
      %permission,
      privileged,
      "redeemed invite code"
    );

    Ok(Redemption { pregnancy, role: matched.role.access_role(), permission })
  }

  /// Revoke an active code on the caller's pregnancy. A code that is not the
  /// caller's, or is no longer active, is `NotFound`.
  pub async fn revoke_invite_code(&self, code_id: Uuid, owner_id: &str) -> Result<()> {
    let revoked = self
      .store
      .revoke_invite_code(code_id, owner_id, self.now())
      .await
      .map_err(Error::store)?;
    if !revoked {
      return Err(Error::NotFound("invite code not found"));
    }
    tracing::info!(%code_id, "revoked invite code");
    Ok(())
  }

  /// Active codes on the caller's pregnancy, newest first.
  pub async fn list_active_codes(&self, owner_id: &str) -> Result<Vec<ActiveCode>> {
    let pregnancy = self.owned_pregnancy(owner_id).await?;
    self.active_codes_of(pregnancy.pregnancy_id).await
  }

  /// Active supporters of the caller's pregnancy, newest first.
  pub async fn list_supporters(&self, owner_id: &str) -> Result<Vec<Supporter>> {
    let pregnancy = self.owned_pregnancy(owner_id).await?;
    self
      .store
      .active_supporters(pregnancy.pregnancy_id)
      .await
      .map_err(Error::store)
  }

  /// Soft-remove a supporter of the caller's pregnancy.
  pub async fn remove_supporter(&self, supporter_id: Uuid, owner_id: &str) -> Result<()> {
    let Some(pregnancy) =
      self.store.pregnancy_by_owner(owner_id).await.map_err(Error::store)?
    else {
      return Err(Error::NotFound("supporter not found"));
    };
    let removed = self
      .store
      .remove_supporter(supporter_id, pregnancy.pregnancy_id, self.now())
      .await
      .map_err(Error::store)?;
    if !removed {
      return Err(Error::NotFound("supporter not found"));
    }
    tracing::info!(pregnancy_id = %pregnancy.pregnancy_id, %supporter_id, "removed supporter");
    Ok(())
  }

  pub async fn update_supporter_permission(
    &self,
    supporter_id: Uuid,
    owner_id:     &str,
    permission:   Permission,
  ) -> Result<Supporter> {
    let Some(pregnancy) =
      self.store.pregnancy_by_owner(owner_id).await.map_err(Error::store)?
    else {
      return Err(Error::NotFound("supporter not found"));
    };
    self
      .store
      .set_supporter_permission(supporter_id, pregnancy.pregnancy_id, permission)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound("supporter not found"))
  }

  /// Partner, supporters and active codes of the caller's pregnancy.
  pub async fn sharing_status(&self, owner_id: &str) -> Result<SharingStatus> {
    let pregnancy = self.owned_pregnancy(owner_id).await?;
    let partner = match (&pregnancy.partner_id, pregnancy.has_approved_partner()) {
      (Some(user_id), true) => Some(PartnerCard {
        user_id:              user_id.clone(),
        name:                 pregnancy.partner_name.clone(),
        permission:           pregnancy.partner_permission.unwrap_or_default(),
        display_partner_card: pregnancy.display_partner_card,
      }),
      _ => None,
    };
    let supporters = self
      .store
      .active_supporters(pregnancy.pregnancy_id)
      .await
      .map_err(Error::store)?;
    let active_codes = self.active_codes_of(pregnancy.pregnancy_id).await?;

    Ok(SharingStatus {
      pregnancy_id: pregnancy.pregnancy_id,
      partner,
      supporters,
      active_codes,
    })
  }

  async fn active_codes_of(&self, pregnancy_id: Uuid) -> Result<Vec<ActiveCode>> {
    let now: DateTime<Utc> = self.now();
    let codes = self
      .store
      .active_invite_codes(pregnancy_id, now)
      .await
      .map_err(Error::store)?;
    Ok(codes.iter().map(|c| ActiveCode::from_code(c, now)).collect())
  }
}
