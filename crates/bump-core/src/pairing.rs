//! The legacy pairing workflow.
//!
//! A would-be partner asks, by email, to be paired with an owner. The owner
//! approves (choosing a permission level) or denies; the requester may cancel
//! while the request is pending. Every transition leaves `Pending`, and none
//! returns to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  access::Permission,
  service::SharingService,
  store::{Outcome, SharingStore},
};

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
  Pending,
  Approved,
  Denied,
  Cancelled,
}

impl RequestStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
      Self::Denied => "denied",
      Self::Cancelled => "cancelled",
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingRequest {
  pub request_id:     Uuid,
  pub requester_id:   String,
  pub requester_name: Option<String>,
  pub target_email:   String,
  /// The user the email resolved to when the request was made, if any.
  pub target_id:      Option<String>,
  pub status:         RequestStatus,
  /// Set on approval.
  pub permission:     Option<Permission>,
  pub created_at:     DateTime<Utc>,
  pub resolved_at:    Option<DateTime<Utc>>,
}

/// Input for [`SharingStore::insert_pairing_request`].
#[derive(Debug, Clone)]
pub struct NewPairingRequest {
  pub requester_id:   String,
  pub requester_name: Option<String>,
  pub target_email:   String,
  pub created_at:     DateTime<Utc>,
}

/// Which side of a pairing the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingSide {
  Owner,
  Partner,
}

/// The other party of a pairing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counterpart {
  pub user_id:    String,
  pub name:       Option<String>,
  pub permission: Permission,
  pub paired_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingView {
  pub paired:  bool,
  pub role:    Option<PairingSide>,
  pub partner: Option<Counterpart>,
}

// ─── Operations ──────────────────────────────────────────────────────────────

impl<S: SharingStore> SharingService<S> {
  /// Remember the email `user_id` signed in with, so pairing requests
  /// addressed to it reach them. Blank emails are ignored.
  pub async fn remember_user(&self, user_id: &str, email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() {
      return Ok(());
    }
    self
      .store
      .remember_user(user_id, email, self.now())
      .await
      .map_err(Error::store)
  }

  /// Ask to be paired with the owner registered under `target_email`.
  pub async fn create_pairing_request(
    &self,
    requester_id:   &str,
    requester_name: Option<String>,
    target_email:   &str,
  ) -> Result<PairingRequest> {
    let target_email = target_email.trim();
    if target_email.is_empty() {
      return Err(Error::Validation("target email is required".to_owned()));
    }

    let request = self
      .store
      .insert_pairing_request(NewPairingRequest {
        requester_id: requester_id.to_owned(),
        requester_name,
        target_email: target_email.to_owned(),
        created_at: self.now(),
      })
      .await
      .map_err(Error::store)?;

    tracing::info!(
      request_id = %request.request_id,
      resolved = request.target_id.is_some(),
      "pairing requested"
    );
    Ok(request)
  }

  /// Pending requests addressed to `target_id`, newest first.
  pub async fn pending_pairing_requests(&self, target_id: &str) -> Result<Vec<PairingRequest>> {
    self
      .store
      .pending_pairing_requests(target_id)
      .await
      .map_err(Error::store)
  }

  /// Approve a pending request and make its requester the partner on the
  /// caller's pregnancy, atomically.
  pub async fn approve_pairing_request(
    &self,
    request_id: Uuid,
    target_id:  &str,
    permission: Permission,
  ) -> Result<PairingRequest> {
    match self
      .store
      .approve_pairing_request(request_id, target_id, permission, self.now())
      .await
      .map_err(Error::store)?
    {
      Outcome::Applied(request) => {
        tracing::info!(%request_id, %permission, "pairing approved");
        Ok(request)
      }
      Outcome::Unavailable => Err(Error::NotFound("pairing request not found")),
      Outcome::PartnerTaken => Err(Error::Conflict("pregnancy already has a partner")),
    }
  }

  pub async fn deny_pairing_request(
    &self,
    request_id: Uuid,
    target_id:  &str,
  ) -> Result<PairingRequest> {
    let request = self
      .store
      .deny_pairing_request(request_id, target_id, self.now())
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound("pairing request not found"))?;
    tracing::info!(%request_id, "pairing denied");
    Ok(request)
  }

  /// Withdraw the caller's own pending request.
  pub async fn cancel_pairing_request(
    &self,
    request_id:   Uuid,
    requester_id: &str,
  ) -> Result<PairingRequest> {
    let request = self
      .store
      .cancel_pairing_request(request_id, requester_id, self.now())
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound("pairing request not found"))?;
    tracing::info!(%request_id, "pairing request cancelled");
    Ok(request)
  }

  /// Change the partner's permission on the caller's pregnancy.
  pub async fn update_partner_permission(
    &self,
    owner_id:   &str,
    permission: Permission,
  ) -> Result<()> {
    self
      .store
      .update_partner_permission(owner_id, permission, self.now())
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound("no partner paired"))?;
    Ok(())
  }

  /// Dissolve the caller's pairing, whichever side they are on.
  pub async fn remove_pairing(&self, user_id: &str) -> Result<()> {
    let removed = self
      .store
      .remove_pairing(user_id, self.now())
      .await
      .map_err(Error::store)?;
    if !removed {
      return Err(Error::NotFound("no pairing found"));
    }
    tracing::info!("pairing removed");
    Ok(())
  }

  /// The caller's pairing, seen from their side.
  pub async fn pairing_status(&self, user_id: &str) -> Result<PairingView> {
    if let Some(pregnancy) =
      self.store.pregnancy_by_owner(user_id).await.map_err(Error::store)?
    {
      let partner = match (&pregnancy.partner_id, pregnancy.has_approved_partner()) {
        (Some(partner_id), true) => Some(Counterpart {
          user_id:    partner_id.clone(),
          name:       pregnancy.partner_name.clone(),
          permission: pregnancy.partner_permission.unwrap_or_default(),
          paired_at:  pregnancy.updated_at,
        }),
        _ => None,
      };
      return Ok(PairingView {
        paired: partner.is_some(),
        role: Some(PairingSide::Owner),
        partner,
      });
    }

    if let Some(pregnancy) =
      self.store.pregnancy_by_partner(user_id).await.map_err(Error::store)?
    {
      return Ok(PairingView {
        paired:  true,
        role:    Some(PairingSide::Partner),
        partner: Some(Counterpart {
          user_id:    pregnancy.owner_id.clone(),
          name:       pregnancy.profile.mom_name.clone(),
          permission: pregnancy.partner_permission.unwrap_or_default(),
          paired_at:  pregnancy.updated_at,
        }),
      });
    }

    Ok(PairingView { paired: false, role: None, partner: None })
  }
}
