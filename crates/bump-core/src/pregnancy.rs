//! The pregnancy aggregate and its supporter memberships.
//!
//! One pregnancy per owning user. Partner, co-owner and supporter fields are
//! mutated by the sharing flows; profile, outcome and archival fields by
//! whoever holds write access.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  access::Permission,
  service::SharingService,
  store::{Outcome, SharingStore},
};

// ─── Types ───────────────────────────────────────────────────────────────────

/// Where the partner slot of a pregnancy stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerStatus {
  #[default]
  None,
  Pending,
  Approved,
  Denied,
}

/// Owner-editable descriptive fields. `None` leaves a field unchanged on
/// update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  pub due_date:  Option<NaiveDate>,
  pub baby_name: Option<String>,
  pub mom_name:  Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pregnancy {
  pub pregnancy_id:         Uuid,
  pub owner_id:             String,
  pub partner_id:           Option<String>,
  pub partner_status:       PartnerStatus,
  pub partner_permission:   Option<Permission>,
  pub partner_name:         Option<String>,
  /// Write access without occupying the partner slot.
  pub coowner_id:           Option<String>,
  pub coowner_name:         Option<String>,
  pub display_partner_card: bool,
  #[serde(flatten)]
  pub profile:              Profile,
  pub outcome:              Option<String>,
  pub outcome_date:         Option<NaiveDate>,
  pub archived:             bool,
  pub archived_at:          Option<DateTime<Utc>>,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

impl Pregnancy {
  pub fn has_approved_partner(&self) -> bool {
    self.partner_id.is_some() && self.partner_status == PartnerStatus::Approved
  }
}

/// A delegated member of a pregnancy. Removal is soft.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supporter {
  pub supporter_id:         Uuid,
  pub pregnancy_id:         Uuid,
  pub user_id:              String,
  pub display_name:         Option<String>,
  pub permission:           Permission,
  pub joined_at:            DateTime<Utc>,
  pub invited_via_code:     Option<Uuid>,
  pub removed_at:           Option<DateTime<Utc>>,
  pub display_partner_card: bool,
}

/// The identity granted co-owner access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coowner {
  pub user_id:      String,
  pub display_name: Option<String>,
}

/// The partner fields written when a partner is paired, whichever flow does
/// the pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerLink {
  pub user_id:      String,
  pub permission:   Permission,
  pub display_name: Option<String>,
  pub display_card: bool,
}

// ─── Operations ──────────────────────────────────────────────────────────────

impl<S: SharingStore> SharingService<S> {
  /// Create the caller's pregnancy. A user owns at most one.
  pub async fn create_pregnancy(
    &self,
    owner_id: &str,
    profile:  Profile,
  ) -> Result<Pregnancy> {
    let inserted = self
      .store
      .insert_pregnancy(owner_id, &profile, self.now())
      .await
      .map_err(Error::store)?;
    let Outcome::Applied(pregnancy) = inserted else {
      return Err(Error::Conflict("user already owns a pregnancy"));
    };
    tracing::info!(pregnancy_id = %pregnancy.pregnancy_id, "created pregnancy");
    Ok(pregnancy)
  }

  /// Update profile fields on the caller's accessible pregnancy.
  pub async fn update_profile(&self, user_id: &str, profile: Profile) -> Result<Pregnancy> {
    let access = self.writable_access(user_id).await?;
    self
      .store
      .update_profile(access.pregnancy.pregnancy_id, &profile, self.now())
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound("pregnancy not found"))
  }

  /// Record (or clear) the outcome of the caller's accessible pregnancy.
  pub async fn set_outcome(
    &self,
    user_id:      &str,
    outcome:      Option<String>,
    outcome_date: Option<NaiveDate>,
  ) -> Result<Pregnancy> {
    let outcome = outcome.map(|o| o.trim().to_owned()).filter(|o| !o.is_empty());
    let access = self.writable_access(user_id).await?;
    self
      .store
      .set_outcome(
        access.pregnancy.pregnancy_id,
        outcome.as_deref(),
        outcome_date,
        self.now(),
      )
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound("pregnancy not found"))
  }

  pub async fn set_archived(&self, user_id: &str, archived: bool) -> Result<Pregnancy> {
    let access = self.writable_access(user_id).await?;
    self
      .store
      .set_archived(access.pregnancy.pregnancy_id, archived, self.now())
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound("pregnancy not found"))
  }

  /// Grant (or with `None`, withdraw) co-owner access. Owner only.
  pub async fn set_coowner(
    &self,
    owner_id: &str,
    coowner:  Option<Coowner>,
  ) -> Result<Pregnancy> {
    let pregnancy = self.owned_pregnancy(owner_id).await?;
    if let Some(c) = &coowner {
      if c.user_id.trim().is_empty() {
        return Err(Error::Validation("co-owner user id is required".to_owned()));
      }
      if c.user_id == owner_id {
        return Err(Error::Validation("the owner cannot be their own co-owner".to_owned()));
      }
    }
    let updated = self
      .store
      .set_coowner(pregnancy.pregnancy_id, coowner.as_ref(), self.now())
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound("pregnancy not found"))?;
    tracing::info!(
      pregnancy_id = %updated.pregnancy_id,
      granted = coowner.is_some(),
      "co-owner changed"
    );
    Ok(updated)
  }
}
