//! Invite code records and the values exchanged around them.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  access::{AccessRole, Permission},
  code,
  pregnancy::Pregnancy,
};

/// The relationship a code grants when redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteRole {
  /// Occupies the pregnancy's single partner slot.
  Father,
  Support,
}

impl InviteRole {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Father => "father",
      Self::Support => "support",
    }
  }

  pub fn access_role(self) -> AccessRole {
    match self {
      Self::Father => AccessRole::Father,
      Self::Support => AccessRole::Support,
    }
  }
}

impl fmt::Display for InviteRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for InviteRole {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "father" => Ok(Self::Father),
      "support" => Ok(Self::Support),
      other => Err(Error::Validation(format!("unknown role {other:?}"))),
    }
  }
}

/// A stored invite code. The plaintext is never persisted.
#[derive(Debug, Clone)]
pub struct InviteCode {
  pub code_id:      Uuid,
  pub pregnancy_id: Uuid,
  /// argon2id PHC string of the normalised code.
  pub code_hash:    String,
  pub code_prefix:  String,
  pub role:         InviteRole,
  pub permission:   Permission,
  pub created_at:   DateTime<Utc>,
  pub expires_at:   DateTime<Utc>,
  pub redeemed_at:  Option<DateTime<Utc>>,
  pub redeemed_by:  Option<String>,
  pub revoked_at:   Option<DateTime<Utc>>,
}

impl InviteCode {
  /// Not redeemed, not revoked and not yet expired.
  pub fn is_active(&self, now: DateTime<Utc>) -> bool {
    self.redeemed_at.is_none() && self.revoked_at.is_none() && self.expires_at > now
  }
}

/// Input for [`SharingStore::insert_invite_code`](crate::store::SharingStore::insert_invite_code).
#[derive(Debug, Clone)]
pub struct NewInviteCode {
  pub pregnancy_id: Uuid,
  pub code_hash:    String,
  pub code_prefix:  String,
  pub role:         InviteRole,
  pub permission:   Permission,
  pub created_at:   DateTime<Utc>,
  pub expires_at:   DateTime<Utc>,
}

/// A freshly issued code. This is the only place the plaintext appears.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCode {
  pub code_id:    Uuid,
  pub code:       String,
  pub role:       InviteRole,
  pub permission: Permission,
  pub expires_at: DateTime<Utc>,
}

/// An active code as listed to its owner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCode {
  pub code_id:     Uuid,
  /// Redacted display form, e.g. `A7K9-****-**`.
  pub code_prefix: String,
  pub role:        InviteRole,
  pub permission:  Permission,
  pub created_at:  DateTime<Utc>,
  pub expires_at:  DateTime<Utc>,
  pub expires_in:  String,
}

impl ActiveCode {
  pub fn from_code(code: &InviteCode, now: DateTime<Utc>) -> Self {
    Self {
      code_id:     code.code_id,
      code_prefix: code::redact(&code.code_prefix),
      role:        code.role,
      permission:  code.permission,
      created_at:  code.created_at,
      expires_at:  code.expires_at,
      expires_in:  code::expires_in(code.expires_at, now),
    }
  }
}

/// A redemption attempt as presented by the transport layer.
#[derive(Debug, Clone)]
pub struct RedeemRequest {
  pub code:         String,
  pub user_id:      String,
  pub display_name: Option<String>,
  /// Verified email of the caller, if the identity provider supplied one.
  pub email:        Option<String>,
  /// Client address or similar, recorded with the attempt.
  pub origin:       Option<String>,
}

/// What the store needs to consume a matched code.
#[derive(Debug, Clone)]
pub struct CodeClaim {
  pub code_id:      Uuid,
  pub user_id:      String,
  pub display_name: Option<String>,
  /// Level granted, after any privileged override.
  pub permission:   Permission,
  pub display_card: bool,
  pub claimed_at:   DateTime<Utc>,
}

/// The access a successful redemption granted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
  pub pregnancy:  Pregnancy,
  pub role:       AccessRole,
  pub permission: Permission,
}
