//! Access resolution: which pregnancy a user may see, and how.
//!
//! A user reaches at most one pregnancy. The relationships are tried in a
//! fixed order (owner, co-owner, approved partner, active supporter) and the
//! first match wins, so an owner who is also someone's supporter still
//! resolves to their own record.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  pregnancy::Pregnancy,
  service::SharingService,
  store::SharingStore,
};

// ─── Types ───────────────────────────────────────────────────────────────────

/// Level of access held on a pregnancy. Unset levels read as `Read`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
  #[default]
  Read,
  Write,
}

impl Permission {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Read => "read",
      Self::Write => "write",
    }
  }

  /// `true` if this level satisfies `required`.
  pub fn allows(self, required: Permission) -> bool { self >= required }
}

impl fmt::Display for Permission {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Permission {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "read" => Ok(Self::Read),
      "write" => Ok(Self::Write),
      other => Err(Error::Validation(format!("unknown permission {other:?}"))),
    }
  }
}

/// How a user is related to the pregnancy they can access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
  Owner,
  Coowner,
  Father,
  Support,
}

impl AccessRole {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Owner => "owner",
      Self::Coowner => "coowner",
      Self::Father => "father",
      Self::Support => "support",
    }
  }
}

/// The resolved relationship between a user and a pregnancy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
  pub pregnancy:  Pregnancy,
  pub role:       AccessRole,
  pub permission: Permission,
}

impl Access {
  /// Fail with `Forbidden` unless this access satisfies `required`.
  pub fn require(&self, required: Permission) -> Result<()> {
    if self.permission.allows(required) {
      Ok(())
    } else {
      Err(Error::Forbidden("read-only access"))
    }
  }
}

// ─── Resolution ──────────────────────────────────────────────────────────────

impl<S: SharingStore> SharingService<S> {
  /// Resolve the pregnancy `user_id` may access.
  ///
  /// Returns `NotFound` when the user has no relationship to any pregnancy.
  pub async fn resolve_access(&self, user_id: &str) -> Result<Access> {
    self
      .my_access(user_id)
      .await?
      .ok_or(Error::NotFound("no accessible pregnancy"))
  }

  /// The caller's access as reported to clients; `None` when the user has no
  /// relationship to any pregnancy yet.
  pub async fn my_access(&self, user_id: &str) -> Result<Option<Access>> {
    if let Some(pregnancy) =
      self.store.pregnancy_by_owner(user_id).await.map_err(Error::store)?
    {
      return Ok(Some(Access {
        pregnancy,
        role: AccessRole::Owner,
        permission: Permission::Write,
      }));
    }

    if let Some(pregnancy) =
      self.store.pregnancy_by_coowner(user_id).await.map_err(Error::store)?
    {
      return Ok(Some(Access {
        pregnancy,
        role: AccessRole::Coowner,
        permission: Permission::Write,
      }));
    }

    if let Some(pregnancy) =
      self.store.pregnancy_by_partner(user_id).await.map_err(Error::store)?
    {
      let permission = pregnancy.partner_permission.unwrap_or_default();
      return Ok(Some(Access { pregnancy, role: AccessRole::Father, permission }));
    }

    if let Some((pregnancy, supporter)) =
      self.store.pregnancy_by_supporter(user_id).await.map_err(Error::store)?
    {
      return Ok(Some(Access {
        pregnancy,
        role: AccessRole::Support,
        permission: supporter.permission,
      }));
    }

    Ok(None)
  }

  pub(crate) async fn writable_access(&self, user_id: &str) -> Result<Access> {
    let access = self.resolve_access(user_id).await?;
    access.require(Permission::Write)?;
    Ok(access)
  }
}
