//! Typed client entries (kicks, weights, journal notes, ...) attached to a
//! pregnancy.
//!
//! Entries are keyed by the client's own id within a type, so that a client
//! can replay writes safely. Deletion is soft.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  access::Permission,
  service::SharingService,
  store::SharingStore,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
  pub entry_id:     Uuid,
  pub pregnancy_id: Uuid,
  pub client_id:    String,
  pub entry_type:   String,
  pub data:         serde_json::Value,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
  pub deleted_at:   Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
  pub client_id:  String,
  pub entry_type: String,
  #[serde(default)]
  pub data:       serde_json::Value,
}

impl NewEntry {
  fn validate(&self) -> Result<()> {
    if self.client_id.trim().is_empty() {
      return Err(Error::Validation("client id is required".to_owned()));
    }
    if self.entry_type.trim().is_empty() {
      return Err(Error::Validation("entry type is required".to_owned()));
    }
    Ok(())
  }
}

/// Parameters for [`SharingStore::entries`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryQuery {
  /// Restrict to one entry type.
  #[serde(rename = "type")]
  pub entry_type:      Option<String>,
  /// Only entries updated strictly after this instant.
  pub since:           Option<DateTime<Utc>>,
  #[serde(default)]
  pub include_deleted: bool,
}

impl<S: SharingStore> SharingService<S> {
  pub async fn upsert_entry(&self, user_id: &str, entry: NewEntry) -> Result<Entry> {
    entry.validate()?;
    let access = self.writable_access(user_id).await?;
    self
      .store
      .upsert_entry(access.pregnancy.pregnancy_id, entry, self.now())
      .await
      .map_err(Error::store)
  }

  /// Upsert several entries at once. Nothing is written if any entry is
  /// invalid.
  pub async fn upsert_entries(&self, user_id: &str, entries: Vec<NewEntry>) -> Result<Vec<Entry>> {
    entries.iter().try_for_each(NewEntry::validate)?;
    let access = self.writable_access(user_id).await?;
    if entries.is_empty() {
      return Ok(Vec::new());
    }

    let written = self
      .store
      .upsert_entries(access.pregnancy.pregnancy_id, entries, self.now())
      .await
      .map_err(Error::store)?;
    tracing::debug!(
      pregnancy_id = %access.pregnancy.pregnancy_id,
      count = written.len(),
      "upserted entry batch"
    );
    Ok(written)
  }

  /// Entries on the caller's accessible pregnancy, newest first.
  pub async fn list_entries(&self, user_id: &str, query: EntryQuery) -> Result<Vec<Entry>> {
    let access = self.resolve_access(user_id).await?;
    access.require(Permission::Read)?;
    self
      .store
      .entries(access.pregnancy.pregnancy_id, &query)
      .await
      .map_err(Error::store)
  }

  pub async fn delete_entry(&self, user_id: &str, client_id: &str) -> Result<()> {
    let access = self.writable_access(user_id).await?;
    let deleted = self
      .store
      .delete_entry(access.pregnancy.pregnancy_id, client_id, self.now())
      .await
      .map_err(Error::store)?;
    if !deleted {
      return Err(Error::NotFound("entry not found"));
    }
    Ok(())
  }
}
