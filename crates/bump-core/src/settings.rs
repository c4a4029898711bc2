//! Per-pregnancy settings: free-form JSON documents keyed by a client-chosen
//! type (`"notifications"`, `"units"`, ...). Writing a type replaces its
//! document.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
  Error, Result,
  access::Permission,
  service::SharingService,
  store::SharingStore,
};

const MAX_TYPE_LEN: usize = 64;

impl<S: SharingStore> SharingService<S> {
  /// All settings on the caller's accessible pregnancy.
  pub async fn settings(&self, user_id: &str) -> Result<BTreeMap<String, Value>> {
    let access = self.resolve_access(user_id).await?;
    access.require(Permission::Read)?;
    self
      .store
      .settings(access.pregnancy.pregnancy_id)
      .await
      .map_err(Error::store)
  }

  /// Replace the document stored under `setting_type`. Requires write.
  pub async fn update_setting(
    &self,
    user_id: &str,
    setting_type: &str,
    data: Value,
  ) -> Result<()> {
    let setting_type = setting_type.trim();
    if setting_type.is_empty() || setting_type.len() > MAX_TYPE_LEN {
      return Err(Error::Validation("invalid setting type".to_owned()));
    }

    let access = self.writable_access(user_id).await?;
    self
      .store
      .upsert_setting(access.pregnancy.pregnancy_id, setting_type, &data, self.now())
      .await
      .map_err(Error::store)
  }
}
