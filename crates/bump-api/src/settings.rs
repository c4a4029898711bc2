//! Handlers for `/api/settings`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET` | `/api/settings` | `{"settings":{"<type>":{…}}}` |
//! | `PUT` | `/api/settings/{type}` | Body: any JSON document; replaces that type; requires write |

use std::collections::BTreeMap;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use bump_core::store::SharingStore;
use serde::Serialize;
use serde_json::Value;

use crate::{AppState, auth::AuthUser, error::ApiError};

#[derive(Debug, Serialize)]
pub struct SettingsView {
  pub settings: BTreeMap<String, Value>,
}

/// `GET /api/settings`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
) -> Result<Json<SettingsView>, ApiError>
where
  S: SharingStore + 'static,
{
  let settings = state.service.settings(&user.user_id).await?;
  Ok(Json(SettingsView { settings }))
}

/// `PUT /api/settings/{type}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Path(setting_type): Path<String>,
  Json(data): Json<Value>,
) -> Result<StatusCode, ApiError>
where
  S: SharingStore + 'static,
{
  state.service.update_setting(&user.user_id, &setting_type, data).await?;
  Ok(StatusCode::NO_CONTENT)
}
