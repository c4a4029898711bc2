//! Handlers for the caller's own pregnancy record.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/api/me/role` | How the caller relates to their pregnancy; nulls if unrelated |
//! | `GET`    | `/api/pregnancy` | 404 if the caller has no access anywhere |
//! | `POST`   | `/api/pregnancy` | Body: profile; 409 if already an owner |
//! | `PUT`    | `/api/pregnancy` | Body: profile; requires write |
//! | `PUT`    | `/api/pregnancy/outcome` | Body: `{"outcome":"born","outcomeDate":"2025-09-10"}` |
//! | `PUT`    | `/api/pregnancy/archive` | Body: `{"archived":true}` |
//! | `PUT`    | `/api/pregnancy/coowner` | Body: `{"userId":"…","displayName":"…"}`; owner only |
//! | `DELETE` | `/api/pregnancy/coowner` | Owner only |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use bump_core::{
  access::{AccessRole, Permission},
  pregnancy::{Coowner, Pregnancy, Profile},
  store::SharingStore,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AppState, auth::AuthUser, error::ApiError};

// ─── Role ─────────────────────────────────────────────────────────────────────

/// The caller's relationship. Every field is `null` when the caller has no
/// access yet.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
  pub role:       Option<AccessRole>,
  pub permission: Option<Permission>,
  pub pregnancy:  Option<Pregnancy>,
}

/// `GET /api/me/role`
pub async fn my_role<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
) -> Result<Json<RoleView>, ApiError>
where
  S: SharingStore + 'static,
{
  let view = match state.service.my_access(&user.user_id).await? {
    Some(access) => RoleView {
      role:       Some(access.role),
      permission: Some(access.permission),
      pregnancy:  Some(access.pregnancy),
    },
    None => RoleView::default(),
  };
  Ok(Json(view))
}

// ─── Record ───────────────────────────────────────────────────────────────────

/// `GET /api/pregnancy`
pub async fn get_mine<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
) -> Result<Json<Pregnancy>, ApiError>
where
  S: SharingStore + 'static,
{
  let access = state.service.resolve_access(&user.user_id).await?;
  Ok(Json(access.pregnancy))
}

/// `POST /api/pregnancy`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Json(profile): Json<Profile>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SharingStore + 'static,
{
  let pregnancy = state.service.create_pregnancy(&user.user_id, profile).await?;
  Ok((StatusCode::CREATED, Json(pregnancy)))
}

/// `PUT /api/pregnancy`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Json(profile): Json<Profile>,
) -> Result<Json<Pregnancy>, ApiError>
where
  S: SharingStore + 'static,
{
  let pregnancy = state.service.update_profile(&user.user_id, profile).await?;
  Ok(Json(pregnancy))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeBody {
  pub outcome:      Option<String>,
  pub outcome_date: Option<NaiveDate>,
}

/// `PUT /api/pregnancy/outcome`
pub async fn outcome<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Json(body): Json<OutcomeBody>,
) -> Result<Json<Pregnancy>, ApiError>
where
  S: SharingStore + 'static,
{
  let pregnancy = state
    .service
    .set_outcome(&user.user_id, body.outcome, body.outcome_date)
    .await?;
  Ok(Json(pregnancy))
}

#[derive(Debug, Deserialize)]
pub struct ArchiveBody {
  pub archived: bool,
}

/// `PUT /api/pregnancy/archive`
pub async fn archive<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Json(body): Json<ArchiveBody>,
) -> Result<Json<Pregnancy>, ApiError>
where
  S: SharingStore + 'static,
{
  let pregnancy = state.service.set_archived(&user.user_id, body.archived).await?;
  Ok(Json(pregnancy))
}

// ─── Co-owner ─────────────────────────────────────────────────────────────────

/// `PUT /api/pregnancy/coowner`
pub async fn set_coowner<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Json(coowner): Json<Coowner>,
) -> Result<Json<Pregnancy>, ApiError>
where
  S: SharingStore + 'static,
{
  let pregnancy = state.service.set_coowner(&user.user_id, Some(coowner)).await?;
  Ok(Json(pregnancy))
}

/// `DELETE /api/pregnancy/coowner`
pub async fn clear_coowner<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
) -> Result<Json<Pregnancy>, ApiError>
where
  S: SharingStore + 'static,
{
  let pregnancy = state.service.set_coowner(&user.user_id, None).await?;
  Ok(Json(pregnancy))
}
