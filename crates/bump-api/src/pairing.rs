//! Handlers for the email-based pairing workflow.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST`   | `/api/pairing/request` | Body: `{"targetEmail":"…","requesterName":"…"}` |
//! | `GET`    | `/api/pairing/pending` | Requests addressed to the caller |
//! | `POST`   | `/api/pairing/approve/{id}` | Body: `{"permission":"write"}`; target only |
//! | `POST`   | `/api/pairing/deny/{id}` | Target only |
//! | `POST`   | `/api/pairing/cancel/{id}` | Requester only |
//! | `PUT`    | `/api/pairing/permission` | Body: `{"permission":"read"}`; owner only |
//! | `DELETE` | `/api/pairing` | Either side |
//! | `GET`    | `/api/pairing/status` | |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use bump_core::{
  access::Permission,
  pairing::{PairingRequest, PairingView},
  store::SharingStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::AuthUser, error::ApiError, parse_permission};

// ─── Requests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
  pub target_email:   String,
  pub requester_name: Option<String>,
}

/// `POST /api/pairing/request`
pub async fn request<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Json(body): Json<RequestBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SharingStore + 'static,
{
  let request = state
    .service
    .create_pairing_request(&user.user_id, body.requester_name, &body.target_email)
    .await?;
  Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /api/pairing/pending`
pub async fn pending<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
) -> Result<Json<Vec<PairingRequest>>, ApiError>
where
  S: SharingStore + 'static,
{
  let requests = state.service.pending_pairing_requests(&user.user_id).await?;
  Ok(Json(requests))
}

// ─── Transitions ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct PermissionBody {
  pub permission: Option<String>,
}

impl PermissionBody {
  /// The requested level, defaulting to read.
  pub fn or_read(&self) -> Result<Permission, ApiError> {
    Ok(parse_permission(self.permission.as_deref())?.unwrap_or_default())
  }

  pub fn required(&self) -> Result<Permission, ApiError> {
    parse_permission(self.permission.as_deref())?
      .ok_or_else(|| ApiError::BadRequest("permission is required".to_owned()))
  }
}

/// `POST /api/pairing/approve/{id}`
pub async fn approve<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Path(id): Path<Uuid>,
  Json(body): Json<PermissionBody>,
) -> Result<Json<PairingRequest>, ApiError>
where
  S: SharingStore + 'static,
{
  let request = state
    .service
    .approve_pairing_request(id, &user.user_id, body.or_read()?)
    .await?;
  Ok(Json(request))
}

/// `POST /api/pairing/deny/{id}`
pub async fn deny<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Path(id): Path<Uuid>,
) -> Result<Json<PairingRequest>, ApiError>
where
  S: SharingStore + 'static,
{
  let request = state.service.deny_pairing_request(id, &user.user_id).await?;
  Ok(Json(request))
}

/// `POST /api/pairing/cancel/{id}`
pub async fn cancel<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Path(id): Path<Uuid>,
) -> Result<Json<PairingRequest>, ApiError>
where
  S: SharingStore + 'static,
{
  let request = state.service.cancel_pairing_request(id, &user.user_id).await?;
  Ok(Json(request))
}

// ─── Partner ──────────────────────────────────────────────────────────────────

/// `PUT /api/pairing/permission`
pub async fn permission<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Json(body): Json<PermissionBody>,
) -> Result<StatusCode, ApiError>
where
  S: SharingStore + 'static,
{
  state
    .service
    .update_partner_permission(&user.user_id, body.required()?)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/pairing`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
) -> Result<StatusCode, ApiError>
where
  S: SharingStore + 'static,
{
  state.service.remove_pairing(&user.user_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/pairing/status`
pub async fn status<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
) -> Result<Json<PairingView>, ApiError>
where
  S: SharingStore + 'static,
{
  let view = state.service.pairing_status(&user.user_id).await?;
  Ok(Json(view))
}
