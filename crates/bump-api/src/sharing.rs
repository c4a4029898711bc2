//! Handlers for invite codes and supporters.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/api/sharing/status` | Owner only |
//! | `POST`   | `/api/sharing/generate` | Body: `{"role":"support","permission":"read"}`; owner only |
//! | `POST`   | `/api/sharing/redeem` | Body: `{"code":"A7K9-M2X4-P8","displayName":"…"}`; throttled |
//! | `GET`    | `/api/sharing/codes` | Active codes, redacted |
//! | `POST`   | `/api/sharing/codes/{id}/revoke` | 404 unless active and owned |
//! | `GET`    | `/api/sharing/supporters` | Active supporters |
//! | `DELETE` | `/api/sharing/supporters/{id}` | Soft removal |
//! | `PUT`    | `/api/sharing/supporters/{id}/permission` | Body: `{"permission":"write"}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use bump_core::{
  invite::{ActiveCode, InviteRole, RedeemRequest, Redemption},
  pregnancy::Supporter,
  sharing::SharingStatus,
  store::SharingStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{AuthUser, ClientOrigin},
  error::ApiError,
  pairing::PermissionBody,
  parse_permission,
};

/// `GET /api/sharing/status`
pub async fn status<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
) -> Result<Json<SharingStatus>, ApiError>
where
  S: SharingStore + 'static,
{
  let status = state.service.sharing_status(&user.user_id).await?;
  Ok(Json(status))
}

// ─── Codes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
  pub role:       String,
  pub permission: Option<String>,
}

/// `POST /api/sharing/generate`
pub async fn generate<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Json(body): Json<GenerateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SharingStore + 'static,
{
  let role: InviteRole = body.role.parse()?;
  let permission = parse_permission(body.permission.as_deref())?;
  let issued = state
    .service
    .issue_invite_code(&user.user_id, role, permission)
    .await?;
  Ok((StatusCode::CREATED, Json(issued)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemBody {
  pub code:         String,
  pub display_name: Option<String>,
}

/// `POST /api/sharing/redeem`
///
/// The privileged-email check uses the token's email claim only.
pub async fn redeem<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  ClientOrigin(origin): ClientOrigin,
  Json(body): Json<RedeemBody>,
) -> Result<Json<Redemption>, ApiError>
where
  S: SharingStore + 'static,
{
  let redemption = state
    .service
    .redeem_invite_code(RedeemRequest {
      code: body.code,
      user_id: user.user_id,
      display_name: body.display_name,
      email: user.email,
      origin,
    })
    .await?;
  Ok(Json(redemption))
}

/// `GET /api/sharing/codes`
pub async fn codes<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
) -> Result<Json<Vec<ActiveCode>>, ApiError>
where
  S: SharingStore + 'static,
{
  let codes = state.service.list_active_codes(&user.user_id).await?;
  Ok(Json(codes))
}

/// `POST /api/sharing/codes/{id}/revoke`
pub async fn revoke<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: SharingStore + 'static,
{
  state.service.revoke_invite_code(id, &user.user_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Supporters ───────────────────────────────────────────────────────────────

/// `GET /api/sharing/supporters`
pub async fn supporters<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
) -> Result<Json<Vec<Supporter>>, ApiError>
where
  S: SharingStore + 'static,
{
  let supporters = state.service.list_supporters(&user.user_id).await?;
  Ok(Json(supporters))
}

/// `DELETE /api/sharing/supporters/{id}`
pub async fn remove_supporter<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: SharingStore + 'static,
{
  state.service.remove_supporter(id, &user.user_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/sharing/supporters/{id}/permission`
pub async fn supporter_permission<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Path(id): Path<Uuid>,
  Json(body): Json<PermissionBody>,
) -> Result<Json<Supporter>, ApiError>
where
  S: SharingStore + 'static,
{
  let supporter = state
    .service
    .update_supporter_permission(id, &user.user_id, body.required()?)
    .await?;
  Ok(Json(supporter))
}
