//! Handlers for `/api/entries`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/api/entries` | Optional `?type=kick&since=<rfc3339>&includeDeleted=true` |
//! | `POST`   | `/api/entries` | Body: `{"clientId":"…","entryType":"kick","data":{…}}`; upsert |
//! | `POST`   | `/api/entries/batch` | Body: `{"entries":[…]}`; all-or-nothing upsert |
//! | `DELETE` | `/api/entries/{client_id}` | Soft delete; 404 if no live entry |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use bump_core::{
  entry::{Entry, EntryQuery, NewEntry},
  store::SharingStore,
};

use serde::{Deserialize, Serialize};

use crate::{AppState, auth::AuthUser, error::ApiError};

/// `GET /api/entries`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Query(query): Query<EntryQuery>,
) -> Result<Json<Vec<Entry>>, ApiError>
where
  S: SharingStore + 'static,
{
  let entries = state.service.list_entries(&user.user_id, query).await?;
  Ok(Json(entries))
}

/// `POST /api/entries`
pub async fn upsert<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Json(entry): Json<NewEntry>,
) -> Result<Json<Entry>, ApiError>
where
  S: SharingStore + 'static,
{
  let entry = state.service.upsert_entry(&user.user_id, entry).await?;
  Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
pub struct BatchBody {
  pub entries: Vec<NewEntry>,
}

#[derive(Debug, Serialize)]
pub struct BatchView {
  pub entries: Vec<Entry>,
}

/// `POST /api/entries/batch`
pub async fn batch<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Json(body): Json<BatchBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SharingStore + 'static,
{
  let entries = state.service.upsert_entries(&user.user_id, body.entries).await?;
  Ok((StatusCode::CREATED, Json(BatchView { entries })))
}

/// `DELETE /api/entries/{client_id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  user: AuthUser,
  Path(client_id): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: SharingStore + 'static,
{
  state.service.delete_entry(&user.user_id, &client_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
