//! JSON REST surface for the Bump sharing engine.
//!
//! Exposes an axum [`Router`] over any [`SharingStore`]. Every route under
//! `/api` requires a bearer token (see [`auth`]); `/health` does not.

pub mod auth;
pub mod entries;
pub mod error;
pub mod pairing;
pub mod pregnancy;
pub mod settings;
pub mod sharing;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  http::{HeaderValue, Method, header},
  routing::{delete, get, post, put},
};
use bump_core::{
  SharingPolicy, SharingService,
  access::Permission,
  hasher::CodeHasher,
  limiter::RateLimit,
  service::DEFAULT_INVITE_TTL_HOURS,
  store::SharingStore,
};
use chrono::Duration;
use serde::Deserialize;
use tower_http::{
  cors::{AllowOrigin, CorsLayer},
  trace::TraceLayer,
};

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `BUMP_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "defaults::host")]
  pub host:                   String,
  #[serde(default = "defaults::port")]
  pub port:                   u16,
  #[serde(default = "defaults::store_path")]
  pub store_path:             PathBuf,
  /// Base64 HS256 key shared with the identity provider.
  pub token_key:              String,
  #[serde(default)]
  pub privileged_emails:      Vec<String>,
  #[serde(default = "defaults::max_failed_attempts")]
  pub max_failed_attempts:    u32,
  #[serde(default = "defaults::attempt_window_minutes")]
  pub attempt_window_minutes: i64,
  #[serde(default = "defaults::invite_ttl_hours")]
  pub invite_ttl_hours:       i64,
  #[serde(default = "defaults::hash_memory_kib")]
  pub hash_memory_kib:        u32,
  #[serde(default = "defaults::hash_iterations")]
  pub hash_iterations:        u32,
  #[serde(default = "defaults::hash_lanes")]
  pub hash_lanes:             u32,
  /// Browser origins allowed by CORS; `*` allows any.
  #[serde(default = "defaults::cors_origins")]
  pub cors_origins:           Vec<String>,
}

mod defaults {
  use std::path::PathBuf;

  pub fn host() -> String { "127.0.0.1".to_owned() }
  pub fn port() -> u16 { 8080 }
  pub fn store_path() -> PathBuf { PathBuf::from("~/.local/share/bump/bump.db") }
  pub fn max_failed_attempts() -> u32 { 5 }
  pub fn attempt_window_minutes() -> i64 { 60 }
  pub fn invite_ttl_hours() -> i64 { super::DEFAULT_INVITE_TTL_HOURS }
  // argon2 crate defaults.
  pub fn hash_memory_kib() -> u32 { 19 * 1024 }
  pub fn hash_iterations() -> u32 { 2 }
  pub fn hash_lanes() -> u32 { 1 }
  pub fn cors_origins() -> Vec<String> { vec!["*".to_owned()] }
}

impl ServerConfig {
  pub fn policy(&self) -> SharingPolicy {
    SharingPolicy {
      privileged: self.privileged_emails.iter().collect(),
      rate_limit: RateLimit {
        max_failures: self.max_failed_attempts,
        window:       Duration::minutes(self.attempt_window_minutes),
      },
      invite_ttl: Duration::hours(self.invite_ttl_hours),
    }
  }

  pub fn code_hasher(&self) -> bump_core::Result<CodeHasher> {
    CodeHasher::with_cost(self.hash_memory_kib, self.hash_iterations, self.hash_lanes)
  }

  pub fn cors(&self) -> CorsLayer { cors_layer(&self.cors_origins) }
}

/// CORS for browser clients: the API's methods, and the `Authorization` and
/// `Content-Type` request headers. Origins that are not valid header values
/// are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
  let allow_origin = if origins.iter().any(|o| o.trim() == "*") {
    AllowOrigin::any()
  } else {
    AllowOrigin::list(origins.iter().filter_map(|origin| {
      HeaderValue::from_str(origin.trim())
        .inspect_err(|_| tracing::warn!(%origin, "ignoring invalid CORS origin"))
        .ok()
    }))
  };

  CorsLayer::new()
    .allow_origin(allow_origin)
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S: SharingStore> {
  pub service: Arc<SharingService<S>>,
  pub auth:    Arc<AuthConfig>,
}

impl<S: SharingStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { service: Arc::clone(&self.service), auth: Arc::clone(&self.auth) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the API.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: SharingStore + 'static,
{
  let api = Router::new()
    .route("/me/role", get(pregnancy::my_role::<S>))
    .route(
      "/pregnancy",
      get(pregnancy::get_mine::<S>)
        .post(pregnancy::create::<S>)
        .put(pregnancy::update::<S>),
    )
    .route("/pregnancy/outcome", put(pregnancy::outcome::<S>))
    .route("/pregnancy/archive", put(pregnancy::archive::<S>))
    .route(
      "/pregnancy/coowner",
      put(pregnancy::set_coowner::<S>).delete(pregnancy::clear_coowner::<S>),
    )
    .route("/entries", get(entries::list::<S>).post(entries::upsert::<S>))
    .route("/entries/batch", post(entries::batch::<S>))
    .route("/entries/{client_id}", delete(entries::remove::<S>))
    .route("/settings", get(settings::list::<S>))
    .route("/settings/{setting_type}", put(settings::update::<S>))
    .route("/pairing", delete(pairing::remove::<S>))
    .route("/pairing/request", post(pairing::request::<S>))
    .route("/pairing/pending", get(pairing::pending::<S>))
    .route("/pairing/approve/{id}", post(pairing::approve::<S>))
    .route("/pairing/deny/{id}", post(pairing::deny::<S>))
    .route("/pairing/cancel/{id}", post(pairing::cancel::<S>))
    .route("/pairing/permission", put(pairing::permission::<S>))
    .route("/pairing/status", get(pairing::status::<S>))
    .route("/sharing/status", get(sharing::status::<S>))
    .route("/sharing/generate", post(sharing::generate::<S>))
    .route("/sharing/redeem", post(sharing::redeem::<S>))
    .route("/sharing/codes", get(sharing::codes::<S>))
    .route("/sharing/codes/{id}/revoke", post(sharing::revoke::<S>))
    .route("/sharing/supporters", get(sharing::supporters::<S>))
    .route("/sharing/supporters/{id}", delete(sharing::remove_supporter::<S>))
    .route(
      "/sharing/supporters/{id}/permission",
      put(sharing::supporter_permission::<S>),
    );

  Router::new()
    .route("/health", get(health))
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// `GET /health`
async fn health() -> &'static str { "ok" }

/// Parse an optional permission string from a request body. Blank means
/// unset.
pub(crate) fn parse_permission(raw: Option<&str>) -> Result<Option<Permission>, ApiError> {
  match raw.map(str::trim) {
    None | Some("") => Ok(None),
    Some(s) => Ok(Some(s.parse()?)),
  }
}
