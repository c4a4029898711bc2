//! Bearer-token authentication extractor and standalone verifier.
//!
//! Tokens are compact HMAC-signed JWTs (HS256, HS384 or HS512) using a key
//! shared with the identity provider. Only three claims are read: `uid`
//! (required), `exp` (seconds since the epoch, optional) and `email`
//! (optional).

use std::{convert::Infallible, net::SocketAddr};

use axum::{
  extract::{ConnectInfo, FromRequestParts},
  http::{HeaderMap, header, request::Parts},
};
use base64::{
  Engine as _,
  engine::general_purpose::{STANDARD as B64, URL_SAFE_NO_PAD as B64URL},
};
use bump_core::store::SharingStore;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac, digest::KeyInit};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Sha256, Sha384, Sha512};

use crate::{AppState, error::ApiError};

/// Key material accepted for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  token_key: Vec<u8>,
}

impl AuthConfig {
  pub fn new(token_key: impl Into<Vec<u8>>) -> Self { Self { token_key: token_key.into() } }

  /// Decode a standard-alphabet base64 key, as written in `config.toml`.
  pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
    B64.decode(encoded.trim()).map(Self::new)
  }
}

/// HMAC signing algorithms accepted in the token header. Anything else,
/// `none` included, is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
  #[serde(rename = "HS256")]
  Hs256,
  #[serde(rename = "HS384")]
  Hs384,
  #[serde(rename = "HS512")]
  Hs512,
}

impl Algorithm {
  fn sign(self, key: &[u8], input: &[u8]) -> Result<Vec<u8>, ApiError> {
    match self {
      Self::Hs256 => sign_with::<Hmac<Sha256>>(key, input),
      Self::Hs384 => sign_with::<Hmac<Sha384>>(key, input),
      Self::Hs512 => sign_with::<Hmac<Sha512>>(key, input),
    }
  }

  fn verify(self, key: &[u8], input: &[u8], signature: &[u8]) -> Result<(), ApiError> {
    match self {
      Self::Hs256 => verify_with::<Hmac<Sha256>>(key, input, signature),
      Self::Hs384 => verify_with::<Hmac<Sha384>>(key, input, signature),
      Self::Hs512 => verify_with::<Hmac<Sha512>>(key, input, signature),
    }
  }
}

fn keyed<M: Mac + KeyInit>(key: &[u8], input: &[u8]) -> Result<M, ApiError> {
  let mut mac = <M as KeyInit>::new_from_slice(key).map_err(|_| ApiError::Unauthorized)?;
  Mac::update(&mut mac, input);
  Ok(mac)
}

fn sign_with<M: Mac + KeyInit>(key: &[u8], input: &[u8]) -> Result<Vec<u8>, ApiError> {
  Ok(keyed::<M>(key, input)?.finalize().into_bytes().to_vec())
}

fn verify_with<M: Mac + KeyInit>(
  key: &[u8],
  input: &[u8],
  signature: &[u8],
) -> Result<(), ApiError> {
  keyed::<M>(key, input)?
    .verify_slice(signature)
    .map_err(|_| ApiError::Unauthorized)
}

/// Token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub uid:   String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exp:   Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct TokenHeader {
  alg: Algorithm,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  typ: Option<String>,
}

/// The authenticated caller. Present in a handler means the token verified.
#[derive(Debug, Clone)]
pub struct AuthUser {
  pub user_id: String,
  pub email:   Option<String>,
}

/// Sign `claims` with HS256. Used by the server's `--issue-token` helper and
/// by tests.
pub fn issue_token(config: &AuthConfig, claims: &Claims) -> Result<String, ApiError> {
  sign_token(config, Algorithm::Hs256, claims)
}

/// Sign `claims` with `alg`.
pub fn sign_token(
  config: &AuthConfig,
  alg: Algorithm,
  claims: &Claims,
) -> Result<String, ApiError> {
  let header = TokenHeader { alg, typ: Some("JWT".to_owned()) };
  let header = serde_json::to_vec(&header).map_err(|e| ApiError::BadRequest(e.to_string()))?;
  let payload =
    serde_json::to_vec(claims).map_err(|e| ApiError::BadRequest(e.to_string()))?;
  let signing_input = format!("{}.{}", B64URL.encode(header), B64URL.encode(payload));

  let signature = alg.sign(&config.token_key, signing_input.as_bytes())?;
  Ok(format!("{signing_input}.{}", B64URL.encode(signature)))
}

/// Verify a compact token and return its claims.
pub fn verify_token(
  token: &str,
  config: &AuthConfig,
  now: DateTime<Utc>,
) -> Result<Claims, ApiError> {
  let mut segments = token.split('.');
  let (Some(header), Some(payload), Some(signature), None) =
    (segments.next(), segments.next(), segments.next(), segments.next())
  else {
    return Err(ApiError::Unauthorized);
  };

  let token_header: TokenHeader = decode_segment(header)?;
  let signature = B64URL.decode(signature).map_err(|_| ApiError::Unauthorized)?;
  let signing_input = &token[..header.len() + 1 + payload.len()];
  token_header
    .alg
    .verify(&config.token_key, signing_input.as_bytes(), &signature)?;

  let claims: Claims = decode_segment(payload)?;
  if claims.uid.trim().is_empty() {
    return Err(ApiError::Unauthorized);
  }
  if let Some(exp) = claims.exp
    && exp <= now.timestamp()
  {
    return Err(ApiError::Unauthorized);
  }
  Ok(claims)
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, ApiError> {
  let bytes = B64URL.decode(segment).map_err(|_| ApiError::Unauthorized)?;
  serde_json::from_slice(&bytes).map_err(|_| ApiError::Unauthorized)
}

/// Verify the `Authorization: Bearer …` header. The scheme matches in any
/// case.
pub fn verify_auth(
  headers: &HeaderMap,
  config: &AuthConfig,
  now: DateTime<Utc>,
) -> Result<AuthUser, ApiError> {
  let token = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.trim().split_once(' '))
    .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
    .map(|(_, token)| token.trim())
    .ok_or(ApiError::Unauthorized)?;

  let claims = verify_token(token, config, now)?;
  Ok(AuthUser {
    user_id: claims.uid,
    email:   claims.email.filter(|e| !e.trim().is_empty()),
  })
}

impl<S> FromRequestParts<AppState<S>> for AuthUser
where
  S: SharingStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let user = verify_auth(&parts.headers, &state.auth, Utc::now())?;

    // Keeps the email directory current for pairing requests.
    if let Some(email) = &user.email
      && let Err(e) = state.service.remember_user(&user.user_id, email).await
    {
      tracing::warn!(error = %e, "failed to record user email");
    }
    Ok(user)
  }
}

/// Best-effort client address: the first `X-Forwarded-For` hop, else the
/// peer address when the server was started with connect info.
#[derive(Debug, Clone)]
pub struct ClientOrigin(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientOrigin {
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let forwarded = parts
      .headers
      .get("x-forwarded-for")
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.split(',').next())
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(str::to_owned);

    let origin = forwarded.or_else(|| {
      parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
    });
    Ok(Self(origin))
  }
}
