//! bump-api server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `BUMP_*` environment variables, opens an in-process SQLite store, and
//! serves the JSON API over HTTP.
//!
//! # Development tokens
//!
//! To mint a bearer token signed with the configured `token_key`:
//!
//! ```
//! cargo run -p bump-api --bin server -- --issue-token <user-id> --email me@example.com
//! ```

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use bump_api::{
  AppState, ServerConfig,
  auth::{AuthConfig, Claims, issue_token},
};
use bump_core::SharingService;
use bump_store_sqlite::SqliteStore;
use chrono::{Duration, Utc};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Bump pregnancy-sharing API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print a bearer token for this user id and exit.
  #[arg(long, value_name = "USER_ID")]
  issue_token: Option<String>,

  /// Email claim for `--issue-token`.
  #[arg(long, requires = "issue_token")]
  email: Option<String>,

  /// Lifetime of the issued token, in hours.
  #[arg(long, default_value_t = 24, requires = "issue_token")]
  token_hours: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(
      config::Environment::with_prefix("BUMP")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("privileged_emails")
        .with_list_parse_key("cors_origins"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let auth = AuthConfig::from_base64(&server_cfg.token_key)
    .context("token_key is not valid base64")?;

  // Helper mode: mint a token and exit.
  if let Some(uid) = cli.issue_token {
    let claims = Claims {
      uid,
      exp: Some((Utc::now() + Duration::hours(cli.token_hours)).timestamp()),
      email: cli.email,
    };
    let token = issue_token(&auth, &claims).context("failed to sign token")?;
    println!("{token}");
    return Ok(());
  }

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let hasher = server_cfg
    .code_hasher()
    .context("invalid argon2 cost parameters")?;
  let policy = server_cfg.policy();

  // Build application state.
  let state = AppState {
    service: Arc::new(
      SharingService::new(Arc::new(store))
        .with_hasher(hasher)
        .with_policy(policy),
    ),
    auth:    Arc::new(auth),
  };

  let app = bump_api::router(state).layer(server_cfg.cors());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  tracing::info!("Server stopped");
  Ok(())
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for Ctrl-C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => {},
    () = terminate => {},
  }
  tracing::info!("Shutting down, draining in-flight requests");
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
