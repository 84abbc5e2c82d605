//! CodeCrafter · Coding Practice Backend
//!
//! - Axum HTTP + WebSocket API over per-learner challenge sessions
//! - OpenAI integration for questions, grading, hints and solutions
//! - Static SPA fallback (STATIC_DIR/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   OPENAI_API_KEY      : enables OpenAI integration if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL   : default "gpt-4o-mini" (hints, topic suggestions)
//!   OPENAI_STRONG_MODEL : default "gpt-4o" (questions, grading, solutions)
//!   OPENAI_TIMEOUT_SECS : per-request timeout, default 30
//!   AGENT_CONFIG_PATH   : path to TOML prompt overrides
//!   STATIC_DIR          : frontend bundle directory (default "./static")
//!   SESSION_IDLE_TTL_SECS : drop sessions untouched this long (default 1800)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod providers;
mod session;
mod state;
mod protocol;
mod logic;
mod openai;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::{session_ttl_from_env, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Provider + empty session registry.
  let state = Arc::new(AppState::new());

  // Abandoned HTTP sessions would otherwise live forever.
  let ttl = session_ttl_from_env();
  info!(target: "codecrafter", ttl_secs = ttl.as_secs(), "Idle session sweep enabled");
  tokio::spawn(state.clone().run_idle_sweep(ttl));

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "codecrafter", %addr, provider = state.provider.name(), "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "codecrafter", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "codecrafter", error = %e, "Failed to listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
  info!(target: "codecrafter", "Shutdown requested");
}
