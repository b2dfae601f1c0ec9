//! Quizbank · document-to-quiz question bank backend
//!
//! - Axum HTTP API: open a session per uploaded document, build question pools
//!   through a hosted language model, draw tests with or without repeats,
//!   grade answers with model-written explanations
//! - Optional OpenAI-compatible integration (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                     : u16 (default 8000)
//!   OPENAI_API_KEY           : enables question generation if present
//!   OPENAI_BASE_URL          : default "https://api.openai.com/v1"
//!   OPENAI_MODEL             : default "gpt-4o-mini"
//!   GENERATION_TIMEOUT_SECS  : per-call generation deadline (default 120)
//!   MAX_SESSIONS             : open document sessions allowed at once (default 500)
//!   SESSION_IDLE_SECS        : drop sessions unused for this long (default 3600)
//!   QUIZBANK_CONFIG_PATH     : path to TOML config (prompts + generation settings)
//!   LOG_LEVEL                : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT               : "pretty" (default) or "json"

mod bank;
mod config;
mod domain;
mod error;
mod format;
mod generator;
mod grade;
mod openai;
mod protocol;
mod routes;
mod state;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (document sessions, generator, config).
  let state = Arc::new(AppState::from_env());

  let _sweeper = state.spawn_sweeper();
  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quizbank", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "quizbank", sessions = state.session_count().await, "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "quizbank", error = %e, "Failed to listen for shutdown signal");
  }
}
