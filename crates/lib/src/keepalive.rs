//! Keep-alive HTTP server: answers every request with a fixed "alive" text so the
//! hosting platform sees traffic and keeps the process running.

use anyhow::{Context, Result};
use axum::{http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use tokio::task::JoinHandle;

pub const ALIVE_BODY: &str = "Bot is alive, bhai!";

async fn alive() -> (StatusCode, &'static str) {
    (StatusCode::OK, ALIVE_BODY)
}

/// `GET /` plus a fallback, so any path or method gets the same answer.
pub fn router() -> Router {
    Router::new().route("/", get(alive)).fallback(alive)
}

/// Bind `bind:port` and serve the keep-alive router in a background task.
/// Binding happens before returning, so an unusable port is reported to the caller.
/// Port 0 picks a free port; the returned address has the real one.
pub async fn spawn(bind: &str, port: u16) -> Result<(SocketAddr, JoinHandle<()>)> {
    let bind_addr = format!("{}:{}", bind.trim(), port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding keep-alive server to {}", bind_addr))?;
    let local = listener
        .local_addr()
        .context("reading keep-alive listener address")?;
    log::info!("keep-alive server listening on {}", local);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router()).await {
            log::error!("keep-alive server exited: {}", e);
        }
    });
    Ok((local, handle))
}
