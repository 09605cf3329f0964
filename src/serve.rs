// src/serve.rs

//! Minimal static file server for watch mode.
//!
//! Serves the configured directory on localhost so a browser can load the
//! built output; refresh notifications come separately over the reload bus.

use std::net::SocketAddr;

use axum::Router;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::model::ServeConfig;

/// Serve `cfg.dir` on localhost; returns the detached server task.
pub fn spawn(cfg: &ServeConfig) -> JoinHandle<anyhow::Result<()>> {
    let dir = cfg.dir.clone();
    let port = cfg.port;

    tokio::spawn(async move {
        let address = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(address).await?;
        info!(port, dir = %dir, "static server listening");

        let router = Router::new().fallback_service(ServeDir::new(&dir));
        axum::serve(listener, router).await?;

        Ok(())
    })
}
