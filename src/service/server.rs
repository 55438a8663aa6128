//! Directory server wiring and lifecycle
//!
//! Assembles the directory, the router, and the listener, and runs until a
//! shutdown signal arrives. In-flight requests drain before the process
//! exits, which matters for ingest: an interrupted update would otherwise
//! rely on the next ingest of the same host to converge the index.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::directory::ResourceDirectory;
use crate::error::Result;

use super::api::{create_router, AppState};

/// Errors from server startup and shutdown
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// The assembled directory service.
pub struct DirectoryServer {
    config: Config,
    state: AppState,
}

impl DirectoryServer {
    /// Open the directory under the configured data dir and assemble the
    /// shared state.
    pub fn new(config: Config) -> Result<Self> {
        let directory = ResourceDirectory::open(&config.storage.data_dir)?;
        let state = AppState {
            directory: Arc::new(directory),
            start_time: Instant::now(),
        };
        Ok(Self { config, state })
    }

    /// Shared state, for driving the router without a listener in tests.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes and layers configured.
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone(), self.config.server.max_body_bytes);
        if self.config.server.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }
        router
    }

    /// Serve until SIGINT or SIGTERM.
    pub async fn start(&self) -> std::result::Result<(), ServeError> {
        let router = self.build_router();
        let addr = self.config.server.bind_address;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServeError::Bind { addr, source: e })?;

        tracing::info!(
            %addr,
            data_dir = %self.config.storage.data_dir.display(),
            "directory service listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(ServeError::Serve)?;

        tracing::info!("directory service stopped");
        Ok(())
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        // a failed handler install must park this arm, not resolve it
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
