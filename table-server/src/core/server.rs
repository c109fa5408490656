//! Server Implementation
//!
//! HTTP 服务器启动、后台任务和优雅停机

use std::net::SocketAddr;

use axum_server::Handle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::{Config, ServerState};
use crate::sessions::spawn_expiry_sweeper;
use crate::utils::{AppError, AppResult};

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state (for tests)
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    pub async fn run(&self) -> AppResult<()> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(self.config.clone()).await?,
        };

        // 后台过期清扫，随服务器一起停机
        let shutdown = CancellationToken::new();
        let sweeper = spawn_expiry_sweeper(
            state.session_manager(),
            state.config.sweep_interval_secs,
            shutdown.clone(),
        );

        let app = crate::api::create_router(state.clone());
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        info!("🍽️  Table server starting on {}", addr);

        let handle = Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
            signal_handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        });

        axum_server::bind(addr)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .map_err(|e| AppError::internal(format!("HTTP server failed: {}", e)))?;

        shutdown.cancel();
        let _ = sweeper.await;
        info!("Table server stopped");
        Ok(())
    }
}
