//! Server orchestration: binds the configured address, serves one
//! [`Service`] and waits for a shutdown signal.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tether_runtime::{TetherServer, config::load_config};
//!
//! let config = load_config()?;
//! let mut service = Service::new(config.server.allow_non_browser);
//! service.register_endpoint("echo", |conn, body| {
//!     Box::pin(async move {
//!         let _ = conn.send_value(&body).await;
//!     })
//! })?;
//!
//! TetherServer::new(config.server, service).run().await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use tether_core::{Envelope, Request, Service};
use tether_transport::{ListenerHandle, listen};
use tokio::signal;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::RuntimeResult;

/// Hosts a [`Service`] on the address and path from a [`ServerConfig`].
pub struct TetherServer<R: Request = Envelope> {
    config: ServerConfig,
    service: Arc<Service<R>>,
}

impl<R: Request> TetherServer<R> {
    /// Creates a server, applying the configured codec override.
    pub fn new(config: ServerConfig, service: Service<R>) -> Self {
        config.apply_codec(&service);
        Self {
            config,
            service: Arc::new(service),
        }
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The hosted service.
    pub fn service(&self) -> &Arc<Service<R>> {
        &self.service
    }

    /// Binds the listener and returns without waiting.
    pub async fn start(&self) -> RuntimeResult<ListenerHandle> {
        let handle = listen(&self.config.addr, &self.config.path, self.service.clone()).await?;
        let mode = if self.service.is_adapter() {
            "adapter"
        } else {
            "request"
        };

        info!(
            addr = %handle.local_addr(),
            path = %self.config.path,
            mode,
            codec = %self.service.default_codec().marshal_name(),
            "Tether server started"
        );

        Ok(handle)
    }

    /// Runs the server until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        let handle = self.start().await?;

        info!("Tether server is now running. Press Ctrl+C to stop.");

        let result = wait_for_shutdown().await;
        handle.stop();
        info!("Tether server stopped");

        result
    }

    /// Runs the server until `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let handle = self.start().await?;

        shutdown.await;

        handle.stop();
        info!("Tether server stopped");

        Ok(())
    }
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}
