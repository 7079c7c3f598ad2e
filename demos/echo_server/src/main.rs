//! Echo Server Example
//!
//! Hosts a Tether service that echoes whatever it receives.
//!
//! # Modes
//!
//! - `request` (default): JSON envelopes `{"action": ..., "body": ...}`
//!   routed to the `echo`, `ping` and `whoami` endpoints.
//! - `adapter`: every frame is handed over as raw bytes and answered with
//!   the same bytes prefixed by `ACK:`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-server -- --addr 127.0.0.1:8080 --allow-non-browser
//! cargo run --package echo-server -- --mode adapter
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde_json::json;
use tether::prelude::*;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Route JSON envelopes by action name.
    Request,
    /// Answer raw frames through a single adapter.
    Adapter,
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to tether.toml in the search paths)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile
    #[arg(long)]
    profile: Option<String>,

    /// Address to bind, overriding the configuration
    #[arg(long)]
    addr: Option<String>,

    /// WebSocket endpoint path, overriding the configuration
    #[arg(long)]
    path: Option<String>,

    /// Accept clients that send no Origin header
    #[arg(long)]
    allow_non_browser: bool,

    /// Dispatch mode
    #[arg(long, value_enum, default_value_t = Mode::Request)]
    mode: Mode,
}

impl Cli {
    fn load_config(&self) -> Result<TetherConfig> {
        let mut loader = ConfigLoader::new();
        if let Some(profile) = &self.profile {
            loader = loader.profile(profile);
        }
        if let Some(path) = &self.config {
            loader = loader.file(path);
        }

        let mut config = loader.load()?;
        if let Some(addr) = &self.addr {
            config.server.addr.clone_from(addr);
        }
        if let Some(path) = &self.path {
            config.server.path.clone_from(path);
        }
        config.server.allow_non_browser |= self.allow_non_browser;

        tether::runtime::config::validate_config(&config)?;
        Ok(config)
    }
}

// ============================================================================
// Request mode
// ============================================================================

fn request_service(allow_non_browser: bool) -> Result<Service> {
    let mut service = Service::new(allow_non_browser);

    service.register_endpoint("echo", |conn, body| {
        Box::pin(async move {
            if let Err(e) = conn.send_value(&body).await {
                warn!(error = %e, "Failed to send echo reply");
            }
        })
    })?;

    service.register_endpoint("ping", |conn, _body| {
        Box::pin(async move {
            if let Err(e) = conn.send_value(&json!("pong")).await {
                warn!(error = %e, "Failed to send ping reply");
            }
        })
    })?;

    service.register_endpoint("whoami", |conn, _body| {
        Box::pin(async move {
            let reply = json!({
                "identifier": conn.identifier(),
                "origin": conn.original_request().origin,
                "remote_addr": conn.remote_addr().map(|a| a.to_string()),
            });
            if let Err(e) = conn.send_value(&reply).await {
                warn!(error = %e, "Failed to send whoami reply");
            }
        })
    })?;

    Ok(service)
}

// ============================================================================
// Adapter mode
// ============================================================================

fn adapter_service(allow_non_browser: bool) -> Service {
    Service::adapter(
        |conn, data| {
            Box::pin(async move {
                let mut reply = b"ACK:".to_vec();
                reply.extend_from_slice(&data);
                if let Err(e) = conn.send(reply).await {
                    warn!(error = %e, "Failed to send adapter reply");
                }
            })
        },
        allow_non_browser,
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_from_config(&config.logging);

    let allow_non_browser = config.server.allow_non_browser;
    let service = match cli.mode {
        Mode::Request => request_service(allow_non_browser)?,
        Mode::Adapter => adapter_service(allow_non_browser),
    };
    info!(mode = ?cli.mode, actions = ?service.actions(), "Echo service ready");

    TetherServer::new(config.server, service).run().await?;

    Ok(())
}
