//! HTTP boundary: routes, request extraction and status-code mapping.

use std::sync::Arc;

use domain::Gateway;
use log::*;
use service::config::Config;
use tokio::net::TcpListener;

mod controller;
mod error;
mod router;

pub use error::{Error, Result};

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<Gateway>,
}

impl AppState {
    pub fn new(config: Config, gateway: Gateway) -> Self {
        Self {
            config,
            gateway: Arc::new(gateway),
        }
    }

    /// Build the login gateway described by `config`.
    pub fn from_config(config: Config) -> core::result::Result<Self, domain::error::Error> {
        let gateway = Gateway::from_config(&config)?;
        Ok(Self::new(config, gateway))
    }
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let host = app_state.config.interface().to_string();
    let port = app_state.config.port;
    let server_url = format!("{host}:{port}");

    let listener = TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    axum::serve(listener, router::define_routes(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {err}");
        return;
    }
    info!("Shutdown signal received, draining connections");
}
