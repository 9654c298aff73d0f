//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to the coordinator and
//! the registries. It provides the router construction and server startup.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::BootstrappedServices;
use crate::events::BroadcastEventBridge;
use crate::library::InMemoryRadioLibrary;
use crate::lifecycle::ServerHost;
use crate::renderer::DeviceRegistry;
use crate::services::CoordinatorHandle;

pub mod http;
pub mod response;
pub mod ws;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Port range tried when no port is configured.
const AUTO_PORT_RANGE: (u16, u16) = (49500, 49510);

/// Shared application state for the API layer.
///
/// A thin wrapper holding references to services; all business logic lives
/// in the services themselves.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the playback coordinator task.
    pub coordinator: CoordinatorHandle,
    /// Radios offered for playback.
    pub library: Arc<InMemoryRadioLibrary>,
    /// Visible rendering devices.
    pub devices: Arc<DeviceRegistry>,
    /// Source of events for WebSocket clients.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Latest visible status.
    pub host: Arc<ServerHost>,
    /// Fires when the server should stop accepting connections.
    pub shutdown: CancellationToken,
    preferred_port: u16,
    port: Arc<AtomicU16>,
}

impl AppState {
    /// Builds the API state from bootstrapped services.
    pub fn new(services: &BootstrappedServices, preferred_port: u16) -> Self {
        Self {
            coordinator: services.coordinator.clone(),
            library: Arc::clone(&services.library),
            devices: Arc::clone(&services.devices),
            event_bridge: Arc::clone(&services.event_bridge),
            host: Arc::clone(&services.host),
            shutdown: services.cancel_token.clone(),
            preferred_port,
            port: Arc::new(AtomicU16::new(0)),
        }
    }

    /// Port the server is listening on, `0` before it is bound.
    pub fn port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }
}

async fn find_available_port(
    start: u16,
    end: u16,
) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    for port in start..=end {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Starts the HTTP server and runs it until `state.shutdown` fires.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let (port, listener) = if state.preferred_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], state.preferred_port));
        (state.preferred_port, tokio::net::TcpListener::bind(&addr).await?)
    } else {
        find_available_port(AUTO_PORT_RANGE.0, AUTO_PORT_RANGE.1).await?
    };
    state.port.store(port, Ordering::SeqCst);

    log::info!("[Server] Listening on http://0.0.0.0:{}", port);
    let shutdown = state.shutdown.clone();
    let app = http::create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    log::info!("[Server] Stopped");
    Ok(())
}
