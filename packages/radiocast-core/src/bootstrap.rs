//! Application bootstrap and dependency wiring.
//!
//! This module is the composition root: the one place where the radio
//! library, device registry, transports, player context and coordinator are
//! instantiated and wired together.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::error::{CastError, CastResult};
use crate::events::{BroadcastEventBridge, DeviceEvent, EventEmitter, LoggingEventEmitter};
use crate::library::InMemoryRadioLibrary;
use crate::lifecycle::ServerHost;
use crate::protocol_constants::SOAP_TIMEOUT_SECS;
use crate::renderer::{DeviceChange, DeviceDiscovery, DeviceRegistry, SoapTransport};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::services::{
    CoordinatorDeps, CoordinatorHandle, PlaybackCoordinator, PlayerContext, TransportDispatcher,
};
use crate::state::Config;
use crate::stream::{AudioSink, HttpStreamConnector, NullSink};
use crate::utils::now_millis;

/// Container for all bootstrapped services.
///
/// Consumed by `AppState` to build the HTTP layer.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Handle to the playback coordinator task.
    pub coordinator: CoordinatorHandle,
    /// Radios offered for playback.
    pub library: Arc<InMemoryRadioLibrary>,
    /// Visible rendering devices.
    pub devices: Arc<DeviceRegistry>,
    /// Event bridge feeding WebSocket clients and optional external consumers.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Keeps the latest visible status for queries.
    pub host: Arc<ServerHost>,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Stops playback, drops queued renderer actions and cancels background tasks.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        if let Err(e) = self.coordinator.shutdown().await {
            log::warn!("[Bootstrap] Coordinator shutdown failed: {}", e);
        }
        self.cancel_token.cancel();

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Client for renderer SOAP calls: every request is bounded.
fn create_soap_client() -> CastResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
        .build()
        .map_err(|e| CastError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Client for radio streams: only the connection is bounded.
fn create_stream_client(connect_timeout_secs: u64) -> CastResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .build()
        .map_err(|e| CastError::Internal(format!("Failed to create stream client: {}", e)))
}

/// Bootstraps all services and starts the coordinator task.
///
/// Must be called from within a Tokio runtime. Services are created in
/// dependency order:
///
/// 1. Shared infrastructure (HTTP clients, event bridge, cancellation token)
/// 2. Collaborators (radio library, device registry, process host)
/// 3. Renderer action dispatcher (depends on the SOAP client)
/// 4. Coordinator (depends on all of the above), then its task
/// 5. Device watcher (forwards registry changes to events and the coordinator)
///
/// # Errors
///
/// Returns an error if the configuration is invalid or an HTTP client cannot
/// be created.
pub fn bootstrap_services(config: &Config) -> CastResult<BootstrappedServices> {
    config.validate()?;

    let spawner = TokioSpawner::current();
    let cancel_token = CancellationToken::new();
    let soap_client = create_soap_client()?;
    let stream_client = create_stream_client(config.stream_connect_timeout_secs)?;
    let event_bridge = Arc::new(BroadcastEventBridge::new(config.event_channel_capacity));
    event_bridge.set_external_emitter(Arc::new(LoggingEventEmitter));

    let library = Arc::new(InMemoryRadioLibrary::new(config.radios.iter().cloned()));
    let devices = Arc::new(DeviceRegistry::with_devices(config.renderers.iter().cloned()));
    let host = Arc::new(ServerHost::new());

    let dispatcher = Arc::new(TransportDispatcher::new(
        Arc::new(SoapTransport::new(soap_client)),
        spawner.clone(),
    ));
    let players = PlayerContext {
        connector: Arc::new(HttpStreamConnector::new(stream_client)),
        sink: Arc::new(NullSink::default()) as Arc<dyn AudioSink>,
        spawner: spawner.clone(),
        volume_step: config.volume_step,
    };

    let (coordinator, rx) = PlaybackCoordinator::new(CoordinatorDeps {
        library: Arc::clone(&library) as _,
        devices: Arc::clone(&devices) as _,
        dispatcher,
        players,
        host: Arc::clone(&host) as _,
        emitter: Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
        playlist_capacity: config.playlist_capacity,
    });
    let handle = coordinator.handle();
    spawner.spawn(coordinator.run(rx, cancel_token.clone()));

    spawn_device_watcher(
        &spawner,
        cancel_token.clone(),
        Arc::clone(&devices),
        Arc::clone(&event_bridge),
        handle.clone(),
    );

    log::info!(
        "[Bootstrap] {} radio(s), {} configured renderer(s)",
        config.radios.len(),
        config.renderers.len()
    );

    Ok(BootstrappedServices {
        coordinator: handle,
        library,
        devices,
        event_bridge,
        host,
        spawner,
        cancel_token,
    })
}

/// Publishes registry changes and reports removed devices to the coordinator.
fn spawn_device_watcher(
    spawner: &TokioSpawner,
    cancel: CancellationToken,
    devices: Arc<DeviceRegistry>,
    emitter: Arc<BroadcastEventBridge>,
    coordinator: CoordinatorHandle,
) {
    let mut changes = devices.subscribe();
    spawner.spawn_until(cancel, async move {
        loop {
            match changes.recv().await {
                Ok(DeviceChange::Added(device)) => {
                    emitter.emit_device(DeviceEvent::Added {
                        device,
                        timestamp: now_millis(),
                    });
                }
                Ok(DeviceChange::Removed(device_id)) => {
                    if coordinator.device_lost(device_id.clone()).is_err() {
                        log::debug!("[Bootstrap] Coordinator gone, stopping device watcher");
                        break;
                    }
                    emitter.emit_device(DeviceEvent::Removed {
                        device_id,
                        timestamp: now_millis(),
                    });
                }
                Err(RecvError::Lagged(n)) => {
                    log::warn!("[Bootstrap] Device watcher lagged by {} change(s)", n);
                    // A missed removal may have been the session's renderer
                    let Ok(snapshot) = coordinator.snapshot().await else {
                        break;
                    };
                    let target = snapshot.device_id.as_deref();
                    let Some(device_id) = vanished_target(devices.as_ref(), target) else {
                        continue;
                    };
                    log::info!("[Bootstrap] Renderer {} vanished while lagging", device_id);
                    if coordinator.device_lost(device_id.clone()).is_err() {
                        break;
                    }
                    emitter.emit_device(DeviceEvent::Removed {
                        device_id,
                        timestamp: now_millis(),
                    });
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// The session's renderer, if discovery no longer resolves it.
fn vanished_target(devices: &dyn DeviceDiscovery, target: Option<&str>) -> Option<String> {
    let device_id = target?;
    devices
        .resolve_device(device_id)
        .is_none()
        .then(|| device_id.to_string())
}
