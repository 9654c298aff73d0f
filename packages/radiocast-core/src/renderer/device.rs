//! Rendering devices and the registry of currently visible ones.
//!
//! Discovery transport (SSDP, description fetching) lives outside this crate.
//! Whatever finds devices feeds them into a [`DeviceRegistry`]; the playback
//! coordinator only ever reads through the [`DeviceDiscovery`] trait.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::services::UpnpService;
use crate::protocol_constants::DEVICE_CHANNEL_CAPACITY;

/// Absolute control URLs of the renderer services we drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlUrls {
    pub av_transport: String,
    pub rendering_control: String,
    pub connection_manager: String,
}

impl ControlUrls {
    /// Builds control URLs from a base URL using the conventional paths.
    #[must_use]
    pub fn from_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            av_transport: format!("{}{}", base, UpnpService::AVTransport.default_control_path()),
            rendering_control: format!(
                "{}{}",
                base,
                UpnpService::RenderingControl.default_control_path()
            ),
            connection_manager: format!(
                "{}{}",
                base,
                UpnpService::ConnectionManager.default_control_path()
            ),
        }
    }
}

/// A network-discovered UPnP MediaRenderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererDevice {
    /// Stable device identity (the UPnP UDN, e.g. `uuid:...`).
    pub id: String,
    /// User-visible friendly name.
    pub name: String,
    /// Service control endpoints.
    pub control_urls: ControlUrls,
}

impl RendererDevice {
    /// Creates a device whose services live at the conventional paths under `base_url`.
    pub fn with_base_url(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: &str,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            control_urls: ControlUrls::from_base_url(base_url),
        }
    }

    /// Returns the control URL for a service.
    #[must_use]
    pub fn control_url(&self, service: UpnpService) -> &str {
        match service {
            UpnpService::AVTransport => &self.control_urls.av_transport,
            UpnpService::RenderingControl => &self.control_urls.rendering_control,
            UpnpService::ConnectionManager => &self.control_urls.connection_manager,
        }
    }
}

/// Change notification published by the registry.
#[derive(Debug, Clone)]
pub enum DeviceChange {
    /// A device became visible (or its description changed).
    Added(RendererDevice),
    /// A device is no longer visible.
    Removed(String),
}

/// Read-only view of visible rendering devices.
///
/// Used by the playback coordinator to resolve a session's target device.
pub trait DeviceDiscovery: Send + Sync {
    /// Looks up a currently visible device by identity.
    fn resolve_device(&self, device_id: &str) -> Option<RendererDevice>;

    /// Returns all currently visible devices.
    fn devices(&self) -> Vec<RendererDevice>;
}

/// Live set of visible rendering devices.
pub struct DeviceRegistry {
    devices: DashMap<String, RendererDevice>,
    changes: broadcast::Sender<DeviceChange>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(DEVICE_CHANNEL_CAPACITY);
        Self {
            devices: DashMap::new(),
            changes,
        }
    }

    /// Creates a registry seeded with statically configured devices.
    pub fn with_devices(devices: impl IntoIterator<Item = RendererDevice>) -> Self {
        let registry = Self::new();
        for device in devices {
            registry.devices.insert(device.id.clone(), device);
        }
        registry
    }

    /// Adds or replaces a device. Returns `true` if it was not known before.
    pub fn register(&self, device: RendererDevice) -> bool {
        let is_new = self
            .devices
            .insert(device.id.clone(), device.clone())
            .is_none();
        log::info!(
            "[Registry] {} device {} ({})",
            if is_new { "Added" } else { "Updated" },
            device.name,
            device.id
        );
        // No receivers is fine: nobody is watching yet
        let _ = self.changes.send(DeviceChange::Added(device));
        is_new
    }

    /// Removes a device, notifying watchers if it was present.
    pub fn remove(&self, device_id: &str) -> Option<RendererDevice> {
        let removed = self.devices.remove(device_id).map(|(_, d)| d);
        if removed.is_some() {
            log::info!("[Registry] Removed device {}", device_id);
            let _ = self.changes.send(DeviceChange::Removed(device_id.to_string()));
        }
        removed
    }

    /// Subscribes to device changes.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceChange> {
        self.changes.subscribe()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDiscovery for DeviceRegistry {
    fn resolve_device(&self, device_id: &str) -> Option<RendererDevice> {
        self.devices.get(device_id).map(|r| r.value().clone())
    }

    fn devices(&self) -> Vec<RendererDevice> {
        let mut devices: Vec<_> = self.devices.iter().map(|r| r.value().clone()).collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }
}
