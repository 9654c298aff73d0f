//! UPnP MediaRenderer service definitions.
//!
//! This module provides a single source of truth for the service URNs and
//! default control paths used by renderer SOAP commands.

use serde::Serialize;

/// UPnP services a MediaRenderer exposes for remote control.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpnpService {
    /// Audio/Video transport control (set URI, play, stop).
    AVTransport,
    /// Per-renderer volume and mute control.
    RenderingControl,
    /// Connection and protocol capability information.
    ConnectionManager,
}

impl UpnpService {
    /// Returns the UPnP service URN for SOAP requests.
    #[must_use]
    pub fn urn(&self) -> &'static str {
        match self {
            Self::AVTransport => "urn:schemas-upnp-org:service:AVTransport:1",
            Self::RenderingControl => "urn:schemas-upnp-org:service:RenderingControl:1",
            Self::ConnectionManager => "urn:schemas-upnp-org:service:ConnectionManager:1",
        }
    }

    /// Returns the conventional control path, used when a device is declared
    /// by base URL only.
    ///
    /// Real renderers advertise their own paths in the device description;
    /// these defaults match the common DLNA reference layout.
    #[must_use]
    pub fn default_control_path(&self) -> &'static str {
        match self {
            Self::AVTransport => "/AVTransport/control",
            Self::RenderingControl => "/RenderingControl/control",
            Self::ConnectionManager => "/ConnectionManager/control",
        }
    }

    /// Returns a human-readable name for this service.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AVTransport => "AVTransport",
            Self::RenderingControl => "RenderingControl",
            Self::ConnectionManager => "ConnectionManager",
        }
    }
}
