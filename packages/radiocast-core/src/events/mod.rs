//! Event system for real-time client communication.
//!
//! This module provides:
//! - [`EventEmitter`] trait for domain services to emit events
//! - [`BroadcastEventBridge`] for WebSocket transport
//! - Event types for playback, visible status and devices

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

use crate::lifecycle::StatusSnapshot;
use crate::renderer::RendererDevice;
use crate::services::session::PlaybackState;

/// Events broadcast to clients.
///
/// This enum categorizes all real-time events that can be sent to connected
/// clients. Each category has its own inner event type with specific variants.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Session state and stream metadata.
    Playback(PlaybackEvent),

    /// Visible status changes driven by the lifecycle synchronizer.
    Status(StatusEvent),

    /// Rendering devices appearing and disappearing.
    Device(DeviceEvent),
}

/// Events related to the live playback session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackEvent {
    /// The authoritative playback state changed.
    #[serde(rename_all = "camelCase")]
    StateChanged {
        state: PlaybackState,
        /// Whether the session targets a rendering device.
        is_remote: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_id: Option<String>,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Display metadata of the session changed.
    #[serde(rename_all = "camelCase")]
    MetadataChanged {
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rate_text: Option<String>,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A new line was added to the playlist history.
    PlaylistEntryAdded {
        text: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Events related to the visible status display.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StatusEvent {
    /// Status shown or refreshed.
    Updated {
        status: StatusSnapshot,
        /// Whether the process is in foreground mode.
        foreground: bool,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Status removed.
    Cleared {
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Events related to rendering device visibility.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceEvent {
    /// A device became visible or was updated.
    Added {
        device: RendererDevice,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A device is no longer visible.
    #[serde(rename_all = "camelCase")]
    Removed {
        device_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

impl From<PlaybackEvent> for BroadcastEvent {
    fn from(event: PlaybackEvent) -> Self {
        BroadcastEvent::Playback(event)
    }
}

impl From<StatusEvent> for BroadcastEvent {
    fn from(event: StatusEvent) -> Self {
        BroadcastEvent::Status(event)
    }
}

impl From<DeviceEvent> for BroadcastEvent {
    fn from(event: DeviceEvent) -> Self {
        BroadcastEvent::Device(event)
    }
}
