//! Core configuration types.
//!
//! [`Config`] is deserialized by the server from its YAML file and handed to
//! [`bootstrap_services`](crate::bootstrap::bootstrap_services).

use serde::{Deserialize, Serialize};

use crate::error::{CastError, CastResult};
use crate::library::Radio;
use crate::protocol_constants::EVENT_CHANNEL_CAPACITY;
use crate::renderer::RendererDevice;

/// Configuration for the radiocast service.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    // Server
    /// Preferred port for the HTTP/WS server (0 = auto-allocate).
    pub preferred_port: u16,

    // Playback
    /// Volume change per raise/lower command (percent points).
    pub volume_step: u8,

    /// Maximum number of entries kept in the playlist history.
    pub playlist_capacity: usize,

    /// Connect timeout for local radio streams (seconds).
    ///
    /// Only the connection is bounded; an open stream is read indefinitely.
    pub stream_connect_timeout_secs: u64,

    // Events
    /// Capacity of the event broadcast channel.
    pub event_channel_capacity: usize,

    // Catalog
    /// Radios offered by the library, in display order.
    pub radios: Vec<Radio>,

    /// Rendering devices known ahead of time.
    pub renderers: Vec<RendererDevice>,
}

impl Config {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`CastError::Configuration`] for values that would make the
    /// service misbehave at runtime.
    pub fn validate(&self) -> CastResult<()> {
        if self.volume_step == 0 || self.volume_step > 100 {
            return Err(CastError::Configuration(
                "volume_step must be between 1 and 100".into(),
            ));
        }
        if self.playlist_capacity == 0 {
            return Err(CastError::Configuration(
                "playlist_capacity must be >= 1".into(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(CastError::Configuration(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".into(),
            ));
        }
        if let Some(radio) = self.radios.iter().find(|r| r.url.trim().is_empty()) {
            return Err(CastError::Configuration(format!(
                "radio {} has no stream URL",
                radio.id
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 0,
            volume_step: 5,
            playlist_capacity: 50,
            stream_connect_timeout_secs: 10,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
            radios: Vec::new(),
            renderers: Vec::new(),
        }
    }
}
