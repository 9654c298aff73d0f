//! Playback session model.
//!
//! A [`Session`] exists per playback attempt and is identified by a freshly
//! minted [`SessionToken`]. Every asynchronous report carries the token it
//! was issued with; only reports bearing the live token are applied.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::now_millis;

/// Opaque identifier of one playback attempt.
///
/// Tokens are only minted by the coordinator and compare by equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(Arc<str>);

impl SessionToken {
    pub(crate) fn mint() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    /// String form, for logging and API responses.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authoritative lifecycle state of the current session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackState {
    #[default]
    None,
    /// Connecting to the stream or the renderer.
    Preparing,
    Buffering,
    Playing,
    /// Local output only; renderers have no pause.
    Paused,
    Stopped,
    Error,
}

impl PlaybackState {
    /// States in which media is (or is about to be) active.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Preparing | Self::Buffering | Self::Playing | Self::Paused
        )
    }

    /// States that end a session normally.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::None | Self::Stopped)
    }
}

/// Metadata reported by a player adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    /// Free text from the stream (usually "artist - title").
    pub information: Option<String>,
    /// Stream bitrate in kbit/s.
    pub rate_kbps: Option<u32>,
}

/// Last known display metadata of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// Radio display name.
    pub title: String,
    /// Current stream information.
    pub subtitle: Option<String>,
    pub rate_kbps: Option<u32>,
    /// Artwork reference.
    pub artwork: Option<String>,
}

impl SessionMetadata {
    /// Human-readable rate, e.g. `128 kbit/s`.
    #[must_use]
    pub fn rate_text(&self) -> Option<String> {
        self.rate_kbps.map(|r| format!("{} kbit/s", r))
    }

    /// Applies an update. Returns `true` if anything changed.
    pub fn apply(&mut self, update: &MetadataUpdate) -> bool {
        let mut changed = false;
        let info = update.information.as_deref().map(str::trim).filter(|s| !s.is_empty());
        if let Some(info) = info {
            if self.subtitle.as_deref() != Some(info) {
                self.subtitle = Some(info.to_string());
                changed = true;
            }
        }
        if update.rate_kbps.is_some() && update.rate_kbps != self.rate_kbps {
            self.rate_kbps = update.rate_kbps;
            changed = true;
        }
        changed
    }
}

/// The single live playback attempt.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub media_id: String,
    /// Target renderer; `None` for local output.
    pub device_id: Option<String>,
    pub state: PlaybackState,
    pub metadata: SessionMetadata,
}

impl Session {
    pub(crate) fn new(media_id: String, device_id: Option<String>, metadata: SessionMetadata) -> Self {
        Self {
            token: SessionToken::mint(),
            media_id,
            device_id,
            state: PlaybackState::Preparing,
            metadata,
        }
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.device_id.is_some()
    }
}

/// One line of stream information heard during the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub text: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

/// Bounded history of stream information, oldest first.
#[derive(Debug)]
pub struct PlaylistHistory {
    entries: VecDeque<PlaylistEntry>,
    capacity: usize,
}

impl PlaylistHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
        }
    }

    /// Appends `text` unless it is blank or repeats the previous entry.
    ///
    /// Radio streams resend the same tag periodically; only changes count.
    pub fn push(&mut self, text: &str) -> Option<&PlaylistEntry> {
        let text = text.trim();
        if text.is_empty() || self.entries.back().is_some_and(|last| last.text == text) {
            return None;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(PlaylistEntry {
            text: text.to_string(),
            timestamp: now_millis(),
        });
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> Vec<PlaylistEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
