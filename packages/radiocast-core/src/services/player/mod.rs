//! Player adapters: where a session's audio actually plays.
//!
//! [`PlayerAdapter`] is a closed set of variants sharing one capability
//! contract. Adapters never return errors to the coordinator; every outcome
//! is a state or metadata report sent through their [`Reporter`].

mod local;
mod remote;

pub use local::LocalPlayer;
pub use remote::RemotePlayer;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::action_queue::ActionQueue;
use super::coordinator::Command;
use super::session::{MetadataUpdate, PlaybackState, SessionToken};
use crate::error::SoapResult;
use crate::renderer::{ActionKind, ActionResponse};
use crate::runtime::TokioSpawner;
use crate::stream::{AudioSink, StreamConnector};

/// Relative volume change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeDirection {
    Raise,
    Lower,
}

impl VolumeDirection {
    /// Applies one step to `level`, clamped to 0-100.
    #[must_use]
    pub fn apply(self, level: u8, step: u8) -> u8 {
        match self {
            Self::Raise => level.saturating_add(step).min(100),
            Self::Lower => level.saturating_sub(step),
        }
    }
}

/// Sends token-tagged reports back to the coordinator.
#[derive(Clone)]
pub struct Reporter {
    token: SessionToken,
    tx: mpsc::UnboundedSender<Command>,
}

impl Reporter {
    pub(crate) fn new(token: SessionToken, tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { token, tx }
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn state(&self, state: PlaybackState) {
        self.send(Command::ReportState {
            token: self.token.clone(),
            state,
        });
    }

    pub fn metadata(&self, update: MetadataUpdate) {
        self.send(Command::ReportMetadata {
            token: self.token.clone(),
            update,
        });
    }

    /// Content type a stream announced for `media_id`. Not tied to the
    /// session, so it is never dropped as stale.
    pub fn content_type(&self, media_id: &str, content_type: String) {
        self.send(Command::ReportContentType {
            media_id: media_id.to_string(),
            content_type,
        });
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            log::debug!("[Player] Coordinator gone, dropping report");
        }
    }
}

/// Collaborators needed to build player adapters.
#[derive(Clone)]
pub struct PlayerContext {
    pub connector: Arc<dyn StreamConnector>,
    pub sink: Arc<dyn AudioSink>,
    pub spawner: TokioSpawner,
    /// Volume change per relative step.
    pub volume_step: u8,
}

/// The adapter owned by the live session.
pub enum PlayerAdapter {
    Local(LocalPlayer),
    Remote(RemotePlayer),
}

impl PlayerAdapter {
    /// Begins opening the stream. Completion arrives as reports.
    pub fn prepare(&mut self, queue: &mut ActionQueue) {
        match self {
            Self::Local(p) => p.prepare(),
            Self::Remote(p) => p.prepare(queue),
        }
    }

    pub fn play(&mut self, queue: &mut ActionQueue) {
        match self {
            Self::Local(p) => p.play(),
            Self::Remote(p) => p.play(queue),
        }
    }

    /// Pauses local output; renderers have no pause, so remote pause stops.
    pub fn pause(&mut self, queue: &mut ActionQueue) {
        match self {
            Self::Local(p) => p.pause(),
            Self::Remote(p) => p.stop(queue),
        }
    }

    pub fn stop(&mut self, queue: &mut ActionQueue) {
        match self {
            Self::Local(p) => p.stop(),
            Self::Remote(p) => p.stop(queue),
        }
    }

    pub fn adjust_volume(&mut self, direction: VolumeDirection, queue: &mut ActionQueue) {
        match self {
            Self::Local(p) => p.adjust_volume(direction),
            Self::Remote(p) => p.adjust_volume(direction, queue),
        }
    }

    /// Tears the adapter down. Safe to call repeatedly and before
    /// preparation has completed.
    pub fn release(&mut self, queue: &mut ActionQueue) {
        match self {
            Self::Local(p) => p.release(),
            Self::Remote(p) => p.release(queue),
        }
    }

    /// Records a state the coordinator accepted from this adapter.
    pub fn observe_state(&mut self, state: PlaybackState) {
        match self {
            Self::Local(p) => p.observe_state(state),
            Self::Remote(p) => p.observe_state(state),
        }
    }

    /// Routes the result of one of this adapter's renderer actions.
    pub fn on_action_result(
        &mut self,
        kind: &ActionKind,
        outcome: &SoapResult<ActionResponse>,
        queue: &mut ActionQueue,
    ) {
        match self {
            Self::Local(_) => log::warn!("[Player] Local player received a renderer result"),
            Self::Remote(p) => p.on_action_result(kind, outcome, queue),
        }
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        match self {
            Self::Local(p) => p.is_playing(),
            Self::Remote(p) => p.is_playing(),
        }
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Target renderer of a remote adapter.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::Remote(p) => Some(p.device_id()),
        }
    }
}
