//! Renderer adapter: drives a UPnP MediaRenderer through the action queue.
//!
//! Preparation is a chain of queued actions, each continuing the next from
//! its result:
//!
//! ```text
//! GetProtocolInfo (skipped when cached) -> SetAVTransportURI -> BUFFERING -> Play -> PLAYING
//! ```

use super::{PlayerContext, Reporter, VolumeDirection};
use crate::error::SoapResult;
use crate::library::Radio;
use crate::renderer::didl::{format_didl_lite, select_protocol_info};
use crate::renderer::{ActionKind, ActionResponse, RendererDevice};
use crate::services::action_queue::{ActionQueue, RemoteAction};
use crate::services::session::PlaybackState;

pub struct RemotePlayer {
    radio: Radio,
    device: RendererDevice,
    reporter: Reporter,
    /// Sink protocols of the renderer, once known.
    protocol_info: Option<Vec<String>>,
    /// Content type the stream announced during an earlier local session.
    content_type: Option<String>,
    /// Last known renderer volume.
    volume: Option<u8>,
    /// Direction requested while the volume was still being read.
    pending_volume: Option<VolumeDirection>,
    volume_step: u8,
    state: PlaybackState,
    stop_requested: bool,
    released: bool,
}

impl RemotePlayer {
    pub fn new(
        radio: Radio,
        device: RendererDevice,
        reporter: Reporter,
        ctx: &PlayerContext,
        cached_protocol_info: Option<Vec<String>>,
        cached_content_type: Option<String>,
    ) -> Self {
        Self {
            radio,
            device,
            reporter,
            protocol_info: cached_protocol_info,
            content_type: cached_content_type,
            volume: None,
            pending_volume: None,
            volume_step: ctx.volume_step,
            state: PlaybackState::Preparing,
            stop_requested: false,
            released: false,
        }
    }

    pub(super) fn device_id(&self) -> &str {
        &self.device.id
    }

    pub(super) fn prepare(&mut self, queue: &mut ActionQueue) {
        if self.released {
            return;
        }
        log::info!(
            "[RemotePlayer] Preparing {} on {} ({})",
            self.radio.name,
            self.device.name,
            self.device.id
        );
        if self.protocol_info.is_some() {
            self.schedule_set_uri(queue);
        } else {
            self.schedule(queue, ActionKind::GetProtocolInfo);
        }
    }

    pub(super) fn play(&mut self, queue: &mut ActionQueue) {
        // Preparation ends in Play already
        if self.released || self.state.is_active() {
            return;
        }
        self.schedule(queue, ActionKind::Play);
    }

    /// Abandons the prepare chain: the device's queued actions are purged
    /// before the `Stop` goes out.
    pub(super) fn stop(&mut self, queue: &mut ActionQueue) {
        if self.released || self.stop_requested || !self.state.is_active() {
            return;
        }
        self.stop_requested = true;
        queue.purge(Some(&self.device.id));
        self.pending_volume = None;
        self.schedule(queue, ActionKind::Stop);
    }

    pub(super) fn adjust_volume(&mut self, direction: VolumeDirection, queue: &mut ActionQueue) {
        if self.released || self.stop_requested {
            return;
        }
        match self.volume {
            Some(level) => self.schedule_set_volume(direction.apply(level, self.volume_step), queue),
            None => {
                // Read first; presses during the read collapse into the latest one
                if self.pending_volume.replace(direction).is_none() {
                    self.schedule(queue, ActionKind::GetVolume);
                }
            }
        }
    }

    /// Purges this device's queued actions and, if the renderer may still be
    /// playing, queues a best-effort `Stop` under the superseded token.
    pub(super) fn release(&mut self, queue: &mut ActionQueue) {
        if self.released {
            return;
        }
        self.released = true;
        queue.purge(Some(&self.device.id));

        if self.state.is_active() {
            log::info!("[RemotePlayer] Stopping {} on release", self.device.name);
            self.schedule_unchecked(queue, ActionKind::Stop);
        }
    }

    pub(super) fn observe_state(&mut self, state: PlaybackState) {
        self.state = state;
    }

    pub(super) fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub(super) fn on_action_result(
        &mut self,
        kind: &ActionKind,
        outcome: &SoapResult<ActionResponse>,
        queue: &mut ActionQueue,
    ) {
        if self.released {
            return;
        }
        // Once stopping, only the Stop result matters
        if self.stop_requested && *kind != ActionKind::Stop {
            log::debug!(
                "[RemotePlayer] Ignoring {} result on {}: stop requested",
                kind.name(),
                self.device.name
            );
            return;
        }

        match (kind, outcome) {
            (ActionKind::GetProtocolInfo, Ok(ActionResponse::ProtocolInfo(sinks))) => {
                log::debug!("[RemotePlayer] {} accepts {} protocol(s)", self.device.name, sinks.len());
                self.protocol_info = Some(sinks.clone());
                self.schedule_set_uri(queue);
            }
            (ActionKind::GetProtocolInfo, _) => {
                // Capabilities are only used to pick protocolInfo; fall back to a generic one
                log::warn!(
                    "[RemotePlayer] GetProtocolInfo failed on {}, using default protocol",
                    self.device.name
                );
                self.protocol_info = Some(Vec::new());
                self.schedule_set_uri(queue);
            }
            (ActionKind::SetAvTransportUri { .. }, Ok(_)) => {
                self.report(PlaybackState::Buffering);
                self.schedule(queue, ActionKind::Play);
            }
            (ActionKind::Play, Ok(_)) => self.report(PlaybackState::Playing),
            (ActionKind::Stop, Ok(_)) => self.report(PlaybackState::Stopped),
            (ActionKind::SetAvTransportUri { .. } | ActionKind::Play | ActionKind::Stop, Err(e)) => {
                log::warn!("[RemotePlayer] {} failed on {}: {}", kind.name(), self.device.name, e);
                self.report(PlaybackState::Error);
            }
            (ActionKind::GetVolume, Ok(ActionResponse::Volume(level))) => {
                self.volume = Some(*level);
                if let Some(direction) = self.pending_volume.take() {
                    self.schedule_set_volume(direction.apply(*level, self.volume_step), queue);
                }
            }
            (ActionKind::SetVolume(level), Ok(_)) => {
                log::debug!("[RemotePlayer] Volume on {} is now {}", self.device.name, level);
            }
            (ActionKind::GetVolume | ActionKind::SetVolume(_), _) => {
                log::warn!("[RemotePlayer] Volume change failed on {}", self.device.name);
                self.volume = None;
                self.pending_volume = None;
            }
        }
    }

    fn schedule_set_uri(&mut self, queue: &mut ActionQueue) {
        let sinks = self.protocol_info.as_deref().unwrap_or_default();
        let mime_type = self.radio.mime_type_or(self.content_type.as_deref());
        let protocol_info = select_protocol_info(sinks, mime_type);
        let metadata = format_didl_lite(&self.radio, &protocol_info);
        self.schedule(
            queue,
            ActionKind::SetAvTransportUri {
                uri: self.radio.url.clone(),
                metadata,
            },
        );
    }

    fn schedule_set_volume(&mut self, level: u8, queue: &mut ActionQueue) {
        // Optimistic, so quick repeated presses accumulate
        self.volume = Some(level);
        self.schedule(queue, ActionKind::SetVolume(level));
    }

    fn schedule(&self, queue: &mut ActionQueue, kind: ActionKind) {
        if self.released || (self.stop_requested && kind != ActionKind::Stop) {
            return;
        }
        self.schedule_unchecked(queue, kind);
    }

    fn schedule_unchecked(&self, queue: &mut ActionQueue, kind: ActionKind) {
        queue.schedule(RemoteAction {
            device: self.device.clone(),
            token: self.reporter.token().clone(),
            kind,
        });
    }

    fn report(&mut self, state: PlaybackState) {
        self.state = state;
        self.reporter.state(state);
    }
}
