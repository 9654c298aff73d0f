//! Local output adapter: fetches the radio stream and feeds an audio sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{PlayerContext, Reporter, VolumeDirection};
use crate::error::ErrorCode;
use crate::library::Radio;
use crate::runtime::TaskSpawner;
use crate::services::session::{MetadataUpdate, PlaybackState};
use crate::stream::{AudioSink, IcyDemuxer, StreamConnector, StreamError};

pub struct LocalPlayer {
    radio: Radio,
    reporter: Reporter,
    ctx: PlayerContext,
    /// Shared with the stream task: while set, audio is read but not played.
    paused: Arc<AtomicBool>,
    cancel: CancellationToken,
    state: PlaybackState,
    prepared: bool,
}

impl LocalPlayer {
    pub fn new(radio: Radio, reporter: Reporter, ctx: PlayerContext) -> Self {
        Self {
            radio,
            reporter,
            ctx,
            paused: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            state: PlaybackState::Preparing,
            prepared: false,
        }
    }

    pub(super) fn prepare(&mut self) {
        if self.prepared || self.cancel.is_cancelled() {
            return;
        }
        self.prepared = true;
        log::info!("[LocalPlayer] Preparing {} ({})", self.radio.name, self.radio.url);

        let radio = self.radio.clone();
        let connector = Arc::clone(&self.ctx.connector);
        let sink = Arc::clone(&self.ctx.sink);
        let paused = Arc::clone(&self.paused);
        let reporter = self.reporter.clone();
        let cancel = self.cancel.clone();

        self.ctx.spawner.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("[LocalPlayer] Stream task cancelled");
                }
                result = stream_radio(&radio, connector, sink, paused, &reporter) => {
                    let e = result.err().unwrap_or(StreamError::Ended);
                    if !cancel.is_cancelled() {
                        log::warn!("[LocalPlayer] Stream failed ({}): {}", e.code(), e);
                        reporter.state(PlaybackState::Error);
                    }
                }
            }
        });
    }

    pub(super) fn play(&mut self) {
        if self.state != PlaybackState::Paused {
            return;
        }
        self.paused.store(false, Ordering::SeqCst);
        self.ctx.sink.set_paused(false);
        self.report(PlaybackState::Playing);
    }

    pub(super) fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.paused.store(true, Ordering::SeqCst);
        self.ctx.sink.set_paused(true);
        self.report(PlaybackState::Paused);
    }

    pub(super) fn stop(&mut self) {
        if !self.state.is_active() {
            return;
        }
        self.cancel.cancel();
        self.report(PlaybackState::Stopped);
    }

    pub(super) fn adjust_volume(&mut self, direction: VolumeDirection) {
        let level = direction.apply(self.ctx.sink.volume(), self.ctx.volume_step);
        log::debug!("[LocalPlayer] Volume -> {}", level);
        self.ctx.sink.set_volume(level);
    }

    pub(super) fn release(&mut self) {
        if !self.cancel.is_cancelled() {
            log::info!("[LocalPlayer] Releasing {}", self.radio.name);
            self.cancel.cancel();
        }
        if self.paused.swap(false, Ordering::SeqCst) {
            self.ctx.sink.set_paused(false);
        }
    }

    pub(super) fn observe_state(&mut self, state: PlaybackState) {
        self.state = state;
    }

    pub(super) fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    fn report(&mut self, state: PlaybackState) {
        self.state = state;
        self.reporter.state(state);
    }
}

/// Streams until the connection fails (`Err`) or the server closes it (`Ok`).
async fn stream_radio(
    radio: &Radio,
    connector: Arc<dyn StreamConnector>,
    sink: Arc<dyn AudioSink>,
    paused: Arc<AtomicBool>,
    reporter: &Reporter,
) -> Result<(), StreamError> {
    let mut stream = connector.connect(&radio.url).await?;
    reporter.state(PlaybackState::Buffering);

    let info = stream.info().clone();
    if let Some(mime) = info.mime_type() {
        reporter.content_type(&radio.id, mime);
    }
    if info.bitrate_kbps.is_some() {
        reporter.metadata(MetadataUpdate {
            information: None,
            rate_kbps: info.bitrate_kbps,
        });
    }

    let mut demuxer = IcyDemuxer::new(info.metaint);
    let mut started = false;

    loop {
        let Some(chunk) = stream.next_chunk().await? else {
            return Ok(());
        };
        let out = demuxer.push(&chunk);

        for title in out.titles {
            log::debug!("[LocalPlayer] StreamTitle: {}", title);
            reporter.metadata(MetadataUpdate {
                information: Some(title),
                rate_kbps: info.bitrate_kbps,
            });
        }

        if out.audio.is_empty() {
            continue;
        }
        if !started {
            started = true;
            reporter.state(PlaybackState::Playing);
        }
        if !paused.load(Ordering::SeqCst) {
            sink.write(&out.audio);
        }
    }
}
