//! Playback session coordinator.
//!
//! The single authority for "what is playing now". One task owns the
//! [`PlaybackCoordinator`] and applies [`Command`]s in arrival order: user
//! commands, adapter reports, renderer action results and device losses all
//! funnel through the same channel, so session state and the action queue are
//! never touched concurrently.
//!
//! Every report carries the [`SessionToken`] its adapter was created with.
//! A report is applied only if that token is the live one; anything else is
//! a leftover of a superseded session and is dropped silently.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::action_queue::{ActionDispatcher, ActionQueue, ActionTicket};
use super::lifecycle_sync::LifecycleSynchronizer;
use super::player::{LocalPlayer, PlayerAdapter, PlayerContext, RemotePlayer, Reporter, VolumeDirection};
use super::session::{
    MetadataUpdate, PlaybackState, PlaylistEntry, PlaylistHistory, Session, SessionMetadata,
    SessionToken,
};
use crate::error::{CastError, CastResult, SoapResult};
use crate::events::{EventEmitter, PlaybackEvent};
use crate::library::RadioLibrary;
use crate::lifecycle::{ProcessHost, StatusSnapshot};
use crate::renderer::{ActionKind, ActionResponse, DeviceDiscovery};
use crate::utils::now_millis;

/// Messages processed by the coordinator task.
pub enum Command {
    StartSession {
        media_id: String,
        device_id: Option<String>,
        reply: oneshot::Sender<CastResult<SessionToken>>,
    },
    Play {
        reply: oneshot::Sender<CastResult<()>>,
    },
    Pause {
        reply: oneshot::Sender<CastResult<()>>,
    },
    Stop {
        reply: oneshot::Sender<CastResult<()>>,
    },
    /// Restarts a failed session with the same media and device.
    Retry {
        reply: oneshot::Sender<CastResult<SessionToken>>,
    },
    AdjustVolume {
        direction: VolumeDirection,
    },
    ReportState {
        token: SessionToken,
        state: PlaybackState,
    },
    ReportMetadata {
        token: SessionToken,
        update: MetadataUpdate,
    },
    /// Content type a stream announced, cached per radio.
    ReportContentType {
        media_id: String,
        content_type: String,
    },
    ActionResolved {
        ticket: ActionTicket,
        outcome: SoapResult<ActionResponse>,
    },
    DeviceLost {
        device_id: String,
    },
    Snapshot {
        reply: oneshot::Sender<CoordinatorSnapshot>,
    },
    Playlist {
        reply: oneshot::Sender<Vec<PlaylistEntry>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Point-in-time view of the coordinator, for queries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorSnapshot {
    pub state: PlaybackState,
    pub is_remote: bool,
    pub is_playing: bool,
    pub media_id: Option<String>,
    pub device_id: Option<String>,
    pub metadata: Option<SessionMetadata>,
    pub rate_text: Option<String>,
    pub status: Option<StatusSnapshot>,
    pub foreground: bool,
    pub pending_actions: usize,
    pub action_in_flight: bool,
}

/// Collaborators of the coordinator.
pub struct CoordinatorDeps {
    pub library: Arc<dyn RadioLibrary>,
    pub devices: Arc<dyn DeviceDiscovery>,
    pub dispatcher: Arc<dyn ActionDispatcher>,
    pub players: PlayerContext,
    pub host: Arc<dyn ProcessHost>,
    pub emitter: Arc<dyn EventEmitter>,
    pub playlist_capacity: usize,
}

pub struct PlaybackCoordinator {
    library: Arc<dyn RadioLibrary>,
    devices: Arc<dyn DeviceDiscovery>,
    players: PlayerContext,
    emitter: Arc<dyn EventEmitter>,
    lifecycle: LifecycleSynchronizer,
    queue: ActionQueue,
    session: Option<Session>,
    adapter: Option<PlayerAdapter>,
    playlist: PlaylistHistory,
    /// Sink protocols per renderer, reused across sessions.
    protocol_cache: HashMap<String, Vec<String>>,
    /// Announced stream content types per radio.
    content_types: HashMap<String, String>,
    tx: mpsc::UnboundedSender<Command>,
    shut_down: bool,
}

impl PlaybackCoordinator {
    /// Creates the coordinator and the receiving end of its command channel.
    pub fn new(deps: CoordinatorDeps) -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            library: deps.library,
            devices: deps.devices,
            players: deps.players,
            lifecycle: LifecycleSynchronizer::new(deps.host, Arc::clone(&deps.emitter)),
            emitter: deps.emitter,
            queue: ActionQueue::new(deps.dispatcher, tx.clone()),
            session: None,
            adapter: None,
            playlist: PlaylistHistory::new(deps.playlist_capacity),
            protocol_cache: HashMap::new(),
            content_types: HashMap::new(),
            tx,
            shut_down: false,
        };
        (coordinator, rx)
    }

    /// Returns a cloneable handle for issuing commands.
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            tx: self.tx.clone(),
        }
    }

    /// Processes commands until shutdown or cancellation.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>, cancel: CancellationToken) {
        log::info!("[Coordinator] Started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.shutdown();
                    break;
                }
                command = rx.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command);
                    if self.shut_down {
                        break;
                    }
                }
            }
        }
        log::info!("[Coordinator] Stopped");
    }

    /// Applies one command.
    pub fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartSession {
                media_id,
                device_id,
                reply,
            } => {
                let _ = reply.send(self.start_session(&media_id, device_id.as_deref()));
            }
            Command::Play { reply } => {
                let _ = reply.send(self.play());
            }
            Command::Pause { reply } => {
                let _ = reply.send(self.pause());
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.stop());
            }
            Command::Retry { reply } => {
                let _ = reply.send(self.retry());
            }
            Command::AdjustVolume { direction } => self.adjust_volume(direction),
            Command::ReportState { token, state } => self.report_state(&token, state),
            Command::ReportMetadata { token, update } => self.report_metadata(&token, update),
            Command::ReportContentType {
                media_id,
                content_type,
            } => self.report_content_type(media_id, content_type),
            Command::ActionResolved { ticket, outcome } => self.on_action_resolved(ticket, outcome),
            Command::DeviceLost { device_id } => self.device_lost(&device_id),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Playlist { reply } => {
                let _ = reply.send(self.playlist.entries());
            }
            Command::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Supersedes the current session with a new one.
    ///
    /// The radio and device are resolved before anything is torn down, so a
    /// failed start leaves the current session untouched.
    pub fn start_session(
        &mut self,
        media_id: &str,
        device_id: Option<&str>,
    ) -> CastResult<SessionToken> {
        if self.shut_down {
            return Err(CastError::Internal("Coordinator is shut down".into()));
        }

        let radio = self
            .library
            .get(media_id)
            .ok_or_else(|| CastError::MediaNotFound(media_id.to_string()))?;
        let device = match device_id {
            Some(id) => Some(
                self.devices
                    .resolve_device(id)
                    .ok_or_else(|| CastError::DeviceNotFound(id.to_string()))?,
            ),
            None => None,
        };

        self.queue.purge(None);
        if let Some(mut old) = self.adapter.take() {
            old.release(&mut self.queue);
        }
        if let Some(old) = &self.session {
            if old.state.is_active() {
                self.emit_state(old, PlaybackState::Stopped);
            }
        }

        let session = Session::new(
            radio.id.clone(),
            device.as_ref().map(|d| d.id.clone()),
            SessionMetadata {
                title: radio.name.clone(),
                artwork: radio.icon_url.clone(),
                ..Default::default()
            },
        );
        let token = session.token.clone();
        log::info!(
            "[Coordinator] Starting session {} for {} on {}",
            token,
            radio.name,
            device.as_ref().map_or("local output", |d| d.name.as_str())
        );

        self.playlist.clear();
        let reporter = Reporter::new(token.clone(), self.tx.clone());
        let mut adapter = match device {
            Some(device) => {
                let protocol_info = self.protocol_cache.get(&device.id).cloned();
                let content_type = self.content_types.get(&radio.id).cloned();
                PlayerAdapter::Remote(RemotePlayer::new(
                    radio,
                    device,
                    reporter,
                    &self.players,
                    protocol_info,
                    content_type,
                ))
            }
            None => PlayerAdapter::Local(LocalPlayer::new(radio, reporter, self.players.clone())),
        };
        adapter.prepare(&mut self.queue);

        self.emit_state(&session, PlaybackState::Preparing);
        self.lifecycle
            .reconcile(session.state, session.is_remote(), &session.metadata);
        self.session = Some(session);
        self.adapter = Some(adapter);

        Ok(token)
    }

    pub fn play(&mut self) -> CastResult<()> {
        let adapter = self.adapter.as_mut().ok_or(CastError::NotReady)?;
        adapter.play(&mut self.queue);
        Ok(())
    }

    pub fn pause(&mut self) -> CastResult<()> {
        let adapter = self.adapter.as_mut().ok_or(CastError::NotReady)?;
        adapter.pause(&mut self.queue);
        Ok(())
    }

    pub fn stop(&mut self) -> CastResult<()> {
        let adapter = self.adapter.as_mut().ok_or(CastError::NotReady)?;
        adapter.stop(&mut self.queue);
        Ok(())
    }

    /// Restarts the session if it ended in ERROR.
    pub fn retry(&mut self) -> CastResult<SessionToken> {
        let (media_id, device_id) = match &self.session {
            Some(s) if s.state == PlaybackState::Error => (s.media_id.clone(), s.device_id.clone()),
            _ => return Err(CastError::NotReady),
        };
        log::info!("[Coordinator] Retrying {}", media_id);
        self.start_session(&media_id, device_id.as_deref())
    }

    pub fn adjust_volume(&mut self, direction: VolumeDirection) {
        match self.adapter.as_mut() {
            Some(adapter) => adapter.adjust_volume(direction, &mut self.queue),
            None => log::debug!("[Coordinator] Ignoring volume change without a session"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reports
    // ─────────────────────────────────────────────────────────────────────────

    /// `true` if `token` belongs to the live session and its adapter.
    fn accepts(&self, token: &SessionToken) -> bool {
        self.adapter.is_some() && self.session.as_ref().is_some_and(|s| &s.token == token)
    }

    pub fn report_state(&mut self, token: &SessionToken, state: PlaybackState) {
        if !self.accepts(token) {
            log::debug!("[Coordinator] Discarding stale {:?} report from {}", state, token);
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state == state {
            return;
        }

        log::info!("[Coordinator] {:?} -> {:?}", session.state, state);
        session.state = state;
        let is_remote = session.is_remote();

        if let Some(adapter) = self.adapter.as_mut() {
            adapter.observe_state(state);
        }

        let session_ends = state.is_terminal() || state == PlaybackState::Error;
        if session_ends {
            if let Some(mut adapter) = self.adapter.take() {
                adapter.release(&mut self.queue);
            }
            // A failed local session keeps its display for the Retry status
            if state != PlaybackState::Error || is_remote {
                session.metadata = SessionMetadata::default();
            }
        }

        let session = session.clone();
        self.emit_state(&session, state);
        self.lifecycle.reconcile(state, is_remote, &session.metadata);
    }

    pub fn report_metadata(&mut self, token: &SessionToken, update: MetadataUpdate) {
        if !self.accepts(token) {
            log::debug!("[Coordinator] Discarding stale metadata from {}", token);
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if let Some(text) = &update.information {
            if let Some(entry) = self.playlist.push(text) {
                self.emitter.emit_playback(PlaybackEvent::PlaylistEntryAdded {
                    text: entry.text.clone(),
                    timestamp: entry.timestamp,
                });
            }
        }

        if !session.metadata.apply(&update) {
            return;
        }
        self.emitter.emit_playback(PlaybackEvent::MetadataChanged {
            title: session.metadata.title.clone(),
            subtitle: session.metadata.subtitle.clone(),
            rate_text: session.metadata.rate_text(),
            timestamp: now_millis(),
        });
        self.lifecycle
            .reconcile(session.state, session.is_remote(), &session.metadata);
    }

    /// Remembers the content type a stream announced for later renderer sessions.
    pub fn report_content_type(&mut self, media_id: String, content_type: String) {
        if self.shut_down {
            return;
        }
        log::debug!("[Coordinator] {} announced {}", media_id, content_type);
        self.content_types.insert(media_id, content_type);
    }

    /// Advances the action queue and routes the result to its continuation.
    pub fn on_action_resolved(&mut self, ticket: ActionTicket, outcome: SoapResult<ActionResponse>) {
        let Some(action) = self.queue.on_action_resolved(ticket) else {
            return;
        };

        // Renderer capabilities stay valid whichever session asked
        if let (ActionKind::GetProtocolInfo, Ok(ActionResponse::ProtocolInfo(sinks))) =
            (&action.kind, &outcome)
        {
            self.protocol_cache.insert(action.device.id.clone(), sinks.clone());
        }

        if !self.accepts(&action.token) {
            log::debug!(
                "[Coordinator] Discarding {} result from superseded session",
                action.kind.name()
            );
            return;
        }
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.on_action_result(&action.kind, &outcome, &mut self.queue);
        }
    }

    /// Handles a renderer disappearing from the network.
    pub fn device_lost(&mut self, device_id: &str) {
        self.queue.purge(Some(device_id));
        self.protocol_cache.remove(device_id);

        let targets_device = self
            .adapter
            .as_ref()
            .and_then(PlayerAdapter::device_id)
            .is_some_and(|id| id == device_id);
        if !targets_device {
            return;
        }

        log::warn!("[Coordinator] Renderer {} lost during session", device_id);
        if let (Some(session), Some(adapter)) = (self.session.as_ref(), self.adapter.as_mut()) {
            let token = session.token.clone();
            // Nothing left to send a teardown Stop to
            adapter.observe_state(PlaybackState::Error);
            self.report_state(&token, PlaybackState::Error);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries & shutdown
    // ─────────────────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let session = self.session.as_ref();
        CoordinatorSnapshot {
            state: session.map_or(PlaybackState::None, |s| s.state),
            is_remote: session.is_some_and(Session::is_remote),
            is_playing: self.adapter.as_ref().is_some_and(PlayerAdapter::is_playing),
            media_id: session.map(|s| s.media_id.clone()),
            device_id: session.and_then(|s| s.device_id.clone()),
            metadata: session.map(|s| s.metadata.clone()),
            rate_text: session.and_then(|s| s.metadata.rate_text()),
            status: self.lifecycle.status().cloned(),
            foreground: self.lifecycle.is_foreground(),
            pending_actions: self.queue.pending_len(),
            action_in_flight: self.queue.is_running(),
        }
    }

    pub fn playlist(&self) -> Vec<PlaylistEntry> {
        self.playlist.entries()
    }

    /// Releases the adapter and drops all queued work.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        log::info!("[Coordinator] Shutting down");
        if let Some(mut adapter) = self.adapter.take() {
            adapter.release(&mut self.queue);
        }
        self.queue.clear();
        self.protocol_cache.clear();
        self.content_types.clear();
        self.lifecycle.shutdown();
        self.shut_down = true;
    }

    fn emit_state(&self, session: &Session, state: PlaybackState) {
        self.emitter.emit_playback(PlaybackEvent::StateChanged {
            state,
            is_remote: session.is_remote(),
            media_id: Some(session.media_id.clone()),
            timestamp: now_millis(),
        });
    }
}

/// Cloneable handle to the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl CoordinatorHandle {
    pub async fn start_session(
        &self,
        media_id: impl Into<String>,
        device_id: Option<String>,
    ) -> CastResult<SessionToken> {
        let media_id = media_id.into();
        self.request(|reply| Command::StartSession {
            media_id,
            device_id,
            reply,
        })
        .await?
    }

    pub async fn play(&self) -> CastResult<()> {
        self.request(|reply| Command::Play { reply }).await?
    }

    pub async fn pause(&self) -> CastResult<()> {
        self.request(|reply| Command::Pause { reply }).await?
    }

    pub async fn stop(&self) -> CastResult<()> {
        self.request(|reply| Command::Stop { reply }).await?
    }

    pub async fn retry(&self) -> CastResult<SessionToken> {
        self.request(|reply| Command::Retry { reply }).await?
    }

    pub fn adjust_volume(&self, direction: VolumeDirection) -> CastResult<()> {
        self.send(Command::AdjustVolume { direction })
    }

    pub fn device_lost(&self, device_id: impl Into<String>) -> CastResult<()> {
        self.send(Command::DeviceLost {
            device_id: device_id.into(),
        })
    }

    pub async fn snapshot(&self) -> CastResult<CoordinatorSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn playlist(&self) -> CastResult<Vec<PlaylistEntry>> {
        self.request(|reply| Command::Playlist { reply }).await
    }

    pub async fn shutdown(&self) -> CastResult<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    fn send(&self, command: Command) -> CastResult<()> {
        self.tx
            .send(command)
            .map_err(|_| CastError::Internal("Coordinator is not running".into()))
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> CastResult<T> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply))?;
        rx.await
            .map_err(|_| CastError::Internal("Coordinator dropped the request".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;

    use crate::events::{DeviceEvent, StatusEvent};
    use crate::library::{InMemoryRadioLibrary, Radio};
    use crate::lifecycle::{ServerHost, StatusAffordance};
    use crate::renderer::soap::SoapError;
    use crate::renderer::{DeviceRegistry, RendererDevice};
    use crate::runtime::TokioSpawner;
    use crate::services::action_queue::tests::RecordingDispatcher;
    use crate::stream::{AudioSink, NullSink, RadioStream, StreamConnector, StreamError, StreamInfo};

    const KITCHEN: &str = "uuid:kitchen";

    // ─────────────────────────────────────────────────────────────────────
    // Fakes
    // ─────────────────────────────────────────────────────────────────────

    /// Connector whose connection attempt never completes.
    struct PendingConnector;

    #[async_trait]
    impl StreamConnector for PendingConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn RadioStream>, StreamError> {
            std::future::pending().await
        }
    }

    /// Connector replaying fixed chunks, then either ending or idling.
    struct ScriptedConnector {
        info: StreamInfo,
        chunks: Vec<Bytes>,
        hold_open: bool,
    }

    struct ScriptedStream {
        info: StreamInfo,
        chunks: VecDeque<Bytes>,
        hold_open: bool,
    }

    #[async_trait]
    impl StreamConnector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn RadioStream>, StreamError> {
            Ok(Box::new(ScriptedStream {
                info: self.info.clone(),
                chunks: self.chunks.iter().cloned().collect(),
                hold_open: self.hold_open,
            }))
        }
    }

    #[async_trait]
    impl RadioStream for ScriptedStream {
        fn info(&self) -> &StreamInfo {
            &self.info
        }

        async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
            match self.chunks.pop_front() {
                Some(chunk) => Ok(Some(chunk)),
                None if self.hold_open => std::future::pending().await,
                None => Ok(None),
            }
        }
    }

    #[derive(Default)]
    struct RecordingEmitter {
        playback: Mutex<Vec<PlaybackEvent>>,
    }

    impl RecordingEmitter {
        fn states(&self) -> Vec<PlaybackState> {
            self.playback
                .lock()
                .iter()
                .filter_map(|e| match e {
                    PlaybackEvent::StateChanged { state, .. } => Some(*state),
                    _ => None,
                })
                .collect()
        }

        fn metadata_events(&self) -> usize {
            self.playback
                .lock()
                .iter()
                .filter(|e| matches!(e, PlaybackEvent::MetadataChanged { .. }))
                .count()
        }
    }

    impl EventEmitter for RecordingEmitter {
        fn emit_playback(&self, event: PlaybackEvent) {
            self.playback.lock().push(event);
        }
        fn emit_status(&self, _event: StatusEvent) {}
        fn emit_device(&self, _event: DeviceEvent) {}
    }

    // ─────────────────────────────────────────────────────────────────────
    // Harness
    // ─────────────────────────────────────────────────────────────────────

    struct Harness {
        coordinator: PlaybackCoordinator,
        rx: mpsc::UnboundedReceiver<Command>,
        dispatcher: Arc<RecordingDispatcher>,
        emitter: Arc<RecordingEmitter>,
        host: Arc<ServerHost>,
        sink: Arc<NullSink>,
    }

    fn radio(id: &str, name: &str) -> Radio {
        Radio {
            id: id.into(),
            name: name.into(),
            url: format!("http://radio.example.com/{}", id),
            icon_url: Some(format!("http://radio.example.com/{}.png", id)),
            mime_type: None,
        }
    }

    fn harness(connector: Arc<dyn StreamConnector>) -> Harness {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let emitter = Arc::new(RecordingEmitter::default());
        let host = Arc::new(ServerHost::new());
        let sink = Arc::new(NullSink::default());
        let devices = DeviceRegistry::with_devices([RendererDevice::with_base_url(
            KITCHEN,
            "Kitchen",
            "http://192.168.1.40:49152",
        )]);

        let (coordinator, rx) = PlaybackCoordinator::new(CoordinatorDeps {
            library: Arc::new(InMemoryRadioLibrary::new([
                radio("3", "Rock"),
                radio("7", "Jazz"),
                radio("9", "News"),
            ])),
            devices: Arc::new(devices),
            dispatcher: dispatcher.clone(),
            players: PlayerContext {
                connector,
                sink: sink.clone(),
                spawner: TokioSpawner::current(),
                volume_step: 5,
            },
            host: host.clone(),
            emitter: emitter.clone(),
            playlist_capacity: 20,
        });

        Harness {
            coordinator,
            rx,
            dispatcher,
            emitter,
            host,
            sink,
        }
    }

    impl Harness {
        /// Applies every command already queued, including ones they cause.
        fn pump(&mut self) {
            while let Ok(command) = self.rx.try_recv() {
                self.coordinator.handle_command(command);
            }
        }

        /// Lets spawned player tasks run, then pumps.
        async fn settle(&mut self) {
            for _ in 0..20 {
                tokio::task::yield_now().await;
                self.pump();
            }
        }

        fn state(&self) -> PlaybackState {
            self.coordinator.snapshot().state
        }

        /// Resolves the in-flight renderer action and applies the fallout.
        fn resolve(&mut self, outcome: SoapResult<ActionResponse>) {
            self.dispatcher.resolve_last(outcome);
            self.pump();
        }

        /// Walks a remote session through its prepare chain to PLAYING.
        fn play_remote(&mut self, media_id: &str) -> SessionToken {
            let token = self.coordinator.start_session(media_id, Some(KITCHEN)).unwrap();
            if self.dispatcher.kinds().last() == Some(&ActionKind::GetProtocolInfo) {
                self.resolve(Ok(ActionResponse::ProtocolInfo(vec![
                    "http-get:*:audio/mpeg:*".into(),
                ])));
            }
            self.resolve(Ok(ActionResponse::Done)); // SetAVTransportURI
            self.resolve(Ok(ActionResponse::Done)); // Play
            token
        }
    }

    fn update(text: &str) -> MetadataUpdate {
        MetadataUpdate {
            information: Some(text.into()),
            rate_kbps: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session tokens
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn only_the_latest_token_is_accepted() {
        let mut h = harness(Arc::new(PendingConnector));
        let tokens: Vec<_> = (0..5)
            .map(|i| {
                let id = if i % 2 == 0 { "7" } else { "9" };
                h.coordinator.start_session(id, None).unwrap()
            })
            .collect();
        let (stale, live) = tokens.split_at(4);
        let before = h.coordinator.snapshot().metadata;

        for token in stale {
            h.coordinator.report_state(token, PlaybackState::Playing);
            h.coordinator.report_state(token, PlaybackState::Error);
            h.coordinator.report_metadata(token, update("stale"));
        }

        assert_eq!(h.state(), PlaybackState::Preparing);
        assert_eq!(h.coordinator.snapshot().metadata, before);
        assert!(h.coordinator.playlist().is_empty());

        h.coordinator.report_state(&live[0], PlaybackState::Buffering);
        assert_eq!(h.state(), PlaybackState::Buffering);
    }

    #[tokio::test]
    async fn scenario_late_report_from_superseded_session_is_ignored() {
        let mut h = harness(Arc::new(PendingConnector));

        let t1 = h.coordinator.start_session("7", None).unwrap();
        h.coordinator.report_state(&t1, PlaybackState::Buffering);
        h.coordinator.report_state(&t1, PlaybackState::Playing);

        let status = h.host.status().unwrap();
        assert_eq!(status.title, "Jazz");
        assert!(h.host.is_foreground());

        let t2 = h.coordinator.start_session("9", None).unwrap();
        let metadata_events = h.emitter.metadata_events();
        h.coordinator.report_metadata(&t1, update("Late headline"));
        h.coordinator.report_state(&t1, PlaybackState::Playing);

        assert_eq!(h.state(), PlaybackState::Preparing);
        assert_eq!(h.emitter.metadata_events(), metadata_events);
        assert_eq!(h.host.status().unwrap().title, "News");
        assert!(h.host.status().unwrap().subtitle.is_none());

        h.coordinator.report_state(&t2, PlaybackState::Buffering);
        h.coordinator.report_state(&t2, PlaybackState::Playing);
        h.coordinator.report_metadata(&t2, update("Top of the hour"));

        let status = h.host.status().unwrap();
        assert_eq!(status.title, "News");
        assert_eq!(status.subtitle.as_deref(), Some("Top of the hour"));
        assert_eq!(status.affordance, StatusAffordance::Pause);
    }

    #[tokio::test]
    async fn scenario_unknown_device_leaves_state_untouched() {
        let mut h = harness(Arc::new(PendingConnector));

        let err = h.coordinator.start_session("3", Some("deviceA")).unwrap_err();
        assert!(matches!(err, CastError::DeviceNotFound(ref id) if id == "deviceA"));
        assert_eq!(err.code(), "device_not_found");

        // The library is consulted before the device registry
        let err = h.coordinator.start_session("404", Some("deviceA")).unwrap_err();
        assert!(matches!(err, CastError::MediaNotFound(ref id) if id == "404"));

        h.pump();
        assert_eq!(h.state(), PlaybackState::None);
        assert!(h.dispatcher.kinds().is_empty());
        assert!(!h.coordinator.snapshot().action_in_flight);
        assert!(h.host.status().is_none());
    }

    #[tokio::test]
    async fn failed_start_keeps_current_session() {
        let mut h = harness(Arc::new(PendingConnector));
        let t1 = h.coordinator.start_session("7", None).unwrap();

        assert!(h.coordinator.start_session("7", Some("uuid:gone")).is_err());

        h.coordinator.report_state(&t1, PlaybackState::Buffering);
        assert_eq!(h.state(), PlaybackState::Buffering);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn commands_without_session_are_not_ready() {
        let mut h = harness(Arc::new(PendingConnector));
        assert!(matches!(h.coordinator.play(), Err(CastError::NotReady)));
        assert!(matches!(h.coordinator.pause(), Err(CastError::NotReady)));
        assert!(matches!(h.coordinator.stop(), Err(CastError::NotReady)));
        assert!(matches!(h.coordinator.retry(), Err(CastError::NotReady)));
        h.coordinator.adjust_volume(VolumeDirection::Raise);
        assert_eq!(h.sink.volume(), 50);
    }

    #[tokio::test]
    async fn local_pause_yields_paused() {
        let mut h = harness(Arc::new(PendingConnector));
        let token = h.coordinator.start_session("7", None).unwrap();
        h.coordinator.report_state(&token, PlaybackState::Buffering);
        h.coordinator.report_state(&token, PlaybackState::Playing);

        h.coordinator.pause().unwrap();
        h.pump();
        assert_eq!(h.state(), PlaybackState::Paused);
        assert!(h.sink.is_paused());
        assert_eq!(
            h.host.status().unwrap().affordance,
            StatusAffordance::Play
        );

        // Pausing twice is a no-op
        h.coordinator.pause().unwrap();
        h.pump();
        assert_eq!(h.state(), PlaybackState::Paused);

        h.coordinator.play().unwrap();
        h.pump();
        assert_eq!(h.state(), PlaybackState::Playing);
        assert!(!h.sink.is_paused());
    }

    #[tokio::test]
    async fn remote_pause_yields_stopped() {
        let mut h = harness(Arc::new(PendingConnector));
        h.play_remote("7");
        assert_eq!(h.state(), PlaybackState::Playing);
        assert_eq!(h.host.status().unwrap().affordance, StatusAffordance::Stop);

        h.coordinator.pause().unwrap();
        assert_eq!(h.dispatcher.kinds().last(), Some(&ActionKind::Stop));
        h.resolve(Ok(ActionResponse::Done));

        assert_eq!(h.state(), PlaybackState::Stopped);
        assert!(!h.emitter.states().contains(&PlaybackState::Paused));
        assert!(h.host.status().is_none());
        assert!(!h.host.is_foreground());
        assert!(matches!(h.coordinator.play(), Err(CastError::NotReady)));
    }

    #[tokio::test]
    async fn stop_during_prepare_never_reaches_play() {
        let mut h = harness(Arc::new(PendingConnector));
        h.coordinator.start_session("7", Some(KITCHEN)).unwrap();
        h.resolve(Ok(ActionResponse::ProtocolInfo(vec![
            "http-get:*:audio/mpeg:*".into(),
        ])));
        let set_uri = h.dispatcher.last_ticket();

        // SetAVTransportURI is still out when the user pauses
        h.coordinator.pause().unwrap();
        let kinds = h.dispatcher.kinds();
        assert_eq!(kinds.len(), 3);
        assert_eq!(kinds[2], ActionKind::Stop);

        // Its late success must not continue the chain
        h.coordinator
            .on_action_resolved(set_uri, Ok(ActionResponse::Done));
        h.pump();
        assert_eq!(h.dispatcher.kinds().len(), 3);
        assert!(!h.emitter.states().contains(&PlaybackState::Buffering));

        h.resolve(Ok(ActionResponse::Done)); // Stop
        assert_eq!(h.state(), PlaybackState::Stopped);
        assert!(!h.dispatcher.kinds().contains(&ActionKind::Play));
        assert!(!h.coordinator.snapshot().action_in_flight);

        // Presses after the stop queue nothing
        h.coordinator.adjust_volume(VolumeDirection::Raise);
        assert_eq!(h.dispatcher.kinds().len(), 3);
    }

    #[tokio::test]
    async fn local_volume_goes_to_sink() {
        let mut h = harness(Arc::new(PendingConnector));
        h.coordinator.start_session("7", None).unwrap();
        h.coordinator.adjust_volume(VolumeDirection::Raise);
        h.coordinator.adjust_volume(VolumeDirection::Raise);
        assert_eq!(h.sink.volume(), 60);
        assert!(h.dispatcher.kinds().is_empty());
    }

    #[tokio::test]
    async fn metadata_duplicates_make_one_playlist_entry() {
        let mut h = harness(Arc::new(PendingConnector));
        let token = h.coordinator.start_session("7", None).unwrap();

        h.coordinator.report_metadata(&token, update("Miles Davis - So What"));
        h.coordinator.report_metadata(&token, update("Miles Davis - So What"));
        h.coordinator.report_metadata(&token, update(""));

        let playlist = h.coordinator.playlist();
        assert_eq!(playlist.len(), 1);
        assert_eq!(playlist[0].text, "Miles Davis - So What");
        assert_eq!(h.emitter.metadata_events(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Local stream
    // ─────────────────────────────────────────────────────────────────────

    fn icy_block(meta: &str) -> Vec<u8> {
        let blocks = meta.len().div_ceil(16);
        let mut out = vec![blocks as u8];
        out.extend_from_slice(meta.as_bytes());
        out.resize(blocks * 16 + 1, 0);
        out
    }

    #[tokio::test]
    async fn local_stream_reports_progress_and_titles() {
        let mut data = Vec::new();
        for title in ["A - One", "A - One", "B - Two"] {
            data.extend_from_slice(&[1, 2, 3, 4]);
            data.extend(icy_block(&format!("StreamTitle='{}';", title)));
        }
        data.extend_from_slice(&[5, 6, 7, 8]);

        let mut h = harness(Arc::new(ScriptedConnector {
            info: StreamInfo {
                metaint: Some(4),
                bitrate_kbps: Some(128),
                content_type: Some("audio/mpeg".into()),
            },
            chunks: data.chunks(7).map(Bytes::copy_from_slice).collect(),
            hold_open: true,
        }));

        h.coordinator.start_session("7", None).unwrap();
        h.settle().await;

        let snapshot = h.coordinator.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.rate_text.as_deref(), Some("128 kbit/s"));
        assert_eq!(
            snapshot.metadata.unwrap().subtitle.as_deref(),
            Some("B - Two")
        );
        let texts: Vec<_> = h.coordinator.playlist().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["A - One", "B - Two"]);
        assert_eq!(h.sink.bytes_written(), 16);
        assert_eq!(
            h.emitter.states(),
            vec![
                PlaybackState::Preparing,
                PlaybackState::Buffering,
                PlaybackState::Playing
            ]
        );
    }

    #[tokio::test]
    async fn local_stream_end_keeps_status_with_retry() {
        let mut h = harness(Arc::new(ScriptedConnector {
            info: StreamInfo::default(),
            chunks: vec![Bytes::from_static(b"audio")],
            hold_open: false,
        }));

        h.coordinator.start_session("7", None).unwrap();
        h.settle().await;

        assert_eq!(h.state(), PlaybackState::Error);
        let status = h.host.status().unwrap();
        assert_eq!(status.title, "Jazz");
        assert_eq!(status.affordance, StatusAffordance::Retry);
        assert!(!h.host.is_foreground());

        // Error is terminal: the session accepts nothing more
        assert!(matches!(h.coordinator.play(), Err(CastError::NotReady)));

        let token = h.coordinator.retry().unwrap();
        assert_eq!(h.state(), PlaybackState::Preparing);
        assert_eq!(h.coordinator.snapshot().media_id.as_deref(), Some("7"));
        h.coordinator.report_state(&token, PlaybackState::Buffering);
        assert_eq!(h.state(), PlaybackState::Buffering);
    }

    #[tokio::test(start_paused = true)]
    async fn preparing_has_no_watchdog() {
        let mut h = harness(Arc::new(PendingConnector));
        h.coordinator.start_session("7", None).unwrap();

        tokio::time::advance(Duration::from_secs(6 * 60 * 60)).await;
        h.settle().await;

        assert_eq!(h.state(), PlaybackState::Preparing);
        assert!(h.host.is_foreground());

        // Only a new session moves it on
        h.coordinator.start_session("9", None).unwrap();
        assert_eq!(h.coordinator.snapshot().media_id.as_deref(), Some("9"));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Remote sessions
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn remote_prepare_runs_action_chain() {
        let mut h = harness(Arc::new(PendingConnector));
        h.play_remote("7");

        let kinds = h.dispatcher.kinds();
        assert_eq!(kinds.len(), 3);
        assert_eq!(kinds[0], ActionKind::GetProtocolInfo);
        match &kinds[1] {
            ActionKind::SetAvTransportUri { uri, metadata } => {
                assert_eq!(uri, "http://radio.example.com/7");
                assert!(metadata.contains("<dc:title>Jazz</dc:title>"));
                assert!(metadata.contains("http-get:*:audio/mpeg:*"));
            }
            other => panic!("unexpected action {:?}", other),
        }
        assert_eq!(kinds[2], ActionKind::Play);
        assert_eq!(
            h.emitter.states(),
            vec![
                PlaybackState::Preparing,
                PlaybackState::Buffering,
                PlaybackState::Playing
            ]
        );
        assert!(h.coordinator.snapshot().is_remote);
    }

    #[tokio::test]
    async fn protocol_info_is_cached_per_device() {
        let mut h = harness(Arc::new(PendingConnector));
        h.play_remote("7");
        let before = h.dispatcher.kinds().len();

        h.coordinator.start_session("9", Some(KITCHEN)).unwrap();
        let kinds = h.dispatcher.kinds();
        // Teardown Stop of the first session goes out first
        assert_eq!(kinds[before], ActionKind::Stop);
        h.resolve(Ok(ActionResponse::Done));
        assert!(matches!(
            h.dispatcher.kinds().last(),
            Some(ActionKind::SetAvTransportUri { .. })
        ));
    }

    #[tokio::test]
    async fn announced_content_type_picks_renderer_protocol() {
        let mut h = harness(Arc::new(ScriptedConnector {
            info: StreamInfo {
                metaint: None,
                bitrate_kbps: None,
                content_type: Some("audio/aac; charset=utf-8".into()),
            },
            chunks: vec![Bytes::from_static(b"audio")],
            hold_open: true,
        }));
        h.coordinator.start_session("7", None).unwrap();
        h.settle().await;
        assert_eq!(h.state(), PlaybackState::Playing);

        h.coordinator.start_session("7", Some(KITCHEN)).unwrap();
        h.resolve(Ok(ActionResponse::ProtocolInfo(vec![
            "http-get:*:audio/mpeg:*".into(),
            "http-get:*:audio/aac:DLNA.ORG_PN=AAC_ISO".into(),
        ])));

        match h.dispatcher.kinds().last() {
            Some(ActionKind::SetAvTransportUri { metadata, .. }) => {
                assert!(metadata.contains("http-get:*:audio/aac:DLNA.ORG_PN=AAC_ISO"));
            }
            other => panic!("unexpected action {:?}", other),
        }

        // Other radios keep the default
        h.resolve(Ok(ActionResponse::Done));
        h.resolve(Ok(ActionResponse::Done));
        h.coordinator.start_session("9", Some(KITCHEN)).unwrap();
        h.resolve(Ok(ActionResponse::Done)); // teardown Stop
        match h.dispatcher.kinds().last() {
            Some(ActionKind::SetAvTransportUri { metadata, .. }) => {
                assert!(metadata.contains("http-get:*:audio/mpeg:*"));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[tokio::test]
    async fn protocol_info_failure_falls_back_to_default() {
        let mut h = harness(Arc::new(PendingConnector));
        h.coordinator.start_session("7", Some(KITCHEN)).unwrap();
        h.resolve(Err(SoapError::Upnp {
            code: 401,
            description: "Invalid Action".into(),
        }));

        match h.dispatcher.kinds().last() {
            Some(ActionKind::SetAvTransportUri { metadata, .. }) => {
                assert!(metadata.contains("http-get:*:audio/mpeg:*"));
            }
            other => panic!("unexpected action {:?}", other),
        }
        assert_eq!(h.state(), PlaybackState::Preparing);
    }

    #[tokio::test]
    async fn remote_failure_clears_status() {
        let mut h = harness(Arc::new(PendingConnector));
        h.coordinator.start_session("7", Some(KITCHEN)).unwrap();
        h.resolve(Ok(ActionResponse::ProtocolInfo(vec![])));
        h.resolve(Err(SoapError::Upnp {
            code: 714,
            description: "Illegal MIME-type".into(),
        }));

        assert_eq!(h.state(), PlaybackState::Error);
        assert!(h.host.status().is_none());
        assert!(!h.host.is_foreground());
        assert_eq!(h.coordinator.snapshot().metadata.unwrap().title, "");
        // Nothing was playing, so no teardown Stop follows the failure
        assert!(!h.coordinator.snapshot().action_in_flight);
    }

    #[tokio::test]
    async fn new_session_stops_previous_renderer_and_ignores_its_result() {
        let mut h = harness(Arc::new(PendingConnector));
        h.play_remote("7");

        h.coordinator.start_session("9", None).unwrap();
        assert_eq!(h.dispatcher.kinds().last(), Some(&ActionKind::Stop));

        h.resolve(Ok(ActionResponse::Done));
        assert_eq!(h.state(), PlaybackState::Preparing);
        assert_eq!(h.coordinator.snapshot().media_id.as_deref(), Some("9"));
        assert!(!h.coordinator.snapshot().is_remote);
    }

    #[tokio::test]
    async fn purged_action_result_does_not_advance_new_session() {
        let mut h = harness(Arc::new(PendingConnector));
        h.coordinator.start_session("7", Some(KITCHEN)).unwrap();
        let stale = h.dispatcher.last_ticket();

        // Supersede while GetProtocolInfo is still out
        h.coordinator.start_session("9", Some(KITCHEN)).unwrap();
        assert_eq!(
            h.dispatcher.kinds(),
            vec![ActionKind::GetProtocolInfo, ActionKind::Stop]
        );

        h.coordinator
            .on_action_resolved(stale, Ok(ActionResponse::ProtocolInfo(vec![])));
        assert_eq!(h.dispatcher.kinds().len(), 2);

        h.resolve(Ok(ActionResponse::Done)); // teardown Stop
        assert_eq!(h.dispatcher.kinds().last(), Some(&ActionKind::GetProtocolInfo));
        assert_eq!(h.state(), PlaybackState::Preparing);
        assert_eq!(h.coordinator.snapshot().media_id.as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn remote_volume_reads_then_sets() {
        let mut h = harness(Arc::new(PendingConnector));
        h.play_remote("7");

        h.coordinator.adjust_volume(VolumeDirection::Raise);
        h.coordinator.adjust_volume(VolumeDirection::Lower);
        assert_eq!(h.dispatcher.kinds().last(), Some(&ActionKind::GetVolume));
        h.resolve(Ok(ActionResponse::Volume(40)));
        assert_eq!(h.dispatcher.kinds().last(), Some(&ActionKind::SetVolume(35)));
        h.resolve(Ok(ActionResponse::Done));

        h.coordinator.adjust_volume(VolumeDirection::Raise);
        assert_eq!(h.dispatcher.kinds().last(), Some(&ActionKind::SetVolume(40)));
        assert_eq!(h.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn lost_device_fails_session_without_teardown() {
        let mut h = harness(Arc::new(PendingConnector));
        h.play_remote("7");
        h.coordinator.adjust_volume(VolumeDirection::Raise);
        let dispatched = h.dispatcher.kinds().len();

        h.coordinator.device_lost(KITCHEN);

        assert_eq!(h.state(), PlaybackState::Error);
        assert!(h.host.status().is_none());
        assert_eq!(h.dispatcher.kinds().len(), dispatched);
        assert!(!h.coordinator.snapshot().action_in_flight);
    }

    #[tokio::test]
    async fn losing_an_unrelated_device_is_harmless() {
        let mut h = harness(Arc::new(PendingConnector));
        h.play_remote("7");
        h.coordinator.device_lost("uuid:elsewhere");
        assert_eq!(h.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn shutdown_releases_everything() {
        let mut h = harness(Arc::new(PendingConnector));
        h.play_remote("7");

        h.coordinator.shutdown();
        assert!(h.host.status().is_none());
        assert!(!h.host.is_foreground());
        assert!(!h.coordinator.snapshot().action_in_flight);
        assert!(matches!(
            h.coordinator.start_session("7", None),
            Err(CastError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn handle_round_trips_through_the_task() {
        let h = harness(Arc::new(PendingConnector));
        let handle = h.coordinator.handle();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(h.coordinator.run(h.rx, cancel.clone()));

        assert!(matches!(
            handle.start_session("7", Some("nowhere".into())).await,
            Err(CastError::DeviceNotFound(_))
        ));
        handle.start_session("7", None).await.unwrap();
        assert_eq!(handle.snapshot().await.unwrap().state, PlaybackState::Preparing);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(matches!(handle.play().await, Err(CastError::Internal(_))));
    }
}
