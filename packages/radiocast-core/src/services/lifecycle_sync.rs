//! Maps playback state onto process visibility.
//!
//! | State                              | Foreground | Status                   |
//! |------------------------------------|------------|--------------------------|
//! | PREPARING / BUFFERING / PLAYING / PAUSED | yes  | shown, refreshed         |
//! | ERROR (local output)               | no         | kept, with Retry         |
//! | ERROR (renderer) / STOPPED / NONE  | no         | cleared                  |
//!
//! When the status is cleared and no session ever reached PLAYING, the host
//! is asked to stop itself.

use std::sync::Arc;

use crate::events::{EventEmitter, StatusEvent};
use crate::lifecycle::{ProcessHost, StatusAffordance, StatusSnapshot};
use crate::services::session::{PlaybackState, SessionMetadata};
use crate::utils::now_millis;

pub struct LifecycleSynchronizer {
    host: Arc<dyn ProcessHost>,
    emitter: Arc<dyn EventEmitter>,
    foreground: bool,
    status: Option<StatusSnapshot>,
    ever_played: bool,
}

impl LifecycleSynchronizer {
    pub fn new(host: Arc<dyn ProcessHost>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            host,
            emitter,
            foreground: false,
            status: None,
            ever_played: false,
        }
    }

    /// Applies the visibility rules for `state`.
    ///
    /// Called on every accepted transition and every metadata report.
    pub fn reconcile(&mut self, state: PlaybackState, is_remote: bool, metadata: &SessionMetadata) {
        if state == PlaybackState::Playing {
            self.ever_played = true;
        }

        match state {
            s if s.is_active() => {
                if !self.foreground {
                    self.foreground = true;
                    self.host.enter_foreground();
                }
                let affordance = match s {
                    PlaybackState::Playing if is_remote => StatusAffordance::Stop,
                    PlaybackState::Playing => StatusAffordance::Pause,
                    PlaybackState::Paused => StatusAffordance::Play,
                    _ => StatusAffordance::Stop,
                };
                self.show(metadata, affordance, s == PlaybackState::Playing);
            }
            PlaybackState::Error if !is_remote => {
                self.leave_foreground();
                self.show(metadata, StatusAffordance::Retry, false);
            }
            _ => {
                self.leave_foreground();
                self.clear();
                if !self.ever_played {
                    self.host.request_stop_self();
                }
            }
        }
    }

    /// Leaves foreground and removes the status unconditionally.
    pub fn shutdown(&mut self) {
        self.leave_foreground();
        self.clear();
    }

    /// Currently visible status.
    pub fn status(&self) -> Option<&StatusSnapshot> {
        self.status.as_ref()
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }

    fn show(&mut self, metadata: &SessionMetadata, affordance: StatusAffordance, ongoing: bool) {
        let snapshot = StatusSnapshot {
            title: metadata.title.clone(),
            subtitle: metadata.subtitle.clone().or_else(|| metadata.rate_text()),
            icon: metadata.artwork.clone(),
            affordance,
            ongoing,
        };
        if self.status.as_ref() == Some(&snapshot) {
            return;
        }
        self.host.publish_status(Some(&snapshot));
        self.emitter.emit_status(StatusEvent::Updated {
            status: snapshot.clone(),
            foreground: self.foreground,
            timestamp: now_millis(),
        });
        self.status = Some(snapshot);
    }

    fn clear(&mut self) {
        if self.status.take().is_some() {
            self.host.publish_status(None);
            self.emitter.emit_status(StatusEvent::Cleared {
                timestamp: now_millis(),
            });
        }
    }

    fn leave_foreground(&mut self) {
        if self.foreground {
            self.foreground = false;
            self.host.exit_foreground();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventEmitter;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingHost {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.calls.lock())
        }
    }

    impl ProcessHost for RecordingHost {
        fn enter_foreground(&self) {
            self.calls.lock().push("enter".into());
        }
        fn exit_foreground(&self) {
            self.calls.lock().push("exit".into());
        }
        fn publish_status(&self, status: Option<&StatusSnapshot>) {
            self.calls.lock().push(match status {
                Some(s) => format!("status:{}:{:?}", s.title, s.affordance),
                None => "clear".into(),
            });
        }
        fn request_stop_self(&self) {
            self.calls.lock().push("stop-self".into());
        }
    }

    fn setup() -> (LifecycleSynchronizer, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        (
            LifecycleSynchronizer::new(host.clone(), Arc::new(NoopEventEmitter)),
            host,
        )
    }

    fn meta() -> SessionMetadata {
        SessionMetadata {
            title: "Jazz".into(),
            ..Default::default()
        }
    }

    #[test]
    fn active_states_enter_foreground_once() {
        let (mut sync, host) = setup();
        sync.reconcile(PlaybackState::Preparing, false, &meta());
        sync.reconcile(PlaybackState::Buffering, false, &meta());
        sync.reconcile(PlaybackState::Playing, false, &meta());

        assert_eq!(
            host.take(),
            vec!["enter", "status:Jazz:Stop", "status:Jazz:Pause"]
        );
        assert!(sync.is_foreground());
        assert!(sync.status().unwrap().ongoing);
    }

    #[test]
    fn remote_playing_offers_stop_and_paused_offers_play() {
        let (mut sync, _host) = setup();
        sync.reconcile(PlaybackState::Playing, true, &meta());
        assert_eq!(sync.status().unwrap().affordance, StatusAffordance::Stop);

        sync.reconcile(PlaybackState::Paused, false, &meta());
        assert_eq!(sync.status().unwrap().affordance, StatusAffordance::Play);
        assert!(!sync.status().unwrap().ongoing);
    }

    #[test]
    fn local_error_keeps_status_with_retry() {
        let (mut sync, host) = setup();
        sync.reconcile(PlaybackState::Playing, false, &meta());
        host.take();

        sync.reconcile(PlaybackState::Error, false, &meta());
        assert_eq!(host.take(), vec!["exit", "status:Jazz:Retry"]);
        assert!(!sync.is_foreground());
        assert_eq!(sync.status().unwrap().affordance, StatusAffordance::Retry);
    }

    #[test]
    fn remote_error_clears_status() {
        let (mut sync, host) = setup();
        sync.reconcile(PlaybackState::Playing, true, &meta());
        host.take();

        sync.reconcile(PlaybackState::Error, true, &meta());
        assert_eq!(host.take(), vec!["exit", "clear"]);
        assert!(sync.status().is_none());
    }

    #[test]
    fn stop_before_any_playback_requests_stop_self() {
        let (mut sync, host) = setup();
        sync.reconcile(PlaybackState::Preparing, false, &meta());
        host.take();

        sync.reconcile(PlaybackState::Stopped, false, &meta());
        assert_eq!(host.take(), vec!["exit", "clear", "stop-self"]);
    }

    #[test]
    fn stop_after_playback_keeps_process() {
        let (mut sync, host) = setup();
        sync.reconcile(PlaybackState::Playing, false, &meta());
        host.take();

        sync.reconcile(PlaybackState::Stopped, false, &meta());
        assert_eq!(host.take(), vec!["exit", "clear"]);
    }

    #[test]
    fn metadata_refresh_republishes_status() {
        let (mut sync, host) = setup();
        sync.reconcile(PlaybackState::Playing, false, &meta());
        host.take();

        let mut m = meta();
        m.subtitle = Some("So What".into());
        sync.reconcile(PlaybackState::Playing, false, &m);
        sync.reconcile(PlaybackState::Playing, false, &m);

        assert_eq!(host.take(), vec!["status:Jazz:Pause"]);
        assert_eq!(sync.status().unwrap().subtitle.as_deref(), Some("So What"));
    }
}
