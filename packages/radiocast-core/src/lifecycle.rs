//! Process visibility abstraction.
//!
//! This module provides a [`ProcessHost`] trait for the process-level effects
//! of playback: running in foreground mode with a visible status while media
//! is active, and dropping back to the background otherwise. Different
//! implementations handle these operations for their environment (a desktop
//! shell with a notification area vs the standalone server).

use parking_lot::RwLock;
use serde::Serialize;

/// Action offered next to the visible status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusAffordance {
    Play,
    Pause,
    Stop,
    /// Restart the failed session.
    Retry,
}

/// Content of the always-visible status display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub title: String,
    pub subtitle: Option<String>,
    pub icon: Option<String>,
    pub affordance: StatusAffordance,
    /// Whether the status may be dismissed by the user (`false`) or not.
    pub ongoing: bool,
}

/// Trait for process lifecycle operations driven by playback.
///
/// # Example
///
/// ```ignore
/// struct TrayHost { tray: TrayIcon }
///
/// impl ProcessHost for TrayHost {
///     fn publish_status(&self, status: Option<&StatusSnapshot>) {
///         self.tray.set_tooltip(status.map(|s| s.title.as_str()));
///     }
///     // ...
/// }
/// ```
pub trait ProcessHost: Send + Sync {
    /// Enters foreground-with-visible-status mode.
    fn enter_foreground(&self);

    /// Leaves foreground mode. The status may stay visible.
    fn exit_foreground(&self);

    /// Shows (`Some`) or removes (`None`) the visible status.
    fn publish_status(&self, status: Option<&StatusSnapshot>);

    /// Asks the process to terminate itself once idle.
    ///
    /// Only requested when no session ever reached playback.
    fn request_stop_self(&self);
}

/// Host implementation for the standalone server.
///
/// The server has no status display of its own: it logs transitions and
/// keeps the latest status so the HTTP API can serve it. Stop-self requests
/// are ignored because the server outlives individual playback attempts.
#[derive(Default)]
pub struct ServerHost {
    status: RwLock<Option<StatusSnapshot>>,
    foreground: RwLock<bool>,
}

impl ServerHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest published status.
    pub fn status(&self) -> Option<StatusSnapshot> {
        self.status.read().clone()
    }

    pub fn is_foreground(&self) -> bool {
        *self.foreground.read()
    }
}

impl ProcessHost for ServerHost {
    fn enter_foreground(&self) {
        log::info!("[Lifecycle] Entering foreground");
        *self.foreground.write() = true;
    }

    fn exit_foreground(&self) {
        log::info!("[Lifecycle] Leaving foreground");
        *self.foreground.write() = false;
    }

    fn publish_status(&self, status: Option<&StatusSnapshot>) {
        match status {
            Some(s) => log::info!(
                "[Lifecycle] Status: {} / {} [{:?}]",
                s.title,
                s.subtitle.as_deref().unwrap_or("-"),
                s.affordance
            ),
            None => log::info!("[Lifecycle] Status cleared"),
        }
        *self.status.write() = status.cloned();
    }

    fn request_stop_self(&self) {
        log::info!("[Lifecycle] Stop-self requested, server keeps running");
    }
}
