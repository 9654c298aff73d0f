//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than concrete broadcast
//! channels, enabling testing and alternative transport implementations.

use super::{DeviceEvent, PlaybackEvent, StatusEvent};

/// Trait for emitting domain events without knowledge of transport.
///
/// Services use this trait to emit events, decoupling them from the
/// specifics of how events are delivered to clients (WebSocket, desktop shell, etc.).
pub trait EventEmitter: Send + Sync {
    /// Emits a playback session event.
    fn emit_playback(&self, event: PlaybackEvent);

    /// Emits a visible status event.
    fn emit_status(&self, event: StatusEvent);

    /// Emits a device visibility event.
    fn emit_device(&self, event: DeviceEvent);
}

/// No-op emitter for embedding or testing.
///
/// Events are silently discarded.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_playback(&self, _event: PlaybackEvent) {}

    fn emit_status(&self, _event: StatusEvent) {}

    fn emit_device(&self, _event: DeviceEvent) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_playback(&self, event: PlaybackEvent) {
        tracing::debug!(?event, "playback_event");
    }

    fn emit_status(&self, event: StatusEvent) {
        tracing::debug!(?event, "status_event");
    }

    fn emit_device(&self, event: DeviceEvent) {
        tracing::debug!(?event, "device_event");
    }
}
