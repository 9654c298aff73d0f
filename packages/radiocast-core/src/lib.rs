//! Radiocast Core - playback coordination for internet radio.
//!
//! This crate plays internet radio stations either on local output or on a
//! UPnP MediaRenderer on the network, and keeps exactly one playback session
//! authoritative at any time. It is used by the standalone server and can be
//! embedded by other hosts.
//!
//! # Architecture
//!
//! - [`services`]: session model, player adapters, renderer action queue and
//!   the [`PlaybackCoordinator`](services::PlaybackCoordinator)
//! - [`renderer`]: UPnP renderer control (SOAP, DIDL-Lite, device registry)
//! - [`stream`]: radio stream fetching and ICY metadata demultiplexing
//! - [`library`]: the radio catalog
//! - [`lifecycle`]: process visibility driven by playback
//! - [`events`]: event system for real-time client communication
//! - [`api`]: HTTP/WebSocket surface
//! - [`state`]: configuration
//! - [`error`]: centralized error types
//!
//! # Abstraction Traits
//!
//! Core logic is decoupled from its environment through:
//!
//! - [`TaskSpawner`](runtime::TaskSpawner): spawning background tasks
//! - [`EventEmitter`](events::EventEmitter): emitting domain events
//! - [`ProcessHost`](lifecycle::ProcessHost): foreground mode and status display
//! - [`RemoteTransport`](renderer::RemoteTransport) and
//!   [`ActionDispatcher`](services::ActionDispatcher): renderer control
//! - [`StreamConnector`](stream::StreamConnector) and
//!   [`AudioSink`](stream::AudioSink): local playback
//!
//! Each trait has an implementation suitable for the standalone server.

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod error;
pub mod events;
pub mod library;
pub mod lifecycle;
pub mod protocol_constants;
pub mod renderer;
pub mod runtime;
pub mod services;
pub mod state;
pub mod stream;
pub mod utils;

// Re-export commonly used types at the crate root
pub use error::{CastError, CastResult, ErrorCode, SoapResult};
pub use events::{BroadcastEvent, BroadcastEventBridge, EventEmitter};
pub use library::{InMemoryRadioLibrary, Radio, RadioLibrary};
pub use lifecycle::{ProcessHost, ServerHost, StatusAffordance, StatusSnapshot};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use state::Config;
pub use utils::now_millis;

// Re-export renderer types
pub use renderer::{DeviceDiscovery, DeviceRegistry, RendererDevice};

// Re-export service types
pub use services::{
    CoordinatorHandle, CoordinatorSnapshot, PlaybackCoordinator, PlaybackState, PlaylistEntry,
    SessionToken, VolumeDirection,
};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, ServerError};
