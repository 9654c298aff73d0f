//! Application services layer.
//!
//! This module contains the playback logic that sits between the API layer
//! and infrastructure (renderer/, stream/): sessions, player adapters, the
//! renderer action queue and the coordinator that ties them together.

pub mod action_queue;
pub mod coordinator;
pub mod lifecycle_sync;
pub mod player;
pub mod session;

pub use action_queue::{ActionDispatcher, ActionQueue, RemoteAction, TransportDispatcher};
pub use coordinator::{
    Command, CoordinatorDeps, CoordinatorHandle, CoordinatorSnapshot, PlaybackCoordinator,
};
pub use lifecycle_sync::LifecycleSynchronizer;
pub use player::{PlayerAdapter, PlayerContext, Reporter, VolumeDirection};
pub use session::{
    MetadataUpdate, PlaybackState, PlaylistEntry, PlaylistHistory, Session, SessionMetadata,
    SessionToken,
};
