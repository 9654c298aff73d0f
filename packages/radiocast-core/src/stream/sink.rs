//! Audio output seam for the local player.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

/// Destination for decoded-or-raw radio audio.
///
/// Volume is a 0-100 level owned by the sink.
pub trait AudioSink: Send + Sync {
    /// Accepts the next audio chunk.
    fn write(&self, audio: &[u8]);

    /// Pauses or resumes output.
    fn set_paused(&self, paused: bool);

    /// Current output level.
    fn volume(&self) -> u8;

    /// Sets the output level (clamped to 100).
    fn set_volume(&self, level: u8);
}

/// Sink that discards audio while tracking what it was asked to do.
///
/// Used by the headless server, which coordinates playback without owning
/// an audio device.
pub struct NullSink {
    bytes_written: AtomicU64,
    paused: AtomicBool,
    volume: AtomicU8,
}

impl NullSink {
    /// Creates a sink at the given initial volume.
    pub fn new(volume: u8) -> Self {
        Self {
            bytes_written: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            volume: AtomicU8::new(volume.min(100)),
        }
    }

    /// Total audio bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new(50)
    }
}

impl AudioSink for NullSink {
    fn write(&self, audio: &[u8]) {
        self.bytes_written
            .fetch_add(audio.len() as u64, Ordering::Relaxed);
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }

    fn set_volume(&self, level: u8) {
        self.volume.store(level.min(100), Ordering::Relaxed);
    }
}
