//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external specifications (UPnP, ICY) or by
//! the wiring between services, and changing them would break compatibility.

// ─────────────────────────────────────────────────────────────────────────────
// HTTP/SOAP
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for SOAP HTTP requests (seconds).
///
/// 10 seconds is reasonable for LAN operations.
pub const SOAP_TIMEOUT_SECS: u64 = 10;

/// UPnP AVTransport/RenderingControl instance used by every renderer action.
pub const UPNP_INSTANCE_ID: &str = "0";

/// Fallback MIME type when neither the radio nor the renderer tells us better.
pub const DEFAULT_RADIO_MIME: &str = "audio/mpeg";

// ─────────────────────────────────────────────────────────────────────────────
// ICY Protocol (Shoutcast/Icecast metadata)
// ─────────────────────────────────────────────────────────────────────────────

/// Request header asking a radio server to interleave ICY metadata.
pub const ICY_METADATA_HEADER: &str = "Icy-MetaData";

/// Response header carrying the number of audio bytes between metadata blocks.
pub const ICY_METAINT_HEADER: &str = "icy-metaint";

/// Response header carrying the nominal stream bitrate (kbit/s).
pub const ICY_BITRATE_HEADER: &str = "icy-br";

/// Each ICY metadata length byte counts blocks of this many bytes.
pub const ICY_BLOCK_SIZE: usize = 16;

// ─────────────────────────────────────────────────────────────────────────────
// Channels
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity of the broadcast channel for outbound events.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Capacity of the device change broadcast channel.
pub const DEVICE_CHANNEL_CAPACITY: usize = 32;

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used in protocol data (DIDL-Lite metadata, health endpoint).
pub const APP_NAME: &str = "Radiocast";

/// Service identifier reported by the health endpoint.
pub const SERVICE_ID: &str = "radiocast";
