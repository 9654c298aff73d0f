//! Radio stream acquisition for the local player.
//!
//! The local adapter only sees the [`StreamConnector`] and [`RadioStream`]
//! traits; [`HttpStreamConnector`] is the production implementation and
//! tests substitute scripted streams.

pub mod icy;
pub mod sink;

pub use icy::{DemuxedChunk, IcyDemuxer};
pub use sink::{AudioSink, NullSink};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use thiserror::Error;

use crate::protocol_constants::{ICY_BITRATE_HEADER, ICY_METADATA_HEADER, ICY_METAINT_HEADER};

/// Errors raised while fetching a radio stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// HTTP request (or body read) failed.
    #[error("Stream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("Stream server returned HTTP {0}")]
    HttpStatus(u16),

    /// Server closed the stream.
    #[error("Stream ended")]
    Ended,
}

/// Stream properties announced in the response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    /// Audio bytes between ICY metadata blocks.
    pub metaint: Option<usize>,
    /// Nominal bitrate in kbit/s (`icy-br`).
    pub bitrate_kbps: Option<u32>,
    /// Response content type.
    pub content_type: Option<String>,
}

impl StreamInfo {
    /// Reads ICY properties from response headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        };
        Self {
            metaint: text(ICY_METAINT_HEADER).and_then(|v| v.parse().ok()),
            // Some servers send "128,128" for multi-rate streams
            bitrate_kbps: text(ICY_BITRATE_HEADER)
                .and_then(|v| v.split(',').next().and_then(|b| b.trim().parse().ok())),
            content_type: text("content-type"),
        }
    }

    /// The announced audio MIME type without parameters, lowercased.
    /// `None` for missing, generic or non-audio content types.
    pub fn mime_type(&self) -> Option<String> {
        let essence = self
            .content_type
            .as_deref()?
            .split(';')
            .next()?
            .trim()
            .to_ascii_lowercase();
        let audio = essence.starts_with("audio/")
            || (essence.starts_with("application/") && essence != "application/octet-stream");
        audio.then_some(essence)
    }
}

/// An open radio stream.
#[async_trait]
pub trait RadioStream: Send {
    /// Properties announced when the stream was opened.
    fn info(&self) -> &StreamInfo;

    /// Returns the next raw chunk (audio and ICY metadata interleaved),
    /// or `None` once the server closes the stream.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError>;
}

/// Opens radio streams by URL.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Connects to `url`, returning once response headers have arrived.
    async fn connect(&self, url: &str) -> Result<Box<dyn RadioStream>, StreamError>;
}

/// HTTP(S) stream connector requesting ICY metadata.
#[derive(Clone)]
pub struct HttpStreamConnector {
    client: Client,
}

impl HttpStreamConnector {
    /// Creates a connector using `client`.
    ///
    /// The client must not carry a total request timeout: radio streams never
    /// end on their own.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamConnector for HttpStreamConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn RadioStream>, StreamError> {
        log::info!("[Stream] Connecting to {}", url);

        let response = self
            .client
            .get(url)
            .header(ICY_METADATA_HEADER, "1")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::HttpStatus(status.as_u16()));
        }

        let info = StreamInfo::from_headers(response.headers());
        log::info!(
            "[Stream] Connected: type={:?}, metaint={:?}, bitrate={:?}",
            info.content_type,
            info.metaint,
            info.bitrate_kbps
        );

        Ok(Box::new(HttpRadioStream { response, info }))
    }
}

struct HttpRadioStream {
    response: Response,
    info: StreamInfo,
}

#[async_trait]
impl RadioStream for HttpRadioStream {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        Ok(self.response.chunk().await?)
    }
}
