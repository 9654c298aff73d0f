//! Remote transport: turns a renderer action into a SOAP exchange.
//!
//! The action queue only depends on the [`RemoteTransport`] contract: given a
//! device and an action, eventually succeed with a response or fail.

use async_trait::async_trait;
use reqwest::Client;

use super::device::RendererDevice;
use super::retry::with_retry;
use super::services::UpnpService;
use super::soap::{SoapError, SoapRequestBuilder};
use crate::error::SoapResult;
use crate::utils::extract_xml_text;

/// One command destined for a rendering device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// `ConnectionManager#GetProtocolInfo`: learn which formats the sink accepts.
    GetProtocolInfo,
    /// `AVTransport#SetAVTransportURI`: load the radio stream.
    SetAvTransportUri {
        /// Stream URL the renderer will fetch.
        uri: String,
        /// DIDL-Lite description of the stream.
        metadata: String,
    },
    /// `AVTransport#Play`.
    Play,
    /// `AVTransport#Stop`.
    Stop,
    /// `RenderingControl#GetVolume` on the master channel.
    GetVolume,
    /// `RenderingControl#SetVolume` on the master channel (0-100).
    SetVolume(u8),
}

impl ActionKind {
    /// UPnP action name, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetProtocolInfo => "GetProtocolInfo",
            Self::SetAvTransportUri { .. } => "SetAVTransportURI",
            Self::Play => "Play",
            Self::Stop => "Stop",
            Self::GetVolume => "GetVolume",
            Self::SetVolume(_) => "SetVolume",
        }
    }

    /// Service the action belongs to.
    #[must_use]
    pub fn service(&self) -> UpnpService {
        match self {
            Self::GetProtocolInfo => UpnpService::ConnectionManager,
            Self::SetAvTransportUri { .. } | Self::Play | Self::Stop => UpnpService::AVTransport,
            Self::GetVolume | Self::SetVolume(_) => UpnpService::RenderingControl,
        }
    }
}

/// Parsed result of a successful action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResponse {
    /// The action has no output worth keeping.
    Done,
    /// Sink protocols advertised by the renderer.
    ProtocolInfo(Vec<String>),
    /// Current master volume (0-100).
    Volume(u8),
}

/// Executes renderer actions.
///
/// Implementations must always complete, successfully or not: the action
/// queue waits for the result before dispatching the next command.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Executes a single action against `device`.
    async fn execute(&self, device: &RendererDevice, action: &ActionKind)
        -> SoapResult<ActionResponse>;
}

/// SOAP-over-HTTP transport for UPnP MediaRenderers.
#[derive(Clone)]
pub struct SoapTransport {
    client: Client,
}

impl SoapTransport {
    /// Creates a transport sharing the given HTTP client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteTransport for SoapTransport {
    async fn execute(
        &self,
        device: &RendererDevice,
        action: &ActionKind,
    ) -> SoapResult<ActionResponse> {
        let service = action.service();
        let control_url = device.control_url(service);
        let client = &self.client;

        log::info!("[Renderer] {} -> {} ({})", action.name(), device.name, device.id);

        let response = with_retry(action.name(), || {
            let builder = SoapRequestBuilder::new(client, control_url)
                .service(service)
                .action(action.name());
            match action {
                ActionKind::GetProtocolInfo => builder.send(),
                ActionKind::SetAvTransportUri { uri, metadata } => builder
                    .instance_id()
                    .arg("CurrentURI", uri.as_str())
                    .arg("CurrentURIMetaData", metadata.as_str())
                    .send(),
                ActionKind::Play => builder.instance_id().arg("Speed", "1").send(),
                ActionKind::Stop => builder.instance_id().send(),
                ActionKind::GetVolume => builder.instance_id().arg("Channel", "Master").send(),
                ActionKind::SetVolume(volume) => builder
                    .instance_id()
                    .arg("Channel", "Master")
                    .arg("DesiredVolume", (*volume).min(100).to_string())
                    .send(),
            }
        })
        .await?;

        parse_response(action, &response)
    }
}

/// Extracts the useful part of a SOAP response body.
pub(crate) fn parse_response(action: &ActionKind, body: &str) -> SoapResult<ActionResponse> {
    match action {
        ActionKind::GetProtocolInfo => {
            let sink = extract_xml_text(body, "Sink").ok_or(SoapError::Parse)?;
            Ok(ActionResponse::ProtocolInfo(
                sink.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect(),
            ))
        }
        ActionKind::GetVolume => {
            let volume = extract_xml_text(body, "CurrentVolume").ok_or(SoapError::Parse)?;
            let volume: u16 = volume.trim().parse().map_err(|_| SoapError::Parse)?;
            Ok(ActionResponse::Volume(volume.min(100) as u8))
        }
        _ => Ok(ActionResponse::Done),
    }
}
