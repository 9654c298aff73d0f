//! Low-level SOAP protocol implementation for UPnP renderer communication.
//!
//! This module handles the raw SOAP envelope building, HTTP transport,
//! and XML response parsing. For the renderer actions built on top of it,
//! see `transport.rs`.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use super::services::UpnpService;
use crate::protocol_constants::{SOAP_TIMEOUT_SECS, UPNP_INSTANCE_ID};
use crate::utils::{escape_xml, extract_xml_text};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during SOAP operations with a rendering device.
#[derive(Debug, Error)]
pub enum SoapError {
    /// HTTP request to the device failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Device returned a non-success HTTP status without a SOAP fault.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Device returned a UPnP error inside a SOAP fault.
    #[error("UPnP error {code}: {description}")]
    Upnp { code: u16, description: String },

    /// Device returned a SOAP fault without a UPnP error code, or the
    /// request could not be built.
    #[error("SOAP fault: {0}")]
    Fault(String),

    /// Failed to parse SOAP response XML.
    #[error("Failed to parse SOAP response")]
    Parse,
}

/// Convenient Result alias for SOAP operations.
pub type SoapResult<T> = Result<T, SoapError>;

const TRANSIENT_UPNP_ERRORS: [u16; 2] = [701, 716];

impl SoapError {
    /// Returns true if this error is transient and the operation should be retried.
    ///
    /// Transient UPnP AVTransport error codes:
    /// - 701: Transition not available (device changing states)
    /// - 716: Resource not found (device busy initializing)
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            SoapError::Upnp { code, .. } => TRANSIENT_UPNP_ERRORS.contains(code),
            // Network timeouts can also be transient
            SoapError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request/Response
// ─────────────────────────────────────────────────────────────────────────────

/// Builds the SOAP envelope for an action.
///
/// The envelope is a single line with no leading whitespace; some renderer
/// SOAP parsers reject XML with whitespace before the root element.
pub(crate) fn build_envelope(service: &str, action: &str, args: &[(&str, &str)]) -> String {
    let mut body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{} xmlns:u="{}">"#,
        action, service
    );

    for (k, v) in args {
        body.push_str(&format!("<{k}>{}</{k}>", escape_xml(v)));
    }

    body.push_str(&format!(r#"</u:{}></s:Body></s:Envelope>"#, action));
    body
}

/// Sends a SOAP request to a rendering device.
///
/// This is the core transport function for all UPnP SOAP operations.
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `control_url` - Absolute control URL of the target service
/// * `service` - The UPnP service URN
/// * `action` - The SOAP action name (e.g., "Play", "Stop", "GetVolume")
/// * `args` - Key-value pairs for action arguments (order is preserved)
///
/// # Returns
/// The response body on success, or a `SoapError` if the request fails
/// or the device returns a SOAP fault.
pub async fn send_soap_request(
    client: &Client,
    control_url: &str,
    service: &str,
    action: &str,
    args: &[(&str, &str)],
) -> SoapResult<String> {
    let body = build_envelope(service, action, args);

    log::info!("[SOAP] {} -> {} (body: {} bytes)", action, control_url, body.len());
    log::debug!("[SOAP] Request body: {}", body);

    let start = std::time::Instant::now();
    let res = client
        .post(control_url)
        .header("Content-Type", "text/xml; charset=\"utf-8\"")
        .header("SOAPAction", format!("\"{}#{}\"", service, action))
        .body(body)
        .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
        .send()
        .await;

    log::info!(
        "[SOAP] {} completed in {:?}: {:?}",
        action,
        start.elapsed(),
        res.as_ref().map(|r| r.status())
    );

    let res = res?;
    let status = res.status();
    let response_text = res.text().await?;

    // SOAP faults usually come with a 500 status, so check them first
    if response_text.contains("Fault>") {
        return Err(parse_fault(&response_text));
    }

    if !status.is_success() {
        return Err(SoapError::HttpStatus(status.as_u16(), response_text));
    }

    Ok(response_text)
}

/// Builds the error for a fault body, keeping the UPnP error code when present.
fn parse_fault(xml: &str) -> SoapError {
    let description = extract_xml_text(xml, "errorDescription")
        .or_else(|| extract_xml_text(xml, "faultstring"))
        .unwrap_or_else(|| "Unknown SOAP fault".to_string());
    match extract_xml_text(xml, "errorCode").and_then(|c| c.trim().parse().ok()) {
        Some(code) => SoapError::Upnp { code, description },
        None => SoapError::Fault(description),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for constructing and sending SOAP requests to a rendering device.
///
/// # Example
/// ```ignore
/// let response = SoapRequestBuilder::new(&client, &device.control_url(UpnpService::AVTransport))
///     .service(UpnpService::AVTransport)
///     .action("Play")
///     .instance_id()
///     .arg("Speed", "1")
///     .send()
///     .await?;
/// ```
pub struct SoapRequestBuilder<'a> {
    client: &'a Client,
    control_url: &'a str,
    service: Option<UpnpService>,
    action: Option<&'a str>,
    args: Vec<(&'a str, String)>,
}

impl<'a> SoapRequestBuilder<'a> {
    /// Creates a new SOAP request builder targeting `control_url`.
    #[must_use]
    pub fn new(client: &'a Client, control_url: &'a str) -> Self {
        Self {
            client,
            control_url,
            service: None,
            action: None,
            args: Vec::new(),
        }
    }

    /// Sets the UPnP service for this request.
    #[must_use]
    pub fn service(mut self, service: UpnpService) -> Self {
        self.service = Some(service);
        self
    }

    /// Sets the SOAP action name.
    #[must_use]
    pub fn action(mut self, action: &'a str) -> Self {
        self.action = Some(action);
        self
    }

    /// Adds an argument to the SOAP request.
    ///
    /// Arguments are included in the SOAP body in the order they are added.
    #[must_use]
    pub fn arg(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.args.push((key, value.into()));
        self
    }

    /// Adds the standard InstanceID="0" argument used by most renderer actions.
    #[must_use]
    pub fn instance_id(self) -> Self {
        self.arg("InstanceID", UPNP_INSTANCE_ID)
    }

    /// Sends the SOAP request and returns the response body.
    ///
    /// # Errors
    /// Returns `SoapError` if the service or action is not set, or if the
    /// request fails.
    pub async fn send(self) -> SoapResult<String> {
        let service = self
            .service
            .ok_or_else(|| SoapError::Fault("SoapRequestBuilder: service not set".into()))?;
        let action = self
            .action
            .ok_or_else(|| SoapError::Fault("SoapRequestBuilder: action not set".into()))?;

        let args: Vec<(&str, &str)> = self.args.iter().map(|(k, v)| (*k, v.as_str())).collect();

        send_soap_request(self.client, self.control_url, service.urn(), action, &args).await
    }
}
