//! UPnP MediaRenderer control.
//!
//! - [`soap`]: envelope building and HTTP transport
//! - [`transport`]: typed renderer actions and the [`RemoteTransport`] seam
//! - [`device`]: device identity, control URLs and the live registry
//! - [`didl`]: DIDL-Lite metadata sent with `SetAVTransportURI`

pub mod device;
pub(crate) mod didl;
pub(crate) mod retry;
pub mod services;
pub mod soap;
pub mod transport;

pub use device::{ControlUrls, DeviceChange, DeviceDiscovery, DeviceRegistry, RendererDevice};
pub use services::UpnpService;
pub use soap::{SoapError, SoapRequestBuilder, SoapResult};
pub use transport::{ActionKind, ActionResponse, RemoteTransport, SoapTransport};
