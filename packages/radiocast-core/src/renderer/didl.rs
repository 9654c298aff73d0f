//! DIDL-Lite metadata formatting for renderer display.
//!
//! Creates the XML metadata structure sent with `SetAVTransportURI` so the
//! renderer can show the radio name and artwork.

use crate::library::Radio;
use crate::protocol_constants::APP_NAME;
use crate::utils::escape_xml;

/// Formats DIDL-Lite metadata XML for a radio broadcast.
///
/// The item is classed as `object.item.audioItem.audioBroadcast`, the title
/// is the radio name and the creator is the application name. Track
/// information is not included: it changes continuously and renderers read
/// it from the stream itself.
pub(crate) fn format_didl_lite(radio: &Radio, protocol_info: &str) -> String {
    log::debug!(
        "[DIDL] Formatting radio={:?}, protocolInfo={}, icon={:?}",
        radio.name,
        protocol_info,
        radio.icon_url
    );

    let mut didl = String::from(
        r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">"#,
    );
    didl.push_str(&format!(
        r#"<item id="{}" parentID="0" restricted="1">"#,
        escape_xml(&radio.id)
    ));
    didl.push_str(&format!("<dc:title>{}</dc:title>", escape_xml(&radio.name)));
    didl.push_str(&format!("<dc:creator>{}</dc:creator>", escape_xml(APP_NAME)));
    didl.push_str("<upnp:class>object.item.audioItem.audioBroadcast</upnp:class>");

    if let Some(icon) = &radio.icon_url {
        didl.push_str(&format!(
            "<upnp:albumArtURI>{}</upnp:albumArtURI>",
            escape_xml(icon)
        ));
    }

    didl.push_str(&format!(
        r#"<res protocolInfo="{}">{}</res>"#,
        escape_xml(protocol_info),
        escape_xml(&radio.url)
    ));
    didl.push_str("</item>");
    didl.push_str("</DIDL-Lite>");

    didl
}

/// Picks the renderer sink protocol matching `mime_type`.
///
/// Falls back to a generic `http-get` protocol when the renderer did not
/// advertise one (or when its capabilities are still unknown).
pub(crate) fn select_protocol_info(sink_protocols: &[String], mime_type: &str) -> String {
    sink_protocols
        .iter()
        .find(|p| {
            p.starts_with("http-get:")
                && p.split(':').nth(2).is_some_and(|mime| mime.eq_ignore_ascii_case(mime_type))
        })
        .cloned()
        .unwrap_or_else(|| format!("http-get:*:{}:*", mime_type))
}
