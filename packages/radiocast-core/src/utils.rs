//! General utilities shared across the application.

use std::time::{SystemTime, UNIX_EPOCH};

use quick_xml::events::Event;
use quick_xml::reader::Reader;

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// XML Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Escapes the five XML special characters (`& < > " '`).
///
/// Used for SOAP arguments and DIDL-Lite values.
#[must_use]
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Extracts and unescapes the text content of the first `element_name` element.
///
/// Matches on the local name, so `<Sink>` and `<u:Sink>` both match `"Sink"`.
/// An empty element (`<Sink/>`) yields an empty string.
#[must_use]
pub fn extract_xml_text(xml: &str, element_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let target = element_name.as_bytes();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == target => {
                let text = reader.read_text(e.name()).ok()?;
                return Some(html_escape::decode_html_entities(&text).into_owned());
            }
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == target => {
                return Some(String::new());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}
