//! Radio station library.
//!
//! Persistent storage of stations belongs to the embedding application; the
//! coordinator only needs to look a station up by its media identifier.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::DEFAULT_RADIO_MIME;

/// A playable radio station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Radio {
    /// Media identifier used by `start_session`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Stream URL.
    pub url: String,
    /// Artwork reference shown with the status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    /// Stream MIME type, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Radio {
    /// MIME type to advertise to renderers: the configured one, else the one
    /// the stream announced, else `audio/mpeg`.
    #[must_use]
    pub fn mime_type_or<'a>(&'a self, announced: Option<&'a str>) -> &'a str {
        self.mime_type
            .as_deref()
            .or(announced)
            .unwrap_or(DEFAULT_RADIO_MIME)
    }
}

/// Read access to the radio stations known to the application.
pub trait RadioLibrary: Send + Sync {
    /// Looks up a station by media identifier.
    fn get(&self, media_id: &str) -> Option<Radio>;

    /// Returns every station, in display order.
    fn radios(&self) -> Vec<Radio>;
}

/// Library backed by a fixed, in-memory list of stations.
#[derive(Debug, Default)]
pub struct InMemoryRadioLibrary {
    order: Vec<String>,
    radios: HashMap<String, Radio>,
}

impl InMemoryRadioLibrary {
    /// Creates a library from stations in display order.
    ///
    /// A later station with an already seen id replaces the earlier one.
    pub fn new(radios: impl IntoIterator<Item = Radio>) -> Self {
        let mut library = Self::default();
        for radio in radios {
            if library.radios.insert(radio.id.clone(), radio.clone()).is_none() {
                library.order.push(radio.id);
            } else {
                log::warn!("[Library] Duplicate radio id {}, keeping the last one", radio.id);
            }
        }
        library
    }
}

impl RadioLibrary for InMemoryRadioLibrary {
    fn get(&self, media_id: &str) -> Option<Radio> {
        self.radios.get(media_id).cloned()
    }

    fn radios(&self) -> Vec<Radio> {
        self.order
            .iter()
            .filter_map(|id| self.radios.get(id).cloned())
            .collect()
    }
}
