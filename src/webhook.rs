use serde::Deserialize;
use serde_json::{Map, Value};
use serde_with::{DefaultOnError, DisplayFromStr, PickFirst, serde_as};

const REQUESTED_SEASONS_FIELD: &str = "Requested Seasons";

/// Media kind discriminator shared by notifications and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

/// Processing state of one quality profile of a request. Webhook payloads
/// carry these as upper-case strings; values the router does not react to
/// collapse into `Other` instead of rejecting the notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Pending,
    Processing,
    PartiallyAvailable,
    Available,
    NotRequested,
    #[default]
    #[serde(other)]
    Other,
}

/// An inbound media-request notification, already shape-validated by the
/// time the filter engine sees it. The `request` record stays an open map
/// so generic conditions can look up any requester field by name.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestWebhook {
    #[serde(default)]
    pub notification_type: Option<String>,
    pub media: MediaPayload,
    pub request: Map<String, Value>,
    #[serde(default)]
    pub extra: Vec<ExtraField>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    pub media_type: MediaType,
    // Request managers template this as a string ("603"), sometimes as a
    // bare number, and send "" when the id is unknown.
    #[serde(rename = "tmdbId", default)]
    #[serde_as(deserialize_as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub tmdb_id: Option<i64>,
    #[serde(default)]
    pub status: MediaStatus,
    #[serde(rename = "status4k", default)]
    pub status_4k: MediaStatus,
}

/// One free-form name/value pair from the notification's `extra` list.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtraField {
    pub name: String,
    pub value: String,
}

impl RequestWebhook {
    /// Season numbers listed in the "Requested Seasons" extra entry.
    ///
    /// Only episodic media carries seasons: movies yield `None` even when
    /// the entry is present. `None` likewise when the entry is absent (as
    /// opposed to an empty list for a present-but-blank entry). Pieces of
    /// the entry that do not parse as integers are dropped.
    pub fn requested_seasons(&self) -> Option<Vec<i64>> {
        if self.media.media_type != MediaType::Tv {
            return None;
        }

        let entry = self
            .extra
            .iter()
            .find(|field| field.name == REQUESTED_SEASONS_FIELD)?;

        Some(
            entry
                .value
                .split(',')
                .filter_map(|piece| piece.trim().parse::<i64>().ok())
                .collect(),
        )
    }
}
