use std::time::Duration;

use reqwest::{Client, Url};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

use crate::webhook::MediaType;

#[derive(Debug, Clone)]
pub struct TmdbClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl TmdbClient {
    pub fn new(base_url: Url, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(format!("routarr/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Fetch title details with keywords and content ratings appended, and
    /// flatten the response into the open metadata mapping the filter
    /// engine consumes.
    pub async fn fetch_metadata(
        &self,
        media_type: MediaType,
        tmdb_id: i64,
    ) -> Result<Map<String, Value>, TmdbError> {
        let (segment, appended) = match media_type {
            MediaType::Movie => ("movie", "keywords,release_dates"),
            MediaType::Tv => ("tv", "keywords,content_ratings"),
        };

        let mut url = self
            .base_url
            .join(&format!("3/{segment}/{tmdb_id}"))
            .map_err(TmdbError::Url)?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api_key", &self.api_key);
            pairs.append_pair("append_to_response", appended);
        }

        let response = self.http.get(url).send().await?.error_for_status()?;
        let details: Map<String, Value> = response.json().await?;

        debug!(
            tmdb_id,
            media_type = ?media_type,
            fields = details.len(),
            "fetched tmdb metadata"
        );

        Ok(flatten_details(media_type, details))
    }
}

/// Reshape the raw TMDB response into the field names conditions reference:
/// `keywords` becomes a flat record list and `contentRatings` a
/// `{results: [...]}` container. All other detail fields pass through for
/// generic condition lookup.
fn flatten_details(media_type: MediaType, mut details: Map<String, Value>) -> Map<String, Value> {
    if let Some(keywords) = details.remove("keywords") {
        // Movie keywords nest under `keywords`, tv keywords under `results`.
        let flat = match media_type {
            MediaType::Movie => keywords.get("keywords").cloned(),
            MediaType::Tv => keywords.get("results").cloned(),
        };
        details.insert("keywords".to_string(), flat.unwrap_or_else(|| json!([])));
    }

    match media_type {
        MediaType::Tv => {
            if let Some(ratings) = details.remove("content_ratings") {
                details.insert("contentRatings".to_string(), ratings);
            }
        }
        MediaType::Movie => {
            if let Some(release_dates) = details.remove("release_dates") {
                details.insert(
                    "contentRatings".to_string(),
                    certifications_to_ratings(&release_dates),
                );
            }
        }
    }

    details
}

/// Movie certifications arrive per country under `release_dates`; lift the
/// first non-empty certification of each country into the same
/// `{results: [{iso_3166_1, rating}]}` shape the tv endpoint returns.
fn certifications_to_ratings(release_dates: &Value) -> Value {
    let results: Vec<Value> = release_dates
        .get("results")
        .and_then(Value::as_array)
        .map(|countries| {
            countries
                .iter()
                .filter_map(|country| {
                    let iso = country.get("iso_3166_1")?.as_str()?;
                    let certification = country
                        .get("release_dates")?
                        .as_array()?
                        .iter()
                        .filter_map(|entry| entry.get("certification").and_then(Value::as_str))
                        .find(|value| !value.is_empty())?;
                    Some(json!({ "iso_3166_1": iso, "rating": certification }))
                })
                .collect()
        })
        .unwrap_or_default();

    json!({ "results": results })
}

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("failed to build TMDB request url")]
    Url(#[from] url::ParseError),
    #[error("http error when querying the TMDB api")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn details(value: Value) -> Map<String, Value> {
        serde_json::from_value(value).expect("details should deserialise")
    }

    #[test]
    fn movie_keywords_and_certifications_are_flattened() {
        let raw = details(json!({
            "original_language": "en",
            "keywords": { "keywords": [{ "id": 10051, "name": "heist" }] },
            "release_dates": {
                "results": [
                    {
                        "iso_3166_1": "US",
                        "release_dates": [
                            { "certification": "", "type": 1 },
                            { "certification": "PG-13", "type": 3 },
                        ],
                    },
                ],
            },
        }));

        let flat = flatten_details(MediaType::Movie, raw);
        assert_eq!(flat["keywords"], json!([{ "id": 10051, "name": "heist" }]));
        assert_eq!(
            flat["contentRatings"],
            json!({ "results": [{ "iso_3166_1": "US", "rating": "PG-13" }] })
        );
        assert_eq!(flat["original_language"], json!("en"));
        assert!(!flat.contains_key("release_dates"));
    }

    #[test]
    fn tv_keywords_and_ratings_are_flattened() {
        let raw = details(json!({
            "keywords": { "results": [{ "id": 6075, "name": "space opera" }] },
            "content_ratings": { "results": [{ "iso_3166_1": "US", "rating": "TV-14" }] },
        }));

        let flat = flatten_details(MediaType::Tv, raw);
        assert_eq!(flat["keywords"], json!([{ "id": 6075, "name": "space opera" }]));
        assert_eq!(
            flat["contentRatings"],
            json!({ "results": [{ "iso_3166_1": "US", "rating": "TV-14" }] })
        );
        assert!(!flat.contains_key("content_ratings"));
    }

    #[test]
    fn countries_without_certifications_are_dropped() {
        let ratings = certifications_to_ratings(&json!({
            "results": [
                { "iso_3166_1": "US", "release_dates": [{ "certification": "" }] },
                { "iso_3166_1": "DE", "release_dates": [{ "certification": "FSK 16" }] },
            ],
        }));
        assert_eq!(
            ratings,
            json!({ "results": [{ "iso_3166_1": "DE", "rating": "FSK 16" }] })
        );
    }
}
