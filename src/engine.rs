use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::filters::{Condition, Filter};
use crate::matching::{match_condition, match_content_ratings, match_keywords};
use crate::webhook::{MediaStatus, RequestWebhook};

const MAX_SEASONS_KEY: &str = "max_seasons";
const KEYWORDS_KEY: &str = "keywords";
const CONTENT_RATINGS_KEY: &str = "contentRatings";

/// Walk `filters` in list order and return the first one whose gates and
/// conditions all hold for this notification. `None` means the request is
/// not routed anywhere.
///
/// Pure over its arguments: nothing is mutated and no state survives the
/// call, so concurrent invocations need no coordination.
pub fn find_matching_filter<'a>(
    filters: &'a [Filter],
    webhook: &RequestWebhook,
    metadata: &Map<String, Value>,
) -> Option<&'a Filter> {
    for (position, filter) in filters.iter().enumerate() {
        if filter_matches(position, filter, webhook, metadata) {
            debug!(position, "filter matched");
            return Some(filter);
        }
    }

    None
}

fn filter_matches(
    position: usize,
    filter: &Filter,
    webhook: &RequestWebhook,
    metadata: &Map<String, Value>,
) -> bool {
    if filter.media_type != webhook.media.media_type {
        trace!(position, "filter skipped: media type mismatch");
        return false;
    }

    if let Some(wants_4k) = filter.is_4k
        && !quality_flags_allow(wants_4k, webhook)
    {
        debug!(
            position,
            wants_4k,
            status = ?webhook.media.status,
            status_4k = ?webhook.media.status_4k,
            "filter skipped: quality gate"
        );
        return false;
    }

    // No conditions declared (or an empty map) makes the filter a
    // catch-all for its media type.
    let Some(conditions) = &filter.conditions else {
        return true;
    };

    conditions.iter().all(|(key, condition)| {
        let passed = condition_passes(key, condition, webhook, metadata);
        if !passed {
            debug!(position, key, "filter skipped: condition failed");
        }
        passed
    })
}

/// A 4k-discriminating filter routes only when exactly one of the two
/// quality flags is pending. Both pending at once is ambiguous and matches
/// neither polarity.
fn quality_flags_allow(wants_4k: bool, webhook: &RequestWebhook) -> bool {
    let standard_pending = webhook.media.status == MediaStatus::Pending;
    let four_k_pending = webhook.media.status_4k == MediaStatus::Pending;

    if wants_4k {
        four_k_pending && !standard_pending
    } else {
        standard_pending && !four_k_pending
    }
}

fn condition_passes(
    key: &str,
    condition: &Condition,
    webhook: &RequestWebhook,
    metadata: &Map<String, Value>,
) -> bool {
    match key {
        MAX_SEASONS_KEY => season_count_within_limit(condition, webhook),
        KEYWORDS_KEY => match metadata.get(KEYWORDS_KEY) {
            Some(keywords) => match_keywords(keywords, condition),
            None => false,
        },
        CONTENT_RATINGS_KEY => match_content_ratings(metadata.get(CONTENT_RATINGS_KEY), condition),
        other => match resolve_field(other, metadata, &webhook.request) {
            Some(value) => match_condition(condition, value),
            // A field found in neither source never satisfies the
            // condition, `exclude` members included.
            None => false,
        },
    }
}

/// Ordered lookup chain for generic condition fields: title metadata first,
/// then the notification's request record.
fn resolve_field<'a>(
    key: &str,
    metadata: &'a Map<String, Value>,
    request: &'a Map<String, Value>,
) -> Option<&'a Value> {
    [metadata, request].into_iter().find_map(|source| source.get(key))
}

fn season_count_within_limit(condition: &Condition, webhook: &RequestWebhook) -> bool {
    let Some(seasons) = webhook.requested_seasons() else {
        return false;
    };
    let Some(limit) = season_limit(condition) else {
        return false;
    };

    seasons.len() as f64 <= limit
}

/// Numeric form of a `max_seasons` limit; string limits are coerced.
fn season_limit(condition: &Condition) -> Option<f64> {
    let Condition::Plain(value) = condition else {
        return None;
    };

    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}
