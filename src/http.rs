use std::borrow::Cow;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::webhook::RequestWebhook;
use crate::{AppState, SharedAppState, engine};

pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook_handler))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn webhook_handler(
    State(state): State<SharedAppState>,
    Json(payload): Json<Value>,
) -> Result<Response, HttpError> {
    // Shape validation happens here, before any matching: a body that is
    // not a well-formed request notification never reaches the engine.
    let webhook: RequestWebhook =
        serde_json::from_value(payload.clone()).map_err(HttpError::InvalidWebhook)?;

    info!(
        notification = webhook.notification_type.as_deref(),
        media_type = ?webhook.media.media_type,
        tmdb_id = webhook.media.tmdb_id,
        "webhook received"
    );

    let metadata = fetch_metadata(&state, &webhook).await;

    let Some(filter) = engine::find_matching_filter(&state.filters.filters, &webhook, &metadata)
    else {
        info!("no filter matched; request not routed");
        return Ok(Json(json!({ "matched": false, "routed": [] })).into_response());
    };

    let targets = filter.apply.ids();
    let mut routed = Vec::with_capacity(targets.len());
    for id in targets {
        let Some(instance) = state.filters.instance(id) else {
            // Startup validation makes this unreachable; tolerate it
            // anyway so one bad id cannot take the route down.
            warn!(instance = id, "matched filter references unknown instance");
            continue;
        };

        match state.dispatch.forward(instance, &payload).await {
            Ok(()) => routed.push(id.clone()),
            Err(error) => {
                warn!(instance = id, error = %error, "failed to forward webhook");
            }
        }
    }

    if routed.is_empty() && !targets.is_empty() {
        return Err(HttpError::DispatchFailed);
    }

    info!(routed = routed.len(), "webhook routed");

    Ok(Json(json!({ "matched": true, "routed": routed })).into_response())
}

/// Title metadata for condition matching. Any reason it cannot be fetched
/// (no client, no id, upstream fault) degrades to an empty mapping so the
/// engine still produces a routing decision.
async fn fetch_metadata(state: &AppState, webhook: &RequestWebhook) -> Map<String, Value> {
    let Some(tmdb) = &state.tmdb else {
        debug!("no tmdb client configured; matching with empty metadata");
        return Map::new();
    };

    let Some(tmdb_id) = webhook.media.tmdb_id else {
        debug!("webhook carries no tmdb id; matching with empty metadata");
        return Map::new();
    };

    match tmdb.fetch_metadata(webhook.media.media_type, tmdb_id).await {
        Ok(metadata) => metadata,
        Err(error) => {
            warn!(tmdb_id, error = %error, "metadata fetch failed; matching with empty metadata");
            Map::new()
        }
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request body is not a well-formed media request webhook: {0}")]
    InvalidWebhook(#[source] serde_json::Error),
    #[error("failed to deliver webhook to any matched instance")]
    DispatchFailed,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message): (StatusCode, Cow<'static, str>) = match &self {
            HttpError::InvalidWebhook(_) => (StatusCode::BAD_REQUEST, Cow::from(self.to_string())),
            HttpError::DispatchFailed => (
                StatusCode::BAD_GATEWAY,
                Cow::from("Failed to deliver webhook to any matched instance"),
            ),
        };

        tracing::error!("webhook handler error: {self}");

        (status, message).into_response()
    }
}
