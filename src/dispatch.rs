use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::filters::Instance;

/// Forwards matched notifications to downstream instances.
#[derive(Debug, Clone)]
pub struct DispatchClient {
    http: Client,
}

impl DispatchClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(format!("routarr/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http })
    }

    /// POST the webhook body to one instance. The payload is the raw JSON
    /// exactly as received; the router never rewrites it.
    pub async fn forward(&self, instance: &Instance, payload: &Value) -> Result<(), DispatchError> {
        debug!(instance = %instance.id, url = %instance.url, "forwarding webhook");

        self.http
            .post(instance.url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|source| DispatchError::Http {
                source,
                instance: instance.id.clone(),
            })?
            .error_for_status()
            .map_err(|source| DispatchError::Http {
                source,
                instance: instance.id.clone(),
            })?;

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("http error when forwarding webhook to instance `{instance}`")]
    Http {
        #[source]
        source: reqwest::Error,
        instance: String,
    },
}
