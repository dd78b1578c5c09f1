use crate::http_utils::{backoff_delay, classify_request_error, redacted_endpoint_label};
use anyhow::{Context, Result};
use async_trait::async_trait;
use mintwatch_config::AssetsConfig;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};

/// Best-effort lookup of a token's display image. `None` means "no image",
/// never an error the caller must handle.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve_image_url(&self, token: &str) -> Option<String>;
}

/// Resolver that never finds an image; used when no asset endpoint is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopImageResolver;

#[async_trait]
impl ImageResolver for NoopImageResolver {
    async fn resolve_image_url(&self, _token: &str) -> Option<String> {
        None
    }
}

pub struct HeliusAssetResolver {
    http: reqwest::Client,
    endpoint: String,
    max_attempts: u32,
    retry_base: Duration,
}

impl HeliusAssetResolver {
    /// Returns `Ok(None)` when the endpoint is unset or still the
    /// placeholder.
    pub fn from_config(config: &AssetsConfig) -> Result<Option<Self>> {
        let endpoint = config.helius_http_url.trim();
        if endpoint.is_empty() || endpoint.contains("REPLACE_ME") {
            return Ok(None);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed building asset lookup http client")?;
        Ok(Some(Self {
            http,
            endpoint: endpoint.to_string(),
            max_attempts: config.max_attempts.max(1),
            retry_base: Duration::from_millis(config.retry_base_ms),
        }))
    }

    async fn get_asset(&self, token: &str) -> Result<Value, (&'static str, String)> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": "mintwatch-asset",
            "method": "getAsset",
            "params": {"id": token},
        });
        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|error| (classify_request_error(&error), error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(("status", format!("http status {status}")));
        }
        response
            .json::<Value>()
            .await
            .map_err(|error| (classify_request_error(&error), error.to_string()))
    }
}

#[async_trait]
impl ImageResolver for HeliusAssetResolver {
    async fn resolve_image_url(&self, token: &str) -> Option<String> {
        for attempt in 0..self.max_attempts {
            match self.get_asset(token).await {
                Ok(body) => return image_from_asset(&body),
                Err((kind, message)) => {
                    let last = attempt + 1 >= self.max_attempts;
                    if last {
                        warn!(
                            token,
                            endpoint = %redacted_endpoint_label(&self.endpoint),
                            kind,
                            error = %message,
                            "asset image lookup failed"
                        );
                        return None;
                    }
                    debug!(token, attempt, kind, "retrying asset image lookup");
                    time::sleep(backoff_delay(self.retry_base, attempt)).await;
                }
            }
        }
        None
    }
}

/// `result.content.links.image`, falling back to the first file URI.
pub fn image_from_asset(body: &Value) -> Option<String> {
    let content = body.get("result")?.get("content")?;
    let from_links = content
        .get("links")
        .and_then(|links| links.get("image"))
        .and_then(Value::as_str);
    let from_files = || {
        content
            .get("files")
            .and_then(Value::as_array)
            .and_then(|files| files.first())
            .and_then(|file| file.get("uri"))
            .and_then(Value::as_str)
    };
    from_links
        .filter(|url| !url.trim().is_empty())
        .or_else(|| from_files().filter(|url| !url.trim().is_empty()))
        .map(|url| url.trim().to_string())
}
