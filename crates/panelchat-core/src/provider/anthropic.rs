//! Anthropic Messages API client with SSE streaming

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::conversation::Turn;
use crate::error::{Error, Result};
use crate::tools::ToolDefinition;

use super::wire::{self, MessagesRequest};
use super::{EventStream, ModelClient};

/// HTTP client bound to the key it was built with
struct KeyedClient {
    key: String,
    http: reqwest::Client,
}

/// Streaming client for the Anthropic Messages API.
///
/// The HTTP client is built on the first request that resolves a key and
/// rebuilt whenever the resolved key changes.
pub struct AnthropicClient {
    config: ProviderConfig,
    client: Mutex<Option<KeyedClient>>,
}

impl AnthropicClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn http_for(&self, key: &str) -> Result<reqwest::Client> {
        let mut slot = self.client.lock();
        if let Some(existing) = slot.as_ref()
            && existing.key == key
        {
            return Ok(existing.http.clone());
        }

        let mut headers = HeaderMap::new();
        let key_value = HeaderValue::from_str(key)
            .map_err(|_| Error::Config("API key contains invalid header characters".to_string()))?;
        headers.insert("x-api-key", key_value);
        let version = HeaderValue::from_str(&self.config.api_version)
            .map_err(|_| Error::Config(format!("Invalid api_version: {}", self.config.api_version)))?;
        headers.insert("anthropic-version", version);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Provider(format!("Failed to build HTTP client: {}", e)))?;

        info!(model = %self.config.model, "Initialized model client");
        *slot = Some(KeyedClient {
            key: key.to_string(),
            http: http.clone(),
        });
        Ok(http)
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn open_stream(&self, history: &[Turn], tools: &[ToolDefinition]) -> Result<EventStream> {
        let key = self.config.require_api_key()?;
        let http = self.http_for(&key)?;
        let body = MessagesRequest::new(&self.config, history, tools);

        debug!(
            model = %self.config.model,
            messages = history.len(),
            tools = tools.len(),
            "Opening model stream"
        );

        let response = http
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = wire::error_message(&text).unwrap_or(text);
            return Err(Error::Provider(format!("{} {}", status, detail)));
        }

        let events = response.bytes_stream().eventsource().flat_map(|item| {
            let mapped = match item {
                Ok(sse) => wire::map_sse(&sse.event, &sse.data),
                Err(e) => vec![Err(Error::Provider(format!("SSE error: {}", e)))],
            };
            futures::stream::iter(mapped)
        });

        Ok(Box::pin(events))
    }
}
