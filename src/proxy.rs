use bytes::Bytes;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Gateway URL configuration missing")]
    MissingGatewayUrl,
    #[error("upstream gateway returned {status}")]
    Upstream { status: StatusCode, body: String },
    #[error("upstream gateway returned no body")]
    EmptyBody,
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Thin client for the OpenAI-compatible inference gateway.
///
/// Completion streams are handed back untouched; the caller relays the body.
/// Requests carry no timeout, a completion stream lives as long as upstream
/// keeps it open.
pub struct GatewayClient {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config
                .url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(|url| url.trim_end_matches('/').to_string()),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<String, ProxyError> {
        let base = self.base_url.as_deref().ok_or(ProxyError::MissingGatewayUrl)?;
        Ok(format!("{}{}", base, path))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Forwards a raw completion request and returns the upstream response once
    /// its status is known to be 2xx and a body is present.
    pub async fn stream_chat_completion(&self, body: Bytes) -> Result<Response, ProxyError> {
        let url = self.endpoint("/chat/completions")?;
        debug!(url = %url, bytes = body.len(), "Forwarding chat completion to gateway");

        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .header(CONNECTION, "keep-alive")
            .body(body);

        let response = self.authorize(request).send().await.map_err(|e| {
            error!(error = %e, "Gateway request failed");
            ProxyError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Gateway rejected chat completion");
            return Err(ProxyError::Upstream { status, body });
        }

        if response.content_length() == Some(0) {
            warn!("Gateway returned an empty completion stream");
            return Err(ProxyError::EmptyBody);
        }

        Ok(response)
    }

    pub async fn list_models(&self) -> Result<serde_json::Value, ProxyError> {
        let url = self.endpoint("/models")?;
        let response = self.authorize(self.client.get(&url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::Upstream { status, body });
        }

        Ok(response.json().await?)
    }
}
