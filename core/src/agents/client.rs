//! Provider clients: one call to one image provider for one prompt.
//!
//! Two implementations share the [`ProviderClient`] interface. The simulated
//! client answers from the offline [`PromptResolver`] table after a fixed
//! delay; the remote client calls the hosted generation endpoint with a
//! bearer token. The process picks one at startup through [`build_client`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use uuid::Uuid;

use super::credentials::CredentialProvider;
use super::outcome::GenerationOutcome;
use super::providers::Provider;
use crate::config::{AppConfig, ClientMode};
use crate::errors::GenerationError;
use crate::mapping::{MappingResult, PromptResolver};
use crate::media::wrap_inline_image;

#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn mode(&self) -> ClientMode;

    /// Whether this client can produce anything for `prompt` at all. When it
    /// cannot, the orchestrator skips the fan-out entirely.
    fn accepts(&self, _prompt: &str) -> bool {
        true
    }

    /// Produce an image reference for `prompt` from `provider`.
    async fn generate(&self, prompt: &str, provider: &Provider) -> Result<String, GenerationError>;

    async fn invoke(&self, prompt: &str, provider: &Provider) -> GenerationOutcome {
        GenerationOutcome::new(provider, self.generate(prompt, provider).await)
    }
}

/// Select the client implementation named by the configuration.
pub fn build_client(
    config: &AppConfig,
    resolver: Arc<PromptResolver>,
    credentials: Arc<dyn CredentialProvider>,
) -> Result<Arc<dyn ProviderClient>> {
    Ok(match config.mode {
        ClientMode::Simulated => Arc::new(SimulatedClient::new(resolver, config.simulated_delay)),
        ClientMode::Remote => Arc::new(RemoteClient::new(&config.api_base_url, credentials)?),
    })
}

pub struct SimulatedClient {
    resolver: Arc<PromptResolver>,
    delay: Duration,
}

impl SimulatedClient {
    pub fn new(resolver: Arc<PromptResolver>, delay: Duration) -> Self {
        Self { resolver, delay }
    }
}

#[async_trait]
impl ProviderClient for SimulatedClient {
    fn mode(&self) -> ClientMode {
        ClientMode::Simulated
    }

    fn accepts(&self, prompt: &str) -> bool {
        self.resolver.has_mapping(prompt)
    }

    async fn generate(&self, prompt: &str, provider: &Provider) -> Result<String, GenerationError> {
        let image = match self.resolver.resolve(prompt) {
            MappingResult::NoMapping => return Err(GenerationError::NoMapping),
            MappingResult::Mapped(images) => images.get(&provider.key).cloned().ok_or_else(|| {
                GenerationError::ProviderUnavailable {
                    provider: provider.display_name.clone(),
                }
            })?,
        };
        tokio::time::sleep(self.delay).await;
        Ok(image)
    }
}

pub struct RemoteClient {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl RemoteClient {
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("imagecompare/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to construct HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn query_payload(prompt: &str, provider: &Provider) -> Value {
        serde_json::json!({
            "action": "query",
            "endpoint": "image",
            "session_id": new_session_id(),
            "query": prompt,
            "model_provider": provider.system_id,
            "model_name": provider.key,
            "response_format": { "type": "json" },
            "request_source": "override_params",
        })
    }
}

#[async_trait]
impl ProviderClient for RemoteClient {
    fn mode(&self) -> ClientMode {
        ClientMode::Remote
    }

    async fn generate(&self, prompt: &str, provider: &Provider) -> Result<String, GenerationError> {
        let token = self
            .credentials
            .get()
            .await
            .filter(|t| !t.trim().is_empty())
            .ok_or(GenerationError::Authentication)?;

        let url = format!("{}/query", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&Self::query_payload(prompt, provider))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("message")
                        .and_then(|m| m.as_str())
                        .map(|m| m.to_string())
                });
            return Err(GenerationError::from_status(status.as_u16(), message));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| GenerationError::MalformedResponse(err.to_string()))?;
        let payload = body
            .get("response")
            .and_then(|r| r.get(0))
            .and_then(|img| img.as_str())
            .filter(|img| !img.trim().is_empty())
            .ok_or_else(|| {
                GenerationError::MalformedResponse("no image in response".to_string())
            })?;

        Ok(wrap_inline_image(payload))
    }
}

/// 32 lowercase hex characters, fresh per request.
pub fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}
