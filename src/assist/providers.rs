use super::interfaces::{DraftExtractor, DraftRequest, DraftResponse};
use super::prompts::DraftPrompts;
use crate::config::AssistConfig;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Drafting provider speaking the OpenAI-compatible chat completions
/// protocol, which local serving stacks also expose. One request per
/// draft; the caller falls back to the rule parser on any failure.
pub struct HttpDraftProvider {
    client: Client,
    api_key: Option<String>,
    config: AssistConfig,
}

impl HttpDraftProvider {
    pub fn new(config: AssistConfig) -> Result<Self> {
        // local endpoints run without a key, so absence is not an error
        let api_key = std::env::var(&config.api_key_env).ok();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }
}

#[async_trait]
impl DraftExtractor for HttpDraftProvider {
    async fn draft(&self, request: DraftRequest) -> Result<DraftResponse> {
        let template = DraftPrompts::pedigree_drafting();
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": template.system_prompt},
                {"role": "user", "content": template.render(&request.transcript, request.source)}
            ],
            "temperature": 0.0,
        });

        let mut http_request = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url));
        if let Some(key) = &self.api_key {
            http_request = http_request.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = http_request.json(&body).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(anyhow::anyhow!("Drafter API error: {} - {}", status, text));
        }

        let data: serde_json::Value = serde_json::from_str(&text)?;
        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        debug!(model = %self.config.model, chars = content.len(), "draft received");

        Ok(DraftResponse {
            content,
            model: self.config.model.clone(),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let mut http_request = self.client.get(format!("{}/models", self.config.base_url));
        if let Some(key) = &self.api_key {
            http_request = http_request.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = http_request.send().await?;
        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "http-drafter"
    }
}

/// Factory for creating drafting providers
pub struct DraftProviderFactory;

impl DraftProviderFactory {
    /// `None` when assistance is disabled; extraction then runs on the
    /// deterministic paths alone.
    pub fn create(config: &AssistConfig) -> Result<Option<Box<dyn DraftExtractor>>> {
        if !config.enabled {
            return Ok(None);
        }
        Ok(Some(Box::new(HttpDraftProvider::new(config.clone())?)))
    }
}
