use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::ports::{GenerationBackend, GenerationInput};
use crate::profile::UsageKind;
use config::GenerationConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions response, reduced to what we read.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn system_prompt(kind: UsageKind) -> &'static str {
    match kind {
        UsageKind::Rfq => {
            "You are a government contracting assistant for small businesses. \
             Draft a professional Request for Quote (RFQ) letter based on the \
             provided solicitation document. Respond with the letter text only."
        }
        UsageKind::Proposal => {
            "You are a government contracting assistant for small businesses. \
             Draft a complete, professional proposal responding to the provided \
             RFQ and solicitation documents. Respond with the proposal text only."
        }
    }
}

fn user_prompt(input: &GenerationInput) -> String {
    let mut prompt = String::new();
    if !input.source_files.is_empty() {
        prompt.push_str(&format!(
            "Source documents: {}\n\n",
            input.source_files.join(", ")
        ));
    }
    prompt.push_str(&input.document_text);
    prompt
}

/// Generation backend speaking the OpenAI-compatible chat-completions API.
pub struct OpenAiBackend {
    config: GenerationConfig,
    http_client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: GenerationConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn model_for(&self, kind: UsageKind) -> &str {
        match kind {
            UsageKind::Rfq => &self.config.rfq_model,
            UsageKind::Proposal => &self.config.proposal_model,
        }
    }

    fn max_tokens_for(&self, kind: UsageKind) -> u32 {
        match kind {
            UsageKind::Rfq => self.config.rfq_max_tokens,
            UsageKind::Proposal => self.config.proposal_max_tokens,
        }
    }

    fn completions_url(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{}/chat/completions", base)
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn generate(&self, input: &GenerationInput) -> anyhow::Result<String> {
        let model = self.model_for(input.kind);
        let request_body = json!({
            "model": model,
            "max_tokens": self.max_tokens_for(input.kind),
            "temperature": self.config.temperature,
            "messages": [
                { "role": "system", "content": system_prompt(input.kind) },
                { "role": "user", "content": user_prompt(input) },
            ],
        });

        debug!(
            "Requesting {} generation from model {} ({} input chars)",
            input.kind,
            model,
            input.document_text.len()
        );

        let response = self
            .http_client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .context("Generation request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            let excerpt: String = error_text.chars().take(500).collect();
            anyhow::bail!("Generation API error {}: {}", status, excerpt);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Invalid generation response")?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .context("Generation response contained no content")
    }
}
