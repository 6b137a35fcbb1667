use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::cache::TokenCache;
use crate::config::service::CompletionConfig;
use crate::error::{body_snippet, CompletionError};
use crate::sinks::TokenStore;
use crate::sources::ExchangeToken;

static USER_ROLE: &str = "user";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest<'a> {
    model_uri: &'a str,
    completion_options: CompletionOptions,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Debug, Deserialize)]
struct CompletionResult {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    message: AlternativeMessage,
}

#[derive(Debug, Deserialize)]
struct AlternativeMessage {
    text: String,
}

/// Language-model completion endpoint authorized with the IAM bearer token.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    url: String,
    model_uri: String,
    temperature: f64,
    max_tokens: u32,
}

impl CompletionClient {
    pub fn new(cfg: &CompletionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            url: cfg.url.clone(),
            model_uri: cfg.model_uri(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
    }

    /// Fetch a token through the cache, then ask for a completion.
    /// Without a token no request leaves the process.
    pub async fn answer<E: ExchangeToken, S: TokenStore>(
        &self,
        tokens: &TokenCache<E, S>,
        prompt: &str,
    ) -> Result<String, CompletionError> {
        let bearer = tokens.get_valid_token().await?;
        self.complete(&bearer, prompt).await
    }

    pub async fn complete(&self, bearer: &str, prompt: &str) -> Result<String, CompletionError> {
        let request = CompletionRequest {
            model_uri: &self.model_uri,
            completion_options: CompletionOptions {
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            },
            messages: vec![Message {
                role: USER_ROLE,
                text: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(bearer)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.url, error = %e, "completion request failed");
                CompletionError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        if !status.is_success() {
            error!(url = %self.url, status = status.as_u16(), "completion endpoint rejected request");
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: body_snippet(&body),
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;
        let text = parsed
            .result
            .alternatives
            .into_iter()
            .next()
            .map(|alternative| alternative.message.text)
            .ok_or_else(|| CompletionError::Malformed("no alternatives".to_owned()))?;

        info!("completion received");
        Ok(text)
    }
}
