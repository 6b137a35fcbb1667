use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::cache::token::Token;
use crate::credential::Assertion;
use crate::error::{body_snippet, ExchangeError};

/// One network attempt to trade a signed assertion for a bearer token.
pub trait ExchangeToken: Send + Sync + 'static {
    fn exchange(
        &self,
        assertion: &Assertion,
    ) -> impl Future<Output = Result<Token, ExchangeError>> + Send;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IamTokenResponse {
    iam_token: String,
    expires_at: DateTime<Utc>,
}

/// Token endpoint client. Performs exactly one POST per call, no retries.
#[derive(Debug, Clone)]
pub struct IamExchanger {
    client: Client,
    url: String,
}

impl IamExchanger {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Assertions are addressed to the endpoint that consumes them.
    pub fn audience(&self) -> &str {
        &self.url
    }
}

impl ExchangeToken for IamExchanger {
    async fn exchange(&self, assertion: &Assertion) -> Result<Token, ExchangeError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "jwt": assertion.jwt }))
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.url, error = %e, "token endpoint request failed");
                ExchangeError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        if !status.is_success() {
            error!(url = %self.url, status = status.as_u16(), "token endpoint rejected assertion");
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body: body_snippet(&body),
            });
        }

        let parsed: IamTokenResponse =
            serde_json::from_str(&body).map_err(|e| ExchangeError::Malformed {
                status: status.as_u16(),
                body: body_snippet(&body),
                reason: e.to_string(),
            })?;
        if parsed.iam_token.is_empty() {
            return Err(ExchangeError::Malformed {
                status: status.as_u16(),
                body: body_snippet(&body),
                reason: "iamToken is empty".to_owned(),
            });
        }

        info!(expires_at = %parsed.expires_at, "IAM token issued");
        Ok(Token::new(parsed.iam_token, parsed.expires_at))
    }
}
