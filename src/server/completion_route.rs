use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::CompletionError;
use crate::observability::metrics::{get_metrics, OUTCOME_AUTH_ERROR, OUTCOME_ERROR, OUTCOME_SUCCESS};
use crate::server::server::AppState;
use crate::sinks::TokenStore;
use crate::sources::ExchangeToken;
use crate::utils::constants::USER_APOLOGY;

pub static COMPLETION_PATH: &str = "/v1/completion";

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptReply {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptFailure {
    pub error: String,
}

pub fn router<E: ExchangeToken, S: TokenStore>() -> Router<AppState<E, S>> {
    Router::new().route(COMPLETION_PATH, post(handle_prompt::<E, S>))
}

/// One inbound prompt: authorize, complete, reply. Failures become an apology.
async fn handle_prompt<E: ExchangeToken, S: TokenStore>(
    State(state): State<AppState<E, S>>,
    Json(request): Json<PromptRequest>,
) -> Response {
    let metrics = get_metrics().await;
    info!(chars = request.text.chars().count(), "prompt received");

    match state.completion.answer(&state.tokens, &request.text).await {
        Ok(text) => {
            metrics.completion_requests.with_label_values(&[OUTCOME_SUCCESS]).inc();
            (StatusCode::OK, Json(PromptReply { text })).into_response()
        }
        Err(e) => {
            let outcome = match &e {
                CompletionError::Auth(_) => OUTCOME_AUTH_ERROR,
                _ => OUTCOME_ERROR,
            };
            error!(error = %e, outcome, "prompt failed");
            metrics.completion_requests.with_label_values(&[outcome]).inc();
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(PromptFailure { error: USER_APOLOGY.to_owned() }),
            )
                .into_response()
        }
    }
}
