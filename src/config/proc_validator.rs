//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * credential key file and token endpoint url
//!   * completion endpoint and model parameters
//!   * retry / logging / server invariants

use tracing::{error, info};

use crate::config::service::{CompletionConfig, CredentialConfig, PersistenceConfig, ServiceConfig};
use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::utils::constants::ASSERTION_TTL_SECONDS;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_credential(&cfg.credential, &mut errors);
    validate_persistence(&cfg.persistence, &mut errors);
    validate_completion(&cfg.completion, &mut errors);

    if errors.is_empty() {
        info!("config validation passed");
        Ok(())
    } else {
        for e in &errors {
            error!("config validation: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    // a margin this wide rejects every issued token as already stale
    if let Some(margin) = settings.safety_margin_seconds {
        if margin >= ASSERTION_TTL_SECONDS as u64 {
            errors.push(format!(
                "settings.safety_margin_seconds ({}) must be < {}",
                margin, ASSERTION_TTL_SECONDS
            ));
        }
    }

    if let Some(retry) = &settings.retry {
        validate_retry(retry, errors);
    }

    if let Some(logging) = &settings.logging {
        let level = logging.level.to_lowercase();
        if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' is invalid; allowed: trace, debug, info, warn, error",
                logging.level
            ));
        }
    }

    if settings.server.host.trim().is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }

    if settings.metrics.is_enabled && !settings.metrics.path.starts_with('/') {
        errors.push(format!("settings.metrics.path '{}' must start with '/'", settings.metrics.path));
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == Some(0) {
        errors.push("settings.retry.attempts must be >= 1".to_string());
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "settings.retry.max_delay_ms ({}) must be >= base_delay_ms ({})",
                max, base
            ));
        }
    }
}

fn validate_credential(credential: &CredentialConfig, errors: &mut Vec<String>) {
    if credential.key_file.trim().is_empty() {
        errors.push("credential.key_file must not be empty".to_string());
    }
    validate_url("credential.token_url", &credential.token_url, errors);
    if credential.request_timeout_ms == 0 {
        errors.push("credential.request_timeout_ms must be > 0".to_string());
    }
}

fn validate_persistence(persistence: &PersistenceConfig, errors: &mut Vec<String>) {
    if persistence.path.trim().is_empty() {
        errors.push("persistence.path must not be empty".to_string());
    }
}

fn validate_completion(completion: &CompletionConfig, errors: &mut Vec<String>) {
    validate_url("completion.url", &completion.url, errors);
    if completion.folder_id.trim().is_empty() {
        errors.push("completion.folder_id must not be empty".to_string());
    }
    if completion.model.trim().is_empty() {
        errors.push("completion.model must not be empty".to_string());
    }
    if !(0.0..=1.0).contains(&completion.temperature) {
        errors.push(format!(
            "completion.temperature {} must be within [0, 1]",
            completion.temperature
        ));
    }
    if completion.max_tokens == 0 {
        errors.push("completion.max_tokens must be > 0".to_string());
    }
    if completion.request_timeout_ms == 0 {
        errors.push("completion.request_timeout_ms must be > 0".to_string());
    }
}

fn validate_url(field: &str, url: &str, errors: &mut Vec<String>) {
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        errors.push(format!("{} '{}' must be an http(s) url", field, url));
    }
}
