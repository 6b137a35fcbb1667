use serde::Deserialize;

use crate::config::settings::SettingsConfig;
use crate::utils::constants::{COMPLETION_URL_DEFAULT, DEFAULT_HTTP_TIMEOUT_MS, IAM_TOKEN_URL_DEFAULT};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub credential: CredentialConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    pub completion: CompletionConfig,
}

/// ================================
/// Credential & token endpoint
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct CredentialConfig {
    /// authorized key JSON of the service account
    pub key_file: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// ================================
/// Durable token store
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    #[serde(default = "default_persistence_path")]
    pub path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { path: default_persistence_path() }
    }
}

/// ================================
/// Downstream completion endpoint
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_url")]
    pub url: String,
    pub folder_id: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl CompletionConfig {
    pub fn model_uri(&self) -> String {
        format!("gpt://{}/{}", self.folder_id, self.model)
    }
}

fn default_token_url() -> String {
    IAM_TOKEN_URL_DEFAULT.to_string()
}

fn default_completion_url() -> String {
    COMPLETION_URL_DEFAULT.to_string()
}

fn default_persistence_path() -> String {
    ".env".to_string()
}

fn default_model() -> String {
    "yandexgpt".to_string()
}

fn default_temperature() -> f64 {
    0.6
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}
