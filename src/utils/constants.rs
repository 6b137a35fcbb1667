//! Shared constants and invariants

/// Tokens are refreshed this long before the issuer's stated expiry.
pub const SAFETY_MARGIN_SECONDS_DEFAULT: u64 = 300;
/// Lifetime of a signed assertion. Must match what the issuer expects.
pub const ASSERTION_TTL_SECONDS: i64 = 3600;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

pub const IAM_TOKEN_URL_DEFAULT: &str = "https://iam.api.cloud.yandex.net/iam/v1/tokens";
pub const COMPLETION_URL_DEFAULT: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";

// Durable store keys
pub const IAM_TOKEN_KEY: &str = "IAM_TOKEN";
pub const IAM_TOKEN_EXPIRES_KEY: &str = "IAM_TOKEN_EXPIRES";

pub const USER_APOLOGY: &str =
    "Sorry, something went wrong while processing your request. Please try again later.";
