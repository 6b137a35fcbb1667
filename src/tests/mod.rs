pub mod common;

mod expiration_and_cache;
mod iam_token_exchange;
