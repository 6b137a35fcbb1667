pub mod refresh_loop;
pub mod token;
pub mod token_cache;

pub use token::Token;
pub use token_cache::TokenCache;
