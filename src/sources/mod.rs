/// Sources module
///
/// Network sources of bearer tokens.
pub mod exchange;

pub use exchange::{ExchangeToken, IamExchanger};
