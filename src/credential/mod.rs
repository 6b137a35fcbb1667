//! Service-account credential and the assertions signed with it.

pub mod assertion;
pub mod key_file;

pub use assertion::{sign, Assertion, AssertionClaims};
pub use key_file::Credential;
