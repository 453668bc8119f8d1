//! Calendar access through provider binaries.

pub mod protocol;
pub mod provider;

pub use provider::Provider;
