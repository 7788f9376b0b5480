//! Credential handling.
//!
//! URL blocking lives with the [`Blocklist`](crate::traits::blocklist::Blocklist) trait.

pub mod credentials;

pub use credentials::ApiCredentials;
