//! API key validation against the external auth service

mod client;

pub use client::HttpAuthClient;

use crate::models::SourceIdentity;
use async_trait::async_trait;

/// Header carrying the caller's API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Resolves an API key to the source it belongs to
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` means the key is not accepted, whatever the reason
    async fn validate(&self, api_key: &str) -> Option<SourceIdentity>;
}

/// Shorten a key for log output
pub(crate) fn mask_key(api_key: &str) -> String {
    let prefix: String = api_key.chars().take(4).collect();
    format!("{}...", prefix)
}
