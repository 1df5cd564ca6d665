use super::{mask_key, IdentityProvider, API_KEY_HEADER};
use crate::error::{AppError, Result};
use crate::models::SourceIdentity;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

/// Validates API keys with `GET {service_url}/validate`
#[derive(Clone)]
pub struct HttpAuthClient {
    client: Client,
    validate_url: String,
}

impl HttpAuthClient {
    pub fn new(service_url: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            validate_url: format!("{}/validate", service_url.trim_end_matches('/')),
        })
    }

    pub fn validate_url(&self) -> &str {
        &self.validate_url
    }
}

#[async_trait]
impl IdentityProvider for HttpAuthClient {
    async fn validate(&self, api_key: &str) -> Option<SourceIdentity> {
        if api_key.is_empty() {
            return None;
        }

        let response = match self
            .client
            .get(&self.validate_url)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(key = %mask_key(api_key), error = %e, "Auth service unreachable");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            warn!(
                key = %mask_key(api_key),
                status = response.status().as_u16(),
                "API key rejected by auth service"
            );
            return None;
        }

        match response.json::<SourceIdentity>().await {
            Ok(identity) => {
                debug!(source = %identity.name, "API key validated");
                Some(identity)
            }
            Err(e) => {
                warn!(key = %mask_key(api_key), error = %e, "Malformed auth service response");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;

    #[tokio::test]
    async fn test_valid_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/log/validate")
            .match_header("x-api-key", "secret-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"id": "src-1", "name": "checkout", "userId": "user-9"}).to_string())
            .create_async()
            .await;

        let client = HttpAuthClient::new(&format!("{}/api/log/", server.url())).unwrap();
        let identity = client.validate("secret-key").await.unwrap();

        assert_eq!(identity.id, "src-1");
        assert_eq!(identity.name, "checkout");
        assert_eq!(identity.user_id, "user-9");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_key() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/validate")
            .with_status(401)
            .create_async()
            .await;

        let client = HttpAuthClient::new(&server.url()).unwrap();
        assert!(client.validate("wrong").await.is_none());
    }

    #[tokio::test]
    async fn test_empty_key_skips_network() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/validate")
            .expect(0)
            .create_async()
            .await;

        let client = HttpAuthClient::new(&server.url()).unwrap();
        assert!(client.validate("").await.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let client = HttpAuthClient::new("http://127.0.0.1:1").unwrap();
        assert!(client.validate("key").await.is_none());
    }
}
