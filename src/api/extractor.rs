use crate::api::AppState;
use crate::auth::API_KEY_HEADER;
use crate::error::AppError;
use crate::metrics::AUTH_REJECTIONS_TOTAL;
use crate::models::SourceIdentity;
use axum::{
    async_trait,
    extract::{FromRequestParts, MatchedPath},
    http::request::Parts,
};

/// The caller's source, resolved from the `X-API-Key` header.
///
/// Rejects with 401 before the handler body runs.
#[derive(Debug, Clone)]
pub struct ApiKeyIdentity(pub SourceIdentity);

#[async_trait]
impl FromRequestParts<AppState> for ApiKeyIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let endpoint = parts
            .extensions
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        let api_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|key| !key.is_empty());

        let Some(api_key) = api_key else {
            AUTH_REJECTIONS_TOTAL.with_label_values(&[&endpoint]).inc();
            return Err(AppError::Authentication("API key required".to_string()));
        };

        match state.identity.validate(api_key).await {
            Some(identity) => Ok(ApiKeyIdentity(identity)),
            None => {
                AUTH_REJECTIONS_TOTAL.with_label_values(&[&endpoint]).inc();
                Err(AppError::Authentication("Invalid API key".to_string()))
            }
        }
    }
}
