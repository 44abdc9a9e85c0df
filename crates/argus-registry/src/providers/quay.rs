//! Quay.io provider.
//!
//! Quay issues pull tokens from its own auth endpoint. Robot-account
//! credentials (`namespace+account:token`) are exchanged when configured;
//! without them the endpoint still returns an anonymous token valid for
//! public repositories.

use async_trait::async_trait;
use serde_json::{json, Value};

use argus_core::Image;

use crate::auth::{base64_encode, mask, CachedToken, TokenCache, TokenResponse};
use crate::error::RegistryError;
use crate::provider::{
    build_http_client, registry_host, ProviderKind, RegistryProvider, RequestOptions,
};

const REGISTRY_HOST: &str = "quay.io";

/// Fallback token lifetime when the endpoint does not report one.
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 300;

/// Quay.io configuration. All fields are optional; anonymous access works
/// for public repositories.
#[derive(Debug, Clone, Default)]
pub struct QuayConfig {
    /// Robot account namespace.
    pub namespace: Option<String>,

    /// Robot account name.
    pub account: Option<String>,

    /// Robot account token.
    pub token: Option<String>,
}

/// Quay.io registry provider.
#[derive(Debug)]
pub struct QuayProvider {
    name: String,
    config: QuayConfig,
    http: reqwest::Client,
    tokens: TokenCache,
}

impl QuayProvider {
    /// Creates a Quay provider.
    ///
    /// # Errors
    ///
    /// Returns an error when the robot account is only partially configured.
    pub fn new(name: impl Into<String>, config: QuayConfig) -> Result<Self, RegistryError> {
        let name = name.into();
        let configured = [
            config.namespace.is_some(),
            config.account.is_some(),
            config.token.is_some(),
        ];
        if configured.iter().any(|&c| c) && !configured.iter().all(|&c| c) {
            return Err(RegistryError::InvalidConfiguration {
                provider: format!("quay.{name}"),
                message: "namespace, account and token must be set together".to_string(),
            });
        }
        Ok(Self {
            name,
            config,
            http: build_http_client()?,
            tokens: TokenCache::new(),
        })
    }

    /// Returns the robot-account basic credentials, when configured.
    fn robot_credentials(&self) -> Option<String> {
        match (
            &self.config.namespace,
            &self.config.account,
            &self.config.token,
        ) {
            (Some(namespace), Some(account), Some(token)) => {
                Some(base64_encode(&format!("{namespace}+{account}"), token))
            }
            _ => None,
        }
    }

    /// Fetches a pull token scoped to the image's repository.
    async fn fetch_token(&self, image: &Image) -> Result<String, RegistryError> {
        let scope = format!("repository:{}:pull", image.name);
        if let Some(token) = self.tokens.get(&scope).await {
            return Ok(token);
        }

        let mut request = self
            .http
            .get(format!("https://{REGISTRY_HOST}/v2/auth"))
            .query(&[("service", REGISTRY_HOST), ("scope", &scope)]);
        if let Some(credentials) = self.robot_credentials() {
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {credentials}"),
            );
        }
        let response = request.send().await.map_err(RegistryError::from)?;
        if !response.status().is_success() {
            return Err(RegistryError::AuthenticationFailed {
                provider: self.label(),
                message: format!("auth endpoint returned {}", response.status()),
            });
        }
        let body: TokenResponse = response.json().await.map_err(RegistryError::from)?;
        let ttl = body.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECONDS);
        let token = body
            .into_token()
            .ok_or_else(|| RegistryError::AuthenticationFailed {
                provider: self.label(),
                message: "auth endpoint returned no token".to_string(),
            })?;
        self.tokens
            .put(scope, CachedToken::with_ttl(token.clone(), ttl))
            .await;
        Ok(token)
    }
}

#[async_trait]
impl RegistryProvider for QuayProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Quay
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn matches(&self, image: &Image) -> bool {
        registry_host(&image.registry.url) == REGISTRY_HOST
    }

    fn normalize_image(&self, mut image: Image) -> Image {
        image.registry.name = self.label();
        image.registry.url = format!("https://{REGISTRY_HOST}/v2");
        image
    }

    async fn authenticate(
        &self,
        image: &Image,
        mut options: RequestOptions,
    ) -> Result<RequestOptions, RegistryError> {
        let token = self.fetch_token(image).await?;
        options.authorization = Some(format!("Bearer {token}"));
        Ok(options)
    }

    async fn invalidate_auth(&self) {
        self.tokens.clear().await;
    }

    fn masked_configuration(&self) -> Value {
        json!({
            "namespace": self.config.namespace,
            "account": self.config.account,
            "token": mask(self.config.token.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::image;

    #[test]
    fn test_matches_quay_host() {
        let p = QuayProvider::new("quay", QuayConfig::default()).unwrap();
        assert!(p.matches(&image("quay.io", "prometheus/node-exporter", "1.7.0")));
        assert!(!p.matches(&image("docker.io", "library/nginx", "1.0.0")));
    }

    #[test]
    fn test_match_recognizes_own_normalized_output() {
        let p = QuayProvider::new("quay", QuayConfig::default()).unwrap();
        let normalized = p.normalize_image(image("quay.io", "prometheus/node-exporter", "1.7.0"));
        assert_eq!(normalized.registry.url, "https://quay.io/v2");
        assert!(p.matches(&normalized));
    }

    #[test]
    fn test_robot_credentials_encoding() {
        let p = QuayProvider::new(
            "quay",
            QuayConfig {
                namespace: Some("org".to_string()),
                account: Some("robot".to_string()),
                token: Some("secret".to_string()),
            },
        )
        .unwrap();
        assert_eq!(
            p.robot_credentials().as_deref(),
            Some("b3JnK3JvYm90OnNlY3JldA==")
        );
    }

    #[test]
    fn test_partial_robot_account_is_rejected() {
        let result = QuayProvider::new(
            "quay",
            QuayConfig {
                namespace: Some("org".to_string()),
                account: None,
                token: None,
            },
        );
        assert!(result.is_err());
    }
}
