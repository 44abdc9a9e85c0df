//! GitLab container registry provider.
//!
//! Matches `registry.gitlab.com` by default, or the configured registry URL
//! for self-managed instances. Authentication exchanges a personal access
//! token for a short-lived bearer token at the instance's JWT auth endpoint.

use async_trait::async_trait;
use serde_json::{json, Value};

use argus_core::Image;

use crate::auth::{mask, CachedToken, TokenCache, TokenResponse};
use crate::error::RegistryError;
use crate::provider::{
    build_http_client, registry_host, ProviderKind, RegistryProvider, RequestOptions,
};

const DEFAULT_REGISTRY_URL: &str = "https://registry.gitlab.com";
const DEFAULT_AUTH_URL: &str = "https://gitlab.com";

/// Fallback token lifetime when the endpoint does not report one.
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 300;

/// GitLab container registry configuration.
#[derive(Debug, Clone)]
pub struct GitlabConfig {
    /// Registry URL, for self-managed instances.
    pub url: Option<String>,

    /// Authentication URL, for self-managed instances.
    pub auth_url: Option<String>,

    /// Personal access token with `read_registry`.
    pub token: String,
}

/// GitLab container registry provider.
#[derive(Debug)]
pub struct GitlabProvider {
    name: String,
    config: GitlabConfig,
    http: reqwest::Client,
    tokens: TokenCache,
}

impl GitlabProvider {
    /// Creates a GitLab provider.
    ///
    /// # Errors
    ///
    /// Returns an error when the token is empty.
    pub fn new(name: impl Into<String>, config: GitlabConfig) -> Result<Self, RegistryError> {
        let name = name.into();
        if config.token.is_empty() {
            return Err(RegistryError::InvalidConfiguration {
                provider: format!("gitlab.{name}"),
                message: "token is required".to_string(),
            });
        }
        Ok(Self {
            name,
            config,
            http: build_http_client()?,
            tokens: TokenCache::new(),
        })
    }

    fn registry_url(&self) -> &str {
        self.config.url.as_deref().unwrap_or(DEFAULT_REGISTRY_URL)
    }

    fn auth_url(&self) -> &str {
        self.config.auth_url.as_deref().unwrap_or(DEFAULT_AUTH_URL)
    }

    /// Fetches a pull token scoped to the image's repository.
    async fn fetch_token(&self, image: &Image) -> Result<String, RegistryError> {
        let scope = format!("repository:{}:pull", image.name);
        if let Some(token) = self.tokens.get(&scope).await {
            return Ok(token);
        }

        let response = self
            .http
            .get(format!("{}/jwt/auth", self.auth_url()))
            .query(&[("service", "container_registry"), ("scope", &scope)])
            .basic_auth("", Some(&self.config.token))
            .send()
            .await
            .map_err(RegistryError::from)?;
        if !response.status().is_success() {
            return Err(RegistryError::AuthenticationFailed {
                provider: self.label(),
                message: format!("jwt auth endpoint returned {}", response.status()),
            });
        }
        let body: TokenResponse = response.json().await.map_err(RegistryError::from)?;
        let ttl = body.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECONDS);
        let token = body
            .into_token()
            .ok_or_else(|| RegistryError::AuthenticationFailed {
                provider: self.label(),
                message: "jwt auth endpoint returned no token".to_string(),
            })?;
        self.tokens
            .put(scope, CachedToken::with_ttl(token.clone(), ttl))
            .await;
        Ok(token)
    }
}

#[async_trait]
impl RegistryProvider for GitlabProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gitlab
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn matches(&self, image: &Image) -> bool {
        registry_host(&image.registry.url) == registry_host(self.registry_url())
    }

    fn normalize_image(&self, mut image: Image) -> Image {
        image.registry.name = self.label();
        image.registry.url = format!("{}/v2", self.registry_url().trim_end_matches('/'));
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
            "url": self.registry_url(),
            "authurl": self.auth_url(),
            "token": mask(Some(&self.config.token)),
        })
    }
}
