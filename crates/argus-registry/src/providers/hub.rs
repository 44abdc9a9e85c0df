//! Docker Hub provider.
//!
//! Matches images without a registry domain as well as explicit `docker.io`
//! references. Authentication uses the well-known token endpoint, with
//! optional account credentials for private repositories and higher rate
//! limits; tokens are cached per repository scope.

use async_trait::async_trait;
use serde_json::{json, Value};

use argus_core::Image;

use crate::auth::{mask, CachedToken, TokenCache, TokenResponse};
use crate::error::RegistryError;
use crate::provider::{
    build_http_client, registry_host, ProviderKind, RegistryProvider, RequestOptions,
};

const REGISTRY_URL: &str = "https://registry-1.docker.io/v2";
const TOKEN_URL: &str = "https://auth.docker.io/token";
const TOKEN_SERVICE: &str = "registry.docker.io";

/// Fallback token lifetime when the endpoint does not report one.
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60;

/// Docker Hub account configuration. All fields are optional; anonymous
/// access works for public repositories.
#[derive(Debug, Clone, Default)]
pub struct HubConfig {
    /// Account login.
    pub login: Option<String>,

    /// Access token or password.
    pub token: Option<String>,
}

/// Docker Hub registry provider.
#[derive(Debug)]
pub struct HubProvider {
    name: String,
    config: HubConfig,
    http: reqwest::Client,
    tokens: TokenCache,
}

impl HubProvider {
    /// Creates a Docker Hub provider.
    ///
    /// # Errors
    ///
    /// Returns an error when a token is configured without a login, or the
    /// HTTP client cannot be built.
    pub fn new(name: impl Into<String>, config: HubConfig) -> Result<Self, RegistryError> {
        let name = name.into();
        if config.token.is_some() && config.login.is_none() {
            return Err(RegistryError::InvalidConfiguration {
                provider: format!("hub.{name}"),
                message: "login is required when a token is set".to_string(),
            });
        }
        Ok(Self {
            name,
            config,
            http: build_http_client()?,
            tokens: TokenCache::new(),
        })
    }

    /// Exchanges credentials for a pull token scoped to the image's
    /// repository, reusing a cached token while it is fresh.
    async fn fetch_token(&self, image: &Image) -> Result<String, RegistryError> {
        let scope = format!("repository:{}:pull", image.name);
        if let Some(token) = self.tokens.get(&scope).await {
            return Ok(token);
        }

        let mut request = self
            .http
            .get(TOKEN_URL)
            .query(&[("service", TOKEN_SERVICE), ("scope", &scope)]);
        if let (Some(login), Some(token)) = (&self.config.login, &self.config.token) {
            request = request.basic_auth(login, Some(token));
        }
        let response = request.send().await.map_err(RegistryError::from)?;
        if !response.status().is_success() {
            return Err(RegistryError::AuthenticationFailed {
                provider: self.label(),
                message: format!("token endpoint returned {}", response.status()),
            });
        }
        let body: TokenResponse = response.json().await.map_err(RegistryError::from)?;
        let ttl = body.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECONDS);
        let token = body
            .into_token()
            .ok_or_else(|| RegistryError::AuthenticationFailed {
                provider: self.label(),
                message: "token endpoint returned no token".to_string(),
            })?;
        self.tokens
            .put(scope, CachedToken::with_ttl(token.clone(), ttl))
            .await;
        Ok(token)
    }
}

#[async_trait]
impl RegistryProvider for HubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Hub
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn matches(&self, image: &Image) -> bool {
        let host = registry_host(&image.registry.url);
        host.is_empty() || host == "docker.io" || host.ends_with(".docker.io")
    }

    fn normalize_image(&self, mut image: Image) -> Image {
        image.registry.name = self.label();
        image.registry.url = REGISTRY_URL.to_string();
        if !image.name.contains('/') {
            image.name = format!("library/{}", image.name);
        }
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
            "login": self.config.login,
            "token": mask(self.config.token.as_deref()),
        })
    }
}
