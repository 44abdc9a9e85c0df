//! Gitea and Forgejo container registry provider.
//!
//! Both forges speak the Distribution API behind a bearer challenge: an
//! unauthenticated probe of `/v2/` yields a `WWW-Authenticate` header whose
//! realm issues short-lived tokens against the configured credentials. A
//! registry replying with a `Basic` challenge (or no challenge at all) is
//! handled by falling back to static basic auth / anonymous access.

use async_trait::async_trait;
use serde_json::{json, Value};

use argus_core::Image;

use crate::auth::{base64_encode, mask, BearerChallenge, CachedToken, TokenCache, TokenResponse};
use crate::error::RegistryError;
use crate::provider::{
    build_http_client, registry_host, ProviderKind, RegistryProvider, RequestOptions,
};

/// Fallback token lifetime when the endpoint does not report one.
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 300;

/// Gitea/Forgejo registry configuration.
#[derive(Debug, Clone)]
pub struct GiteaConfig {
    /// Forge URL (e.g. `https://gitea.example.com`).
    pub url: String,

    /// Login for the token exchange.
    pub login: Option<String>,

    /// Password or application token.
    pub password: Option<String>,
}

/// Gitea/Forgejo container registry provider.
#[derive(Debug)]
pub struct GiteaProvider {
    name: String,
    kind: ProviderKind,
    config: GiteaConfig,
    http: reqwest::Client,
    tokens: TokenCache,
}

impl GiteaProvider {
    /// Creates a Gitea provider.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is missing a scheme or only one half of
    /// the credentials is set.
    pub fn gitea(name: impl Into<String>, config: GiteaConfig) -> Result<Self, RegistryError> {
        Self::new(name, ProviderKind::Gitea, config)
    }

    /// Creates a Forgejo provider (Gitea-compatible registry API).
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is missing a scheme or only one half of
    /// the credentials is set.
    pub fn forgejo(name: impl Into<String>, config: GiteaConfig) -> Result<Self, RegistryError> {
        Self::new(name, ProviderKind::Forgejo, config)
    }

    fn new(
        name: impl Into<String>,
        kind: ProviderKind,
        config: GiteaConfig,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            return Err(RegistryError::InvalidConfiguration {
                provider: format!("{kind}.{name}"),
                message: format!("url must carry a scheme: {}", config.url),
            });
        }
        if config.login.is_some() != config.password.is_some() {
            return Err(RegistryError::InvalidConfiguration {
                provider: format!("{kind}.{name}"),
                message: "login and password must be set together".to_string(),
            });
        }
        Ok(Self {
            name,
            kind,
            config,
            http: build_http_client()?,
            tokens: TokenCache::new(),
        })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn basic_authorization(&self) -> Option<String> {
        match (&self.config.login, &self.config.password) {
            (Some(login), Some(password)) => {
                Some(format!("Basic {}", base64_encode(login, password)))
            }
            _ => None,
        }
    }

    /// Probes `/v2/` for a challenge and exchanges credentials at its realm.
    ///
    /// Returns `None` when the registry requires no authentication or only
    /// supports basic auth (the caller then falls back accordingly).
    async fn fetch_token(&self, image: &Image) -> Result<Option<String>, RegistryError> {
        let scope = format!("repository:{}:pull", image.name);
        if let Some(token) = self.tokens.get(&scope).await {
            return Ok(Some(token));
        }

        let probe = self
            .http
            .get(format!("{}/v2/", self.base_url()))
            .send()
            .await
            .map_err(RegistryError::from)?;
        if probe.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        let Some(header) = probe
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
        else {
            return Err(RegistryError::InvalidChallenge {
                message: "registry rejected the request without a challenge".to_string(),
            });
        };
        if header.trim_start().starts_with("Basic") {
            return Ok(None);
        }
        let challenge = BearerChallenge::parse(header)?;

        let mut request = self.http.get(&challenge.realm).query(&[("scope", &scope)]);
        if let Some(service) = &challenge.service {
            request = request.query(&[("service", service)]);
        }
        if let (Some(login), Some(password)) = (&self.config.login, &self.config.password) {
            request = request.basic_auth(login, Some(password));
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
        Ok(Some(token))
    }
}

#[async_trait]
impl RegistryProvider for GiteaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn matches(&self, image: &Image) -> bool {
        registry_host(&image.registry.url) == registry_host(&self.config.url)
    }

    fn normalize_image(&self, mut image: Image) -> Image {
        image.registry.name = self.label();
        image.registry.url = format!("{}/v2", self.base_url());
        image
    }

    async fn authenticate(
        &self,
        image: &Image,
        mut options: RequestOptions,
    ) -> Result<RequestOptions, RegistryError> {
        options.authorization = match self.fetch_token(image).await? {
            Some(token) => Some(format!("Bearer {token}")),
            None => self.basic_authorization(),
        };
        Ok(options)
    }

    async fn invalidate_auth(&self) {
        self.tokens.clear().await;
    }

    fn masked_configuration(&self) -> Value {
        json!({
            "url": self.config.url,
            "login": self.config.login,
            "password": mask(self.config.password.as_deref()),
        })
    }
}
