//! GitHub Container Registry provider.
//!
//! `ghcr.io` accepts the Base64 of a personal access token as a bearer
//! token; the Base64 of an empty string grants anonymous access to public
//! packages.

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};

use argus_core::Image;

use crate::auth::mask;
use crate::error::RegistryError;
use crate::provider::{
    build_http_client, registry_host, ProviderKind, RegistryProvider, RequestOptions,
};

const REGISTRY_HOST: &str = "ghcr.io";

/// GitHub Container Registry configuration.
#[derive(Debug, Clone, Default)]
pub struct GhcrConfig {
    /// GitHub username (informational).
    pub username: Option<String>,

    /// Personal access token with `read:packages`.
    pub token: Option<String>,
}

/// GitHub Container Registry provider.
#[derive(Debug)]
pub struct GhcrProvider {
    name: String,
    config: GhcrConfig,
    http: reqwest::Client,
    authorization: String,
}

impl GhcrProvider {
    /// Creates a GHCR provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(name: impl Into<String>, config: GhcrConfig) -> Result<Self, RegistryError> {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(config.token.as_deref().unwrap_or_default());
        Ok(Self {
            name: name.into(),
            config,
            http: build_http_client()?,
            authorization: format!("Bearer {encoded}"),
        })
    }
}

#[async_trait]
impl RegistryProvider for GhcrProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ghcr
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
        _image: &Image,
        mut options: RequestOptions,
    ) -> Result<RequestOptions, RegistryError> {
        options.authorization = Some(self.authorization.clone());
        Ok(options)
    }

    fn masked_configuration(&self) -> Value {
        json!({
            "username": self.config.username,
            "token": mask(self.config.token.as_deref()),
        })
    }
}
