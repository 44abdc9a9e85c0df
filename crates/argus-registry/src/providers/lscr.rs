//! linuxserver.io registry provider.
//!
//! `lscr.io` fronts GitHub Container Registry for linuxserver images, so it
//! authenticates the same way: the Base64 of a GitHub token (or of the empty
//! string for anonymous access) as a bearer token.

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};

use argus_core::Image;

use crate::auth::mask;
use crate::error::RegistryError;
use crate::provider::{
    build_http_client, registry_host, ProviderKind, RegistryProvider, RequestOptions,
};

const REGISTRY_HOST: &str = "lscr.io";

/// linuxserver.io registry configuration.
#[derive(Debug, Clone, Default)]
pub struct LscrConfig {
    /// GitHub username (informational).
    pub username: Option<String>,

    /// GitHub personal access token.
    pub token: Option<String>,
}

/// linuxserver.io registry provider.
#[derive(Debug)]
pub struct LscrProvider {
    name: String,
    config: LscrConfig,
    http: reqwest::Client,
    authorization: String,
}

impl LscrProvider {
    /// Creates an LSCR provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(name: impl Into<String>, config: LscrConfig) -> Result<Self, RegistryError> {
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
impl RegistryProvider for LscrProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Lscr
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::image;

    #[test]
    fn test_matches_lscr_host() {
        let p = LscrProvider::new("lscr", LscrConfig::default()).unwrap();
        assert!(p.matches(&image("lscr.io", "linuxserver/sonarr", "4.0.0")));
        assert!(!p.matches(&image("ghcr.io", "owner/app", "1.0.0")));
    }

    #[test]
    fn test_match_recognizes_own_normalized_output() {
        let p = LscrProvider::new("lscr", LscrConfig::default()).unwrap();
        let normalized = p.normalize_image(image("lscr.io", "linuxserver/sonarr", "4.0.0"));
        assert_eq!(normalized.registry.url, "https://lscr.io/v2");
        assert!(p.matches(&normalized));
    }
}
