//! Self-hosted Distribution-API registry provider.
//!
//! Matches images whose registry domain equals the configured URL's host.
//! Authentication is static basic auth built at construction time; anonymous
//! access works when the registry permits it.

use async_trait::async_trait;
use serde_json::{json, Value};

use argus_core::Image;

use crate::auth::{base64_encode, mask};
use crate::error::RegistryError;
use crate::provider::{
    build_http_client, registry_host, ProviderKind, RegistryProvider, RequestOptions,
};

/// Configuration of a self-hosted registry.
#[derive(Debug, Clone)]
pub struct CustomConfig {
    /// Registry URL (e.g. `http://registry.example.com:5000`).
    pub url: String,

    /// Login for basic authentication.
    pub login: Option<String>,

    /// Password for basic authentication.
    pub password: Option<String>,
}

/// Self-hosted registry provider.
#[derive(Debug)]
pub struct CustomProvider {
    name: String,
    config: CustomConfig,
    http: reqwest::Client,
    authorization: Option<String>,
}

impl CustomProvider {
    /// Creates a provider for one self-hosted registry.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is missing a scheme or only one half of
    /// the credentials is set.
    pub fn new(name: impl Into<String>, config: CustomConfig) -> Result<Self, RegistryError> {
        let name = name.into();
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            return Err(RegistryError::InvalidConfiguration {
                provider: format!("custom.{name}"),
                message: format!("url must carry a scheme: {}", config.url),
            });
        }
        if config.login.is_some() != config.password.is_some() {
            return Err(RegistryError::InvalidConfiguration {
                provider: format!("custom.{name}"),
                message: "login and password must be set together".to_string(),
            });
        }
        let authorization = match (&config.login, &config.password) {
            (Some(login), Some(password)) => {
                Some(format!("Basic {}", base64_encode(login, password)))
            }
            _ => None,
        };
        Ok(Self {
            name,
            config,
            http: build_http_client()?,
            authorization,
        })
    }
}

#[async_trait]
impl RegistryProvider for CustomProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn matches(&self, image: &Image) -> bool {
        registry_host(&image.registry.url) == registry_host(&self.config.url)
    }

    fn normalize_image(&self, mut image: Image) -> Image {
        image.registry.name = self.label();
        image.registry.url = format!("{}/v2", self.config.url.trim_end_matches('/'));
        image
    }

    async fn authenticate(
        &self,
        _image: &Image,
        mut options: RequestOptions,
    ) -> Result<RequestOptions, RegistryError> {
        options.authorization.clone_from(&self.authorization);
        Ok(options)
    }

    fn masked_configuration(&self) -> Value {
        json!({
            "url": self.config.url,
            "login": self.config.login,
            "password": mask(self.config.password.as_deref()),
        })
    }
}
