//! Azure Container Registry provider.
//!
//! Matches `*.azurecr.io` domains. Authentication is static basic auth with
//! a service principal's client id and secret.

use async_trait::async_trait;
use serde_json::{json, Value};

use argus_core::Image;

use crate::auth::{base64_encode, mask};
use crate::error::RegistryError;
use crate::provider::{
    build_http_client, registry_host, ProviderKind, RegistryProvider, RequestOptions,
};

/// Azure Container Registry configuration.
#[derive(Debug, Clone)]
pub struct AcrConfig {
    /// Service principal client id.
    pub client_id: String,

    /// Service principal client secret.
    pub client_secret: String,
}

/// Azure Container Registry provider.
#[derive(Debug)]
pub struct AcrProvider {
    name: String,
    config: AcrConfig,
    http: reqwest::Client,
    authorization: String,
}

impl AcrProvider {
    /// Creates an ACR provider.
    ///
    /// # Errors
    ///
    /// Returns an error when the client id or secret is empty.
    pub fn new(name: impl Into<String>, config: AcrConfig) -> Result<Self, RegistryError> {
        let name = name.into();
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(RegistryError::InvalidConfiguration {
                provider: format!("acr.{name}"),
                message: "clientid and clientsecret are required".to_string(),
            });
        }
        let authorization = format!(
            "Basic {}",
            base64_encode(&config.client_id, &config.client_secret)
        );
        Ok(Self {
            name,
            config,
            http: build_http_client()?,
            authorization,
        })
    }
}

#[async_trait]
impl RegistryProvider for AcrProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Acr
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn matches(&self, image: &Image) -> bool {
        registry_host(&image.registry.url).ends_with(".azurecr.io")
    }

    fn normalize_image(&self, mut image: Image) -> Image {
        let host = registry_host(&image.registry.url).to_string();
        image.registry.name = self.label();
        image.registry.url = format!("https://{host}/v2");
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
            "clientid": self.config.client_id,
            "clientsecret": mask(Some(&self.config.client_secret)),
        })
    }
}
