//! AWS Elastic Container Registry provider.
//!
//! Matches `<account>.dkr.ecr.<region>.amazonaws.com` domains. The AWS SDK
//! issues a temporary authorization token (an already-encoded `user:password`
//! pair) with an explicit expiry of about twelve hours; it is cached and
//! refreshed lazily, a few minutes before it expires.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ecr::config::Credentials;
use aws_sdk_ecr::Client as EcrClient;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use argus_core::Image;

use crate::auth::{mask, CachedToken};
use crate::error::RegistryError;
use crate::provider::{
    build_http_client, registry_host, ProviderKind, RegistryProvider, RequestOptions,
};

static ECR_HOST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+\.dkr\.ecr\.[a-z0-9-]+\.amazonaws\.com$").expect("host pattern is valid")
});

/// AWS ECR configuration.
#[derive(Debug, Clone)]
pub struct EcrConfig {
    /// AWS region of the registry.
    pub region: String,

    /// Static access key id; the default credential chain is used when
    /// absent.
    pub access_key_id: Option<String>,

    /// Static secret access key.
    pub secret_access_key: Option<String>,
}

/// AWS Elastic Container Registry provider.
#[derive(Debug)]
pub struct EcrProvider {
    name: String,
    config: EcrConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl EcrProvider {
    /// Creates an ECR provider.
    ///
    /// # Errors
    ///
    /// Returns an error when the region is empty or only one half of the
    /// static credentials is set.
    pub fn new(name: impl Into<String>, config: EcrConfig) -> Result<Self, RegistryError> {
        let name = name.into();
        if config.region.is_empty() {
            return Err(RegistryError::InvalidConfiguration {
                provider: format!("ecr.{name}"),
                message: "region is required".to_string(),
            });
        }
        if config.access_key_id.is_some() != config.secret_access_key.is_some() {
            return Err(RegistryError::InvalidConfiguration {
                provider: format!("ecr.{name}"),
                message: "accesskeyid and secretaccesskey must be set together".to_string(),
            });
        }
        Ok(Self {
            name,
            config,
            http: build_http_client()?,
            token: Mutex::new(None),
        })
    }

    /// Returns the SDK-issued authorization token, refreshing it shortly
    /// before its expiry.
    async fn authorization_token(&self) -> Result<String, RegistryError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        let aws_config = if let (Some(access_key), Some(secret_key)) =
            (&self.config.access_key_id, &self.config.secret_access_key)
        {
            let credentials = Credentials::new(access_key, secret_key, None, None, "static");
            aws_config::defaults(BehaviorVersion::latest())
                .credentials_provider(credentials)
                .region(Region::new(self.config.region.clone()))
                .load()
                .await
        } else {
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(self.config.region.clone()))
                .load()
                .await
        };
        let client = EcrClient::new(&aws_config);

        let response = client.get_authorization_token().send().await.map_err(|e| {
            RegistryError::CredentialProvider {
                message: format!("GetAuthorizationToken failed: {e}"),
            }
        })?;
        let data = response
            .authorization_data()
            .first()
            .ok_or_else(|| RegistryError::CredentialProvider {
                message: "GetAuthorizationToken returned no authorization data".to_string(),
            })?;
        let token = data
            .authorization_token()
            .ok_or_else(|| RegistryError::CredentialProvider {
                message: "authorization data carries no token".to_string(),
            })?
            .to_string();

        let fresh = match data.expires_at().and_then(|at| {
            DateTime::<Utc>::from_timestamp(at.secs(), at.subsec_nanos())
        }) {
            Some(expires_at) => CachedToken::with_expiry(token.clone(), expires_at),
            None => CachedToken {
                token: token.clone(),
                expires_at: None,
            },
        };
        tracing::debug!(provider = %self.label(), "Refreshed ECR authorization token");
        *cached = Some(fresh);
        Ok(token)
    }
}

#[async_trait]
impl RegistryProvider for EcrProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ecr
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn matches(&self, image: &Image) -> bool {
        ECR_HOST_RE.is_match(registry_host(&image.registry.url))
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
        let token = self.authorization_token().await?;
        options.authorization = Some(format!("Basic {token}"));
        Ok(options)
    }

    async fn invalidate_auth(&self) {
        *self.token.lock().await = None;
    }

    fn masked_configuration(&self) -> Value {
        json!({
            "region": self.config.region,
            "accesskeyid": self.config.access_key_id,
            "secretaccesskey": mask(self.config.secret_access_key.as_deref()),
        })
    }
}
