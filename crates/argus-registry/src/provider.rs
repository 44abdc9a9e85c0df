//! The registry provider contract and its shared Distribution-API logic.
//!
//! Every supported registry vendor implements [`RegistryProvider`]. The
//! vendor-specific parts are image matching, normalization and
//! authentication; tag listing and manifest digest resolution are shared
//! default implementations speaking the Distribution API, with a single
//! transparent re-authentication retry on a 401 rejection.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;

use argus_core::Image;

use crate::error::RegistryError;
use crate::manifest::{
    media_type, ManifestDigest, ManifestRef, ManifestResponse, TagList, V1Compat,
};

/// Timeout applied to every registry request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size requested from the `tags/list` endpoint (not honoured by all
/// registries).
const TAGS_PAGE_SIZE: usize = 1000;

/// Supported registry vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Docker Hub.
    Hub,
    /// Self-hosted Distribution-API registry.
    Custom,
    /// AWS Elastic Container Registry.
    Ecr,
    /// Google Container Registry.
    Gcr,
    /// GitHub Container Registry.
    Ghcr,
    /// Azure Container Registry.
    Acr,
    /// Quay.io.
    Quay,
    /// GitLab container registry.
    Gitlab,
    /// Gitea container registry.
    Gitea,
    /// Forgejo container registry.
    Forgejo,
    /// linuxserver.io registry.
    Lscr,
}

impl ProviderKind {
    /// Returns the short name of the vendor.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hub => "hub",
            Self::Custom => "custom",
            Self::Ecr => "ecr",
            Self::Gcr => "gcr",
            Self::Ghcr => "ghcr",
            Self::Acr => "acr",
            Self::Quay => "quay",
            Self::Gitlab => "gitlab",
            Self::Gitea => "gitea",
            Self::Forgejo => "forgejo",
            Self::Lscr => "lscr",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP method of a registry request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request.
    Get,
    /// HEAD request.
    Head,
}

/// A registry request before authentication decorates it.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Target URL.
    pub url: String,

    /// HTTP method.
    pub method: HttpMethod,

    /// `Accept` header value.
    pub accept: Option<String>,

    /// `Authorization` header value, attached by the provider.
    pub authorization: Option<String>,
}

impl RequestOptions {
    /// Creates a GET request accepting JSON.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            accept: Some("application/json".to_string()),
            authorization: None,
        }
    }

    /// Creates a HEAD request.
    #[must_use]
    pub fn head(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Head,
            accept: None,
            authorization: None,
        }
    }

    /// Sets the `Accept` header.
    #[must_use]
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }
}

/// Builds the HTTP client shared by a provider instance.
///
/// # Errors
///
/// Returns an error if the client cannot be constructed.
pub fn build_http_client() -> Result<reqwest::Client, RegistryError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("argus-registry/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|source| RegistryError::ConnectionFailed {
            url: "client".to_string(),
            source,
        })
}

/// Strips the scheme and path from a registry URL, leaving the host
/// (with port, when present).
#[must_use]
pub fn registry_host(url: &str) -> &str {
    let host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    host.split('/').next().unwrap_or(host)
}

/// The registry-access contract implemented once per supported vendor.
#[async_trait]
pub trait RegistryProvider: Send + Sync {
    /// Instance name (distinguishes multiple configurations of one vendor).
    fn name(&self) -> &str;

    /// Vendor kind.
    fn kind(&self) -> ProviderKind;

    /// HTTP client owned by this instance.
    fn http(&self) -> &reqwest::Client;

    /// Returns true when this provider governs the given image.
    fn matches(&self, image: &Image) -> bool;

    /// Rewrites the image's registry name and URL to this provider's
    /// canonical form, leaving name/tag/digest untouched.
    fn normalize_image(&self, image: Image) -> Image;

    /// Attaches this provider's credential material to a request.
    async fn authenticate(
        &self,
        image: &Image,
        options: RequestOptions,
    ) -> Result<RequestOptions, RegistryError>;

    /// Drops any cached authentication state, forcing a fresh exchange on
    /// the next call.
    async fn invalidate_auth(&self) {}

    /// Configuration with sensitive values masked, for display.
    fn masked_configuration(&self) -> Value;

    /// Display label: the vendor name, qualified with the instance name when
    /// they differ.
    fn label(&self) -> String {
        let kind = self.kind().as_str();
        if self.name() == kind {
            kind.to_string()
        } else {
            format!("{kind}.{}", self.name())
        }
    }

    /// Executes a registry request, transparently re-authenticating once and
    /// retrying when the registry rejects the credentials.
    async fn call(
        &self,
        image: &Image,
        options: RequestOptions,
    ) -> Result<reqwest::Response, RegistryError> {
        let authenticated = self.authenticate(image, options.clone()).await?;
        let response = send(self.http(), &authenticated).await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::debug!(
                provider = %self.label(),
                url = %options.url,
                "Registry rejected credentials, re-authenticating once"
            );
            self.invalidate_auth().await;
            let authenticated = self.authenticate(image, options).await?;
            let response = send(self.http(), &authenticated).await?;
            return check(response).await;
        }
        check(response).await
    }

    /// Returns every tag known for the image's repository, newest-sorting
    /// (reverse-alphabetical) first, following pagination links.
    async fn get_tags(&self, image: &Image) -> Result<Vec<String>, RegistryError> {
        tracing::debug!(provider = %self.label(), image = %image.name, "Listing tags");
        let mut tags: Vec<String> = Vec::new();
        let mut url = format!(
            "{}/{}/tags/list?n={TAGS_PAGE_SIZE}",
            image.registry.url, image.name
        );
        loop {
            let response = self.call(image, RequestOptions::get(&url)).await?;
            let next = next_page_url(&response, &image.registry.url)?;
            let page: TagList = response.json().await.map_err(RegistryError::from)?;
            tags.extend(page.tags.unwrap_or_default());
            match next {
                Some(next) => url = next,
                None => break,
            }
        }
        tags.sort();
        tags.reverse();
        Ok(tags)
    }

    /// Resolves the manifest digest for the image's current tag, or for a
    /// supplied digest reference.
    ///
    /// Manifest lists are filtered down to the image's platform. Legacy
    /// schema v1 manifests report `version == 1` and carry the parent image
    /// hash and creation timestamp instead of a registry digest.
    async fn get_manifest_digest(
        &self,
        image: &Image,
        reference: Option<&str>,
    ) -> Result<ManifestDigest, RegistryError> {
        let reference = reference.unwrap_or(image.tag.value.as_str());
        tracing::debug!(
            provider = %self.label(),
            image = %image.name,
            reference,
            "Resolving manifest digest"
        );
        let url = format!("{}/{}/manifests/{reference}", image.registry.url, image.name);
        let accept = format!("{}, {}", media_type::MANIFEST_LIST_V2, media_type::OCI_INDEX);
        let response = self
            .call(image, RequestOptions::get(&url).with_accept(accept))
            .await?;
        let manifests: ManifestResponse = response.json().await.map_err(RegistryError::from)?;

        if manifests.schema_version == 1 {
            return v1_manifest_digest(image, &manifests);
        }

        let (digest, media) = select_manifest(image, &manifests);
        let Some(digest) = digest else {
            return Err(RegistryError::ManifestNotFound {
                image: image.name.clone(),
            });
        };
        match media.as_deref() {
            Some(media)
                if media == media_type::MANIFEST_V2 || media == media_type::OCI_MANIFEST =>
            {
                // The canonical digest travels in the headers of the
                // per-platform manifest itself.
                let url = format!("{}/{}/manifests/{digest}", image.registry.url, image.name);
                let response = self
                    .call(image, RequestOptions::head(&url).with_accept(media))
                    .await?;
                let content_digest = response
                    .headers()
                    .get("docker-content-digest")
                    .and_then(|v| v.to_str().ok())
                    .map(ToString::to_string);
                Ok(ManifestDigest {
                    digest: content_digest,
                    created: None,
                    version: 2,
                })
            }
            Some(media)
                if media == media_type::CONTAINER_CONFIG_V1 || media == media_type::OCI_CONFIG =>
            {
                Ok(ManifestDigest {
                    digest: Some(digest),
                    created: None,
                    version: 1,
                })
            }
            _ => Err(RegistryError::ManifestNotFound {
                image: image.name.clone(),
            }),
        }
    }
}

/// Extracts the digest and created timestamp of a legacy v1 manifest.
fn v1_manifest_digest(
    image: &Image,
    manifests: &ManifestResponse,
) -> Result<ManifestDigest, RegistryError> {
    let entry = manifests
        .history
        .as_ref()
        .and_then(|h| h.first())
        .ok_or_else(|| RegistryError::ManifestNotFound {
            image: image.name.clone(),
        })?;
    let compat: V1Compat = serde_json::from_str(&entry.v1_compatibility)?;
    Ok(ManifestDigest {
        digest: compat.config.and_then(|c| c.image),
        created: compat.created,
        version: 1,
    })
}

/// Picks the digest and media type relevant to the image's platform.
fn select_manifest(image: &Image, manifests: &ManifestResponse) -> (Option<String>, Option<String>) {
    match manifests.media_type.as_deref() {
        Some(media)
            if media == media_type::MANIFEST_LIST_V2 || media == media_type::OCI_INDEX =>
        {
            let entries: Vec<&ManifestRef> = manifests
                .manifests
                .as_deref()
                .unwrap_or_default()
                .iter()
                .filter(|m| {
                    m.platform.as_ref().is_some_and(|p| {
                        p.architecture == image.architecture && p.os == image.os
                    })
                })
                .collect();

            // One match at least? Take the first (better than nothing).
            let mut chosen = entries.first().copied();

            // Multiple matches? Refine using the variant, when one matches
            // exactly.
            if entries.len() > 1 {
                if let Some(refined) = entries.iter().find(|m| {
                    m.platform
                        .as_ref()
                        .and_then(|p| p.variant.as_deref())
                        .is_some_and(|v| image.variants.iter().any(|iv| iv == v))
                }) {
                    chosen = Some(*refined);
                }
            }

            chosen.map_or((None, None), |m| {
                (Some(m.digest.clone()), m.media_type.clone())
            })
        }
        Some(media) if media == media_type::MANIFEST_V2 || media == media_type::OCI_MANIFEST => {
            manifests.config.as_ref().map_or((None, None), |c| {
                (Some(c.digest.clone()), c.media_type.clone())
            })
        }
        _ => (None, None),
    }
}

/// Sends a request with its negotiated headers.
async fn send(
    client: &reqwest::Client,
    options: &RequestOptions,
) -> Result<reqwest::Response, RegistryError> {
    let mut request = match options.method {
        HttpMethod::Get => client.get(&options.url),
        HttpMethod::Head => client.head(&options.url),
    };
    if let Some(accept) = &options.accept {
        request = request.header(ACCEPT, accept);
    }
    if let Some(authorization) = &options.authorization {
        request = request.header(AUTHORIZATION, authorization);
    }
    request.send().await.map_err(RegistryError::from)
}

/// Maps non-success responses to errors.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RegistryError::HttpError {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }
}

/// Resolves the pagination link of a `tags/list` response against the
/// registry root.
fn next_page_url(
    response: &reqwest::Response,
    registry_url: &str,
) -> Result<Option<String>, RegistryError> {
    let Some(link) = response.headers().get(reqwest::header::LINK) else {
        return Ok(None);
    };
    let Ok(link) = link.to_str() else {
        return Ok(None);
    };
    let Some(target) = link
        .split(';')
        .next()
        .map(str::trim)
        .and_then(|part| part.strip_prefix('<')?.strip_suffix('>'))
    else {
        return Ok(None);
    };
    let base = url::Url::parse(registry_url).map_err(|_| RegistryError::InvalidUrl {
        url: registry_url.to_string(),
    })?;
    let joined = base.join(target).map_err(|_| RegistryError::InvalidUrl {
        url: target.to_string(),
    })?;
    Ok(Some(joined.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_names() {
        assert_eq!(ProviderKind::Hub.as_str(), "hub");
        assert_eq!(ProviderKind::Forgejo.to_string(), "forgejo");
    }

    #[test]
    fn test_registry_host() {
        assert_eq!(
            registry_host("https://registry-1.docker.io/v2"),
            "registry-1.docker.io"
        );
        assert_eq!(
            registry_host("http://registry.example.com:5000/v2"),
            "registry.example.com:5000"
        );
        assert_eq!(registry_host("ghcr.io"), "ghcr.io");
        assert_eq!(registry_host(""), "");
    }

    #[test]
    fn test_request_options_builders() {
        let get = RequestOptions::get("https://example.com/v2/_catalog");
        assert_eq!(get.method, HttpMethod::Get);
        assert_eq!(get.accept.as_deref(), Some("application/json"));

        let head = RequestOptions::head("https://example.com/v2/x/manifests/y")
            .with_accept(media_type::MANIFEST_V2);
        assert_eq!(head.method, HttpMethod::Head);
        assert_eq!(head.accept.as_deref(), Some(media_type::MANIFEST_V2));
    }
}
