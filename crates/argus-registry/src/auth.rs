//! Authentication building blocks shared by the providers.
//!
//! Providers that exchange credentials for short-lived bearer tokens cache
//! them here, keyed by scope, and refresh lazily on the next call after
//! expiry. Tokens with an explicit expiry are refreshed a few minutes early
//! so a token never expires mid-request.

use std::collections::HashMap;

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::RegistryError;

/// Safety margin applied to explicit token expiries.
const EARLY_REFRESH_MINUTES: i64 = 5;

/// A cached bearer token with its expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// Token value.
    pub token: String,

    /// Expiry timestamp; `None` means the token never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Creates a token expiring after `ttl_seconds`.
    #[must_use]
    pub fn with_ttl(token: impl Into<String>, ttl_seconds: i64) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(Utc::now() + Duration::seconds(ttl_seconds)),
        }
    }

    /// Creates a token with an explicit expiry timestamp.
    #[must_use]
    pub fn with_expiry(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(expires_at),
        }
    }

    /// Returns true when the token is expired or within the refresh margin.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| {
            Utc::now() + Duration::minutes(EARLY_REFRESH_MINUTES) >= expires_at
        })
    }
}

/// Scope-keyed token cache owned by one provider instance.
#[derive(Debug, Default)]
pub struct TokenCache {
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl TokenCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached, non-expired token for a scope.
    pub async fn get(&self, scope: &str) -> Option<String> {
        self.tokens
            .lock()
            .await
            .get(scope)
            .filter(|t| !t.is_expired())
            .map(|t| t.token.clone())
    }

    /// Stores a token for a scope.
    pub async fn put(&self, scope: impl Into<String>, token: CachedToken) {
        self.tokens.lock().await.insert(scope.into(), token);
    }

    /// Drops all cached tokens, forcing re-authentication on the next call.
    pub async fn clear(&self) {
        self.tokens.lock().await.clear();
    }
}

/// A parsed `WWW-Authenticate: Bearer …` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    /// Token endpoint.
    pub realm: String,

    /// Service parameter, when present.
    pub service: Option<String>,

    /// Scope parameter, when present.
    pub scope: Option<String>,
}

impl BearerChallenge {
    /// Parses a `WWW-Authenticate` header value.
    ///
    /// # Errors
    ///
    /// Returns an error when the header is not a bearer challenge or carries
    /// no realm.
    pub fn parse(header: &str) -> Result<Self, RegistryError> {
        let rest = header.trim().strip_prefix("Bearer ").ok_or_else(|| {
            RegistryError::InvalidChallenge {
                message: format!("not a bearer challenge: {header}"),
            }
        })?;

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for part in rest.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').to_string();
            match key.trim() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        let realm = realm.ok_or_else(|| RegistryError::InvalidChallenge {
            message: format!("challenge carries no realm: {header}"),
        })?;
        Ok(Self {
            realm,
            service,
            scope,
        })
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// Token value.
    pub token: Option<String>,

    /// Alternate token field used by some registries.
    pub access_token: Option<String>,

    /// Token lifetime in seconds.
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Returns whichever token field the registry populated.
    #[must_use]
    pub fn into_token(self) -> Option<String> {
        self.token.or(self.access_token)
    }
}

/// Encodes `login:token` as Base64 for basic authentication.
#[must_use]
pub fn base64_encode(login: &str, token: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{login}:{token}"))
}

/// Masks a sensitive value for display, keeping only short affixes.
#[must_use]
pub fn mask(value: Option<&str>) -> String {
    match value {
        None | Some("") => String::new(),
        Some(value) if value.len() <= 8 => "*".repeat(value.len()),
        Some(value) => format!(
            "{}{}{}",
            &value[..3],
            "*".repeat(value.len() - 6),
            &value[value.len() - 3..]
        ),
    }
}
