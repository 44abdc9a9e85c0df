//! Container image reference parsing.
//!
//! Splits references like `registry.example.com:5000/org/app:1.2.3@sha256:…`
//! into domain, repository path, tag and digest. The domain is only present
//! when the first path component contains a dot or colon or is `localhost`;
//! bare references like `nginx` or `org/app` carry no domain and are resolved
//! to the default registry during normalization.

use thiserror::Error;

/// Errors produced when parsing an image reference.
#[derive(Debug, Error)]
pub enum ImageRefError {
    /// The reference was empty.
    #[error("image reference cannot be empty")]
    Empty,

    /// The reference contained an unexpected character.
    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),
}

/// A parsed container image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry domain (host, optionally with port), when present.
    pub domain: Option<String>,

    /// Repository path (e.g. `org/app`).
    pub path: String,

    /// Tag, when present.
    pub tag: Option<String>,

    /// Digest, when present.
    pub digest: Option<String>,
}

impl ImageRef {
    /// Parses an image reference.
    ///
    /// # Errors
    ///
    /// Returns an error when the reference is empty or contains characters
    /// outside the OCI reference grammar.
    pub fn parse(input: &str) -> Result<Self, ImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ImageRefError::Empty);
        }
        if let Some(c) = input
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '/' | ':' | '.' | '-' | '_' | '@'))
        {
            return Err(ImageRefError::InvalidChar(c));
        }

        let (without_digest, digest) = match input.split_once('@') {
            Some((before, after)) => (before, Some(after.to_string())),
            None => (input, None),
        };

        let (without_tag, tag) = match without_digest.rsplit_once(':') {
            // A colon followed by a slash belongs to a registry port, not a tag
            Some((_, after)) if after.contains('/') => (without_digest, None),
            Some((before, after)) => (before, Some(after.to_string())),
            None => (without_digest, None),
        };

        let (domain, path) = Self::split_domain(without_tag);

        Ok(Self {
            domain,
            path,
            tag,
            digest,
        })
    }

    /// Splits a reference into registry domain and repository path.
    fn split_domain(input: &str) -> (Option<String>, String) {
        match input.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), rest.to_string())
            }
            _ => (None, input.to_string()),
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(domain) = &self.domain {
            write!(f, "{domain}/")?;
        }
        write!(f, "{}", self.path)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}
