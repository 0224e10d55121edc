//! Image reference resolution.
//!
//! Parses user-supplied text into a repository coordinate qualified by a tag
//! or a digest. Parsing never touches the network; tags are resolved by the
//! registry client when the entity is opened.

use oci_distribution::Reference;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A validated registry coordinate: repository plus tag or digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    inner: Reference,
}

impl ImageReference {
    /// Parse a reference such as `ghcr.io/org/app:v1` or `app@sha256:...`.
    pub fn parse(text: &str) -> Result<Self> {
        let inner = text
            .parse::<Reference>()
            .map_err(|e: oci_distribution::ParseError| Error::invalid_reference(text, e.to_string()))?;
        Ok(Self { inner })
    }

    /// Registry host (e.g. `ghcr.io`).
    #[must_use]
    pub fn registry(&self) -> &str {
        self.inner.registry()
    }

    /// Repository path within the registry.
    #[must_use]
    pub fn repository(&self) -> &str {
        self.inner.repository()
    }

    /// Tag, if the reference names one.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.inner.tag()
    }

    /// Digest, if the reference is content-addressed.
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.inner.digest()
    }

    /// Same repository, pinned to `digest`.
    #[must_use]
    pub fn with_digest(&self, digest: &str) -> Self {
        Self {
            inner: Reference::with_digest(
                self.inner.registry().to_string(),
                self.inner.repository().to_string(),
                digest.to_string(),
            ),
        }
    }

    /// Same registry, different repository, tagged `tag`.
    #[must_use]
    pub fn with_repository_tag(&self, repository: &str, tag: &str) -> Self {
        Self {
            inner: Reference::with_tag(
                self.inner.registry().to_string(),
                repository.to_string(),
                tag.to_string(),
            ),
        }
    }

    /// The underlying transport reference.
    #[must_use]
    pub fn as_oci(&self) -> &Reference {
        &self.inner
    }
}

impl FromStr for ImageReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.whole())
    }
}

impl From<Reference> for ImageReference {
    fn from(inner: Reference) -> Self {
        Self { inner }
    }
}

/// Parse a reference string.
pub fn resolve(text: &str) -> Result<ImageReference> {
    ImageReference::parse(text)
}
