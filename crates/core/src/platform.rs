//! Platform descriptors and index child selection.
//!
//! Platforms use the OCI spelling: `os/arch[/variant][:osversion]`, e.g.
//! `linux/arm64/v8` or `windows/amd64:10.0.17763.1879`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

use crate::entity::SignedEntity;
use crate::reference::ImageReference;
use crate::{Error, Result};

/// Target platform of an image in a multi-platform index.
///
/// Two platforms are equal only when every field matches exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system (linux, windows, ...).
    pub os: String,
    /// CPU architecture (amd64, arm64, ...).
    pub architecture: String,
    /// Architecture variant (v7, v8, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Operating system version.
    #[serde(rename = "os.version", default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
}

impl Platform {
    /// Create a platform from OS and architecture.
    #[must_use]
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
            variant: None,
            os_version: None,
        }
    }

    /// Set the architecture variant. Empty strings mean no variant.
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = non_empty(variant.into());
        self
    }

    /// Set the OS version. Empty strings mean no version.
    #[must_use]
    pub fn with_os_version(mut self, os_version: impl Into<String>) -> Self {
        self.os_version = non_empty(os_version.into());
        self
    }

    /// Parse `os/arch[/variant][:osversion]`.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let (spec, os_version) = match trimmed.split_once(':') {
            Some((_, version)) if version.contains(':') => {
                return Err(Error::invalid_platform(text, "too many colons"));
            }
            Some((spec, version)) => (spec, version),
            None => (trimmed, ""),
        };

        let parts: Vec<&str> = spec.split('/').collect();
        if parts.len() > 3 {
            return Err(Error::invalid_platform(text, "too many slashes"));
        }
        let os = parts.first().copied().unwrap_or_default();
        let architecture = parts.get(1).copied().unwrap_or_default();
        if os.is_empty() || architecture.is_empty() {
            return Err(Error::invalid_platform(
                text,
                "both os and architecture are required",
            ));
        }
        let variant = parts.get(2).copied().unwrap_or_default();

        Ok(Self::new(os, architecture)
            .with_variant(variant)
            .with_os_version(os_version))
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{variant}")?;
        }
        if let Some(os_version) = &self.os_version {
            write!(f, ":{os_version}")?;
        }
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Parse the CLI-layer platform option. An empty string means no filter.
pub fn parse_platform_filter(text: &str) -> Result<Option<Platform>> {
    if text.trim().is_empty() {
        Ok(None)
    } else {
        Platform::parse(text).map(Some)
    }
}

/// Resolve the index child matching `platform` to a digest reference.
///
/// Descriptors are scanned in manifest order and the first exact match wins.
pub async fn select_child(entity: &dyn SignedEntity, platform: &Platform) -> Result<ImageReference> {
    let reference = entity.reference();
    let Some(index) = entity.as_index() else {
        return Err(Error::not_an_index(reference));
    };

    let manifest = index
        .index_manifest()
        .await
        .map_err(|e| Error::index_manifest(platform, reference, e))?;
    trace!(%reference, children = manifest.manifests.len(), "Scanning index manifest");

    match manifest.find_platform(platform) {
        Some(descriptor) => {
            debug!(%reference, %platform, digest = %descriptor.digest, "Matched index child");
            Ok(reference.with_digest(&descriptor.digest))
        }
        None => Err(Error::platform_not_found(platform, reference)),
    }
}
