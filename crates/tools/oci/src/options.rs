//! Registry and download options.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable naming a repository that holds signatures and attachments.
pub const ENV_REPOSITORY: &str = "SIGFETCH_REPOSITORY";
/// Environment variable enabling plain HTTP registry access.
pub const ENV_ALLOW_INSECURE: &str = "SIGFETCH_ALLOW_INSECURE";
/// Environment variable overriding the member fetch concurrency.
pub const ENV_CONCURRENCY: &str = "SIGFETCH_CONCURRENCY";

/// How to reach and authenticate against the registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryOptions {
    /// Talk to the registry over plain HTTP.
    pub allow_insecure: bool,

    /// Basic auth user name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic auth password or token. Never serialized.
    #[serde(skip_serializing)]
    pub password: Option<SecretString>,

    /// Repository (`registry/path`) where attached artifacts are stored
    /// instead of next to the image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Prefix prepended to attached artifact tags.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag_prefix: String,

    /// Bound on concurrently fetched signatures or attestations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

impl RegistryOptions {
    /// Defaults overlaid with `SIGFETCH_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup` onto these options.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(repository) = lookup(ENV_REPOSITORY).filter(|v| !v.is_empty()) {
            self.repository = Some(repository);
        }
        if let Some(value) = lookup(ENV_ALLOW_INSECURE) {
            self.allow_insecure = parse_bool(ENV_ALLOW_INSECURE, &value)?;
        }
        if let Some(value) = lookup(ENV_CONCURRENCY) {
            self.concurrency = Some(parse_concurrency(&value)?);
        }
        Ok(self)
    }
}

/// Options for `download sbom`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadSbomOptions {
    /// Platform filter `os/arch[/variant][:osversion]`. Empty selects the
    /// reference itself.
    pub platform: String,

    /// Registry access.
    pub registry: RegistryOptions,
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(key, value, "use true or false")),
    }
}

fn parse_concurrency(value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::config(
            ENV_CONCURRENCY,
            value,
            "use a positive integer",
        )),
    }
}
