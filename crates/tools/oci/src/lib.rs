//! OCI registry provider for sigfetch.
//!
//! This crate provides:
//! - A [`RegistryClient`](sigfetch_core::RegistryClient) over the OCI
//!   distribution API that reads signatures, attestations and attachments
//!   from digest-derived tags
//! - Registry options layered from configuration and the environment
//! - The `download sbom` operation
//!
//! # Example
//!
//! ```ignore
//! use sigfetch_oci::{DownloadSbomOptions, RegistryOptions, download_sbom};
//!
//! let options = DownloadSbomOptions {
//!     platform: "linux/arm64".to_string(),
//!     registry: RegistryOptions::from_env()?,
//! };
//! let sboms = download_sbom(&options, "ghcr.io/acme/app:v1", &mut std::io::stdout()).await?;
//! ```

mod error;
mod options;
mod registry;
mod sbom;
mod tags;

pub use error::{Error, Result};
pub use options::{
    DownloadSbomOptions, ENV_ALLOW_INSECURE, ENV_CONCURRENCY, ENV_REPOSITORY, RegistryOptions,
};
pub use registry::{
    BUNDLE_ANNOTATION, CERTIFICATE_ANNOTATION, CHAIN_ANNOTATION, OciRegistryClient,
    SIGNATURE_ANNOTATION,
};
pub use sbom::{download_sbom, download_sbom_with};
pub use tags::{ATTESTATION_SUFFIX, SIGNATURE_SUFFIX, attached_reference, digest_tag};

