//! Retrieval of signatures, attestations and attachments for OCI images.
//!
//! This crate provides:
//! - Parsing of image references and platform strings
//! - Platform selection inside multi-platform image indexes
//! - Ordered, bounded-concurrency retrieval of signature and attestation collections
//! - Extraction of named attachments such as SBOMs
//! - Loading of exported signatures from disk
//!
//! Registry access goes through the [`RegistryClient`] trait; nothing here
//! verifies signatures or writes to a registry.
//!
//! # Example
//!
//! ```ignore
//! use sigfetch_core::{Fetcher, ImageReference, Platform, SBOM};
//! use tokio_util::sync::CancellationToken;
//!
//! let fetcher = Fetcher::new(client);
//! let cancel = CancellationToken::new();
//! let reference = ImageReference::parse("ghcr.io/acme/app:v1")?;
//!
//! let signatures = fetcher.fetch_signatures(&cancel, &reference).await?;
//! let platform = Platform::parse("linux/arm64")?;
//! let sbom = fetcher
//!     .fetch_attachment_from_index(&cancel, &reference, &platform, SBOM)
//!     .await?;
//! ```

mod attachment;
mod cancel;
mod collection;
mod entity;
mod error;
mod fetch;
mod local;
mod payload;
mod platform;
mod reference;

pub use attachment::extract;
pub use cancel::cancel_after;
pub use collection::{default_concurrency, fetch_attestations, fetch_signatures};
pub use entity::{
    AttachmentHandle, IndexManifest, ManifestDescriptor, RegistryClient, SignatureHandle,
    SignedEntity, SignedIndex,
};
pub use error::{CollectionKind, Error, Result};
pub use fetch::Fetcher;
pub use local::fetch_local_signed_payload;
pub use payload::{
    ATTESTATION, AttachmentPayload, AttestationPayload, AttestationSignature, Certificate,
    LocalSignedPayload, RekorBundle, RekorPayload, SBOM, SIGNATURE, SignedPayload,
};
pub use platform::{Platform, parse_platform_filter, select_child};
pub use reference::{ImageReference, resolve};

/// Re-exported so callers can build cancellation tokens without a direct dependency.
pub use tokio_util::sync::CancellationToken;
