//! Tag convention for artifacts attached to an image.
//!
//! Signatures, attestations and attachments of the image with digest
//! `sha256:abc...` live under tags such as `sha256-abc....sig`, either in the
//! image's own repository or in an override repository.

use oci_distribution::Reference;
use sigfetch_core::{ImageReference, Result};

/// Tag suffix for signatures.
pub const SIGNATURE_SUFFIX: &str = "sig";
/// Tag suffix for attestations.
pub const ATTESTATION_SUFFIX: &str = "att";

/// Tag for the artifact `suffix` attached to `digest`.
pub fn digest_tag(digest: &str, suffix: &str, prefix: &str) -> Result<String> {
    let Some((algorithm, hex)) = digest.split_once(':') else {
        return Err(sigfetch_core::Error::invalid_reference(
            digest,
            "digest must be <algorithm>:<hex>",
        ));
    };
    if algorithm.is_empty() || hex.is_empty() {
        return Err(sigfetch_core::Error::invalid_reference(
            digest,
            "digest must be <algorithm>:<hex>",
        ));
    }
    Ok(format!("{prefix}{algorithm}-{hex}.{suffix}"))
}

/// Reference of the artifact `suffix` attached to the image `subject` with `digest`.
///
/// When `repository` is set (e.g. `ghcr.io/acme/signatures`) the tag is looked
/// up there instead of in the subject's repository.
pub fn attached_reference(
    subject: &ImageReference,
    digest: &str,
    suffix: &str,
    repository: Option<&str>,
    prefix: &str,
) -> Result<ImageReference> {
    let tag = digest_tag(digest, suffix, prefix)?;
    match repository {
        Some(repository) => {
            let base = ImageReference::parse(repository)?;
            Ok(Reference::with_tag(
                base.registry().to_string(),
                base.repository().to_string(),
                tag,
            )
            .into())
        }
        None => Ok(subject.with_repository_tag(subject.repository(), &tag)),
    }
}
