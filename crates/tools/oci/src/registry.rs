//! OCI registry client for signed entities.
//!
//! Uses `oci-distribution` for registry operations. Signatures, attestations
//! and attachments are read from digest-derived tags next to the image or in
//! the configured override repository.

use async_trait::async_trait;
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::errors::{OciDistributionError, OciErrorCode};
use oci_distribution::manifest::{
    self, ImageIndexEntry, OciDescriptor, OciImageIndex, OciImageManifest, OciManifest,
};
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{Client, Reference};
use secrecy::ExposeSecret;
use sigfetch_core::{
    AttachmentHandle, Certificate, Error, Fetcher, ImageReference, IndexManifest,
    ManifestDescriptor, Platform, RegistryClient, RekorBundle, Result, SignatureHandle,
    SignedEntity, SignedIndex,
};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::options::RegistryOptions;
use crate::tags::{ATTESTATION_SUFFIX, SIGNATURE_SUFFIX, attached_reference};

/// Layer annotation holding the base64 signature.
pub const SIGNATURE_ANNOTATION: &str = "dev.cosignproject.cosign/signature";
/// Layer annotation holding the PEM signing certificate.
pub const CERTIFICATE_ANNOTATION: &str = "dev.sigstore.cosign/certificate";
/// Layer annotation holding the PEM certificate chain.
pub const CHAIN_ANNOTATION: &str = "dev.sigstore.cosign/chain";
/// Layer annotation holding the transparency-log bundle JSON.
pub const BUNDLE_ANNOTATION: &str = "dev.sigstore.cosign/bundle";

struct Shared {
    client: Client,
    options: RegistryOptions,
}

/// Registry client that opens signed entities over the OCI distribution API.
#[derive(Clone)]
pub struct OciRegistryClient {
    shared: Arc<Shared>,
}

impl Default for OciRegistryClient {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}

impl OciRegistryClient {
    /// Create a client with the given registry options.
    #[must_use]
    pub fn new(options: RegistryOptions) -> Self {
        let protocol = if options.allow_insecure {
            ClientProtocol::Http
        } else {
            ClientProtocol::Https
        };
        let config = ClientConfig {
            protocol,
            ..Default::default()
        };
        Self {
            shared: Arc::new(Shared {
                client: Client::new(config),
                options,
            }),
        }
    }

    /// The options this client was built with.
    #[must_use]
    pub fn options(&self) -> &RegistryOptions {
        &self.shared.options
    }

    /// Wrap this client in a fetcher honoring the configured concurrency.
    #[must_use]
    pub fn into_fetcher(self) -> Fetcher<Self> {
        let concurrency = self.shared.options.concurrency;
        let fetcher = Fetcher::new(self);
        match concurrency {
            Some(n) => fetcher.with_concurrency(n),
            None => fetcher,
        }
    }
}

impl Shared {
    /// Credentials for a registry.
    ///
    /// Explicit username/password wins. For GHCR, falls back to
    /// `GITHUB_TOKEN` or `GH_TOKEN`.
    fn get_auth(&self, reference: &Reference) -> RegistryAuth {
        if let (Some(username), Some(password)) = (&self.options.username, &self.options.password)
        {
            return RegistryAuth::Basic(username.clone(), password.expose_secret().to_string());
        }

        if reference.registry() == "ghcr.io" {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                return RegistryAuth::Basic(String::new(), token);
            }
            if let Ok(token) = std::env::var("GH_TOKEN") {
                return RegistryAuth::Basic(String::new(), token);
            }
        }

        RegistryAuth::Anonymous
    }

    async fn pull_manifest(
        &self,
        reference: &ImageReference,
    ) -> std::result::Result<(OciManifest, String), OciDistributionError> {
        let auth = self.get_auth(reference.as_oci());
        self.client.pull_manifest(reference.as_oci(), &auth).await
    }

    /// The image manifest tagged at `reference`, or `None` when the tag does not exist.
    async fn attached_manifest(&self, reference: &ImageReference) -> Result<Option<OciImageManifest>> {
        let pulled = self.pull_manifest(reference).await.map(|(manifest, _)| manifest);
        attached_image(reference, pulled)
    }

    async fn pull_blob(&self, reference: &ImageReference, layer: &OciDescriptor) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.client
            .pull_blob(reference.as_oci(), layer, &mut out)
            .await
            .map_err(|e| Error::registry(reference, format!("pulling blob {}: {e}", layer.digest)))?;
        trace!(%reference, digest = %layer.digest, size = out.len(), "Pulled blob");
        Ok(out)
    }
}

#[async_trait]
impl RegistryClient for OciRegistryClient {
    async fn signed_entity(&self, reference: &ImageReference) -> Result<Box<dyn SignedEntity>> {
        let (manifest, digest) = self
            .shared
            .pull_manifest(reference)
            .await
            .map_err(|e| Error::registry(reference, e.to_string()))?;

        let index = match manifest {
            OciManifest::ImageIndex(index) => Some(index_manifest(index)),
            OciManifest::Image(_) => None,
        };
        debug!(%reference, %digest, index = index.is_some(), "Resolved manifest");

        Ok(Box::new(OciEntity {
            shared: Arc::clone(&self.shared),
            reference: reference.clone(),
            digest,
            index,
        }))
    }
}

struct OciEntity {
    shared: Arc<Shared>,
    reference: ImageReference,
    digest: String,
    index: Option<IndexManifest>,
}

impl OciEntity {
    fn attached(&self, suffix: &str) -> Result<ImageReference> {
        let options = &self.shared.options;
        attached_reference(
            &self.reference,
            &self.digest,
            suffix,
            options.repository.as_deref(),
            &options.tag_prefix,
        )
    }

    async fn signature_layers(&self, suffix: &str) -> Result<Vec<Arc<dyn SignatureHandle>>> {
        let tag = self.attached(suffix)?;
        let Some(manifest) = self.shared.attached_manifest(&tag).await? else {
            return Ok(Vec::new());
        };
        debug!(reference = %tag, layers = manifest.layers.len(), "Found artifact manifest");

        Ok(manifest
            .layers
            .into_iter()
            .map(|layer| {
                Arc::new(OciSignature {
                    shared: Arc::clone(&self.shared),
                    reference: tag.clone(),
                    layer,
                }) as Arc<dyn SignatureHandle>
            })
            .collect())
    }
}

#[async_trait]
impl SignedEntity for OciEntity {
    fn reference(&self) -> &ImageReference {
        &self.reference
    }

    async fn signatures(&self) -> Result<Vec<Arc<dyn SignatureHandle>>> {
        self.signature_layers(SIGNATURE_SUFFIX).await
    }

    async fn attestations(&self) -> Result<Vec<Arc<dyn SignatureHandle>>> {
        self.signature_layers(ATTESTATION_SUFFIX).await
    }

    async fn attachment(&self, name: &str) -> Result<Option<Arc<dyn AttachmentHandle>>> {
        let tag = self.attached(name)?;
        Ok(self.shared.attached_manifest(&tag).await?.map(|manifest| {
            Arc::new(OciAttachment {
                shared: Arc::clone(&self.shared),
                reference: tag,
                manifest,
            }) as Arc<dyn AttachmentHandle>
        }))
    }

    fn as_index(&self) -> Option<&dyn SignedIndex> {
        if self.index.is_some() { Some(self) } else { None }
    }
}

#[async_trait]
impl SignedIndex for OciEntity {
    async fn index_manifest(&self) -> Result<IndexManifest> {
        self.index
            .clone()
            .ok_or_else(|| Error::not_an_index(&self.reference))
    }
}

/// One layer of a `.sig` or `.att` manifest.
struct OciSignature {
    shared: Arc<Shared>,
    reference: ImageReference,
    layer: OciDescriptor,
}

impl OciSignature {
    fn annotation(&self, key: &str) -> Option<&str> {
        self.layer
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
    }

    /// Certificates in the PEM annotation `key`. Present but without any
    /// certificate block is an error.
    fn certificates(&self, key: &str) -> Result<Option<Vec<Certificate>>> {
        let Some(pem) = self.annotation(key) else {
            return Ok(None);
        };
        let certs = Certificate::parse_pem(pem.as_bytes())?;
        if certs.is_empty() {
            return Err(Error::invalid_certificate(format!(
                "no certificates found in {key} annotation of layer {}",
                self.layer.digest
            )));
        }
        Ok(Some(certs))
    }
}

#[async_trait]
impl SignatureHandle for OciSignature {
    async fn payload(&self) -> Result<Vec<u8>> {
        self.shared.pull_blob(&self.reference, &self.layer).await
    }

    async fn base64_signature(&self) -> Result<String> {
        self.annotation(SIGNATURE_ANNOTATION)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::registry(
                    &self.reference,
                    format!(
                        "layer {} is missing the {SIGNATURE_ANNOTATION} annotation",
                        self.layer.digest
                    ),
                )
            })
    }

    async fn cert(&self) -> Result<Option<Certificate>> {
        Ok(self
            .certificates(CERTIFICATE_ANNOTATION)?
            .and_then(|certs| certs.into_iter().next()))
    }

    async fn chain(&self) -> Result<Vec<Certificate>> {
        Ok(self.certificates(CHAIN_ANNOTATION)?.unwrap_or_default())
    }

    async fn bundle(&self) -> Result<Option<RekorBundle>> {
        let Some(json) = self.annotation(BUNDLE_ANNOTATION) else {
            return Ok(None);
        };
        serde_json::from_str(json).map(Some).map_err(|e| {
            Error::registry(
                &self.reference,
                format!("invalid {BUNDLE_ANNOTATION} annotation: {e}"),
            )
        })
    }
}

/// A single-layer attachment manifest.
struct OciAttachment {
    shared: Arc<Shared>,
    reference: ImageReference,
    manifest: OciImageManifest,
}

impl OciAttachment {
    fn layer(&self) -> Result<&OciDescriptor> {
        self.manifest
            .layers
            .first()
            .ok_or_else(|| Error::registry(&self.reference, "attachment manifest has no layers"))
    }
}

#[async_trait]
impl AttachmentHandle for OciAttachment {
    async fn payload(&self) -> Result<Vec<u8>> {
        let layer = self.layer()?;
        self.shared.pull_blob(&self.reference, layer).await
    }

    async fn media_type(&self) -> Result<String> {
        Ok(self.layer()?.media_type.clone())
    }
}

/// Interpret the pull of an artifact tag: a missing tag is `None`, an index is an error.
fn attached_image(
    reference: &ImageReference,
    pulled: std::result::Result<OciManifest, OciDistributionError>,
) -> Result<Option<OciImageManifest>> {
    match pulled {
        Ok(OciManifest::Image(manifest)) => Ok(Some(manifest)),
        Ok(OciManifest::ImageIndex(_)) => Err(Error::registry(
            reference,
            "expected an image manifest, found an index",
        )),
        Err(e) if is_not_found(&e) => {
            trace!(%reference, "No artifact tag");
            Ok(None)
        }
        Err(e) => Err(Error::registry(reference, e.to_string())),
    }
}

/// Whether a registry error means the manifest does not exist.
fn is_not_found(err: &OciDistributionError) -> bool {
    match err {
        OciDistributionError::ImageManifestNotFoundError(_) => true,
        OciDistributionError::RegistryError { envelope, .. } => envelope.errors.iter().any(|e| {
            matches!(
                e.code,
                OciErrorCode::ManifestUnknown | OciErrorCode::NameUnknown
            )
        }),
        OciDistributionError::ServerError { code, .. } => *code == 404,
        _ => false,
    }
}

fn index_manifest(index: OciImageIndex) -> IndexManifest {
    IndexManifest {
        media_type: index.media_type,
        manifests: index.manifests.into_iter().map(descriptor).collect(),
    }
}

fn descriptor(entry: ImageIndexEntry) -> ManifestDescriptor {
    ManifestDescriptor {
        digest: entry.digest,
        size: entry.size,
        media_type: entry.media_type,
        platform: entry.platform.map(platform),
    }
}

fn platform(platform: manifest::Platform) -> Platform {
    let mut converted = Platform::new(platform.os, platform.architecture);
    if let Some(variant) = platform.variant {
        converted = converted.with_variant(variant);
    }
    if let Some(os_version) = platform.os_version {
        converted = converted.with_os_version(os_version);
    }
    converted
}
