//! Signed-entity capabilities supplied by a registry client.
//!
//! A registry client opens a [`SignedEntity`] for a reference. The entity
//! exposes its signature and attestation collections and its named
//! attachments. Multi-platform indexes additionally expose a [`SignedIndex`]
//! view through [`SignedEntity::as_index`]; single images return `None`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Result;
use crate::payload::{Certificate, RekorBundle};
use crate::platform::Platform;
use crate::reference::ImageReference;

/// One child entry of an index manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDescriptor {
    /// Content digest of the child manifest.
    pub digest: String,
    /// Size of the child manifest in bytes.
    pub size: i64,
    /// Media type of the child manifest.
    pub media_type: String,
    /// Platform the child was built for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

/// Ordered list of per-platform children.
///
/// Order is registry-defined and preserved as received.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexManifest {
    /// Media type of the index itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Child descriptors in manifest order.
    pub manifests: Vec<ManifestDescriptor>,
}

impl IndexManifest {
    /// First descriptor whose platform equals `platform` on every field.
    #[must_use]
    pub fn find_platform(&self, platform: &Platform) -> Option<&ManifestDescriptor> {
        self.manifests
            .iter()
            .find(|descriptor| descriptor.platform.as_ref() == Some(platform))
    }
}

/// A single signature or attestation layer.
///
/// Attestations only use [`payload`](SignatureHandle::payload), which holds
/// the JSON-encoded envelope.
#[async_trait]
pub trait SignatureHandle: Send + Sync {
    /// Raw signed payload bytes.
    async fn payload(&self) -> Result<Vec<u8>>;

    /// Base64-encoded signature over the payload.
    async fn base64_signature(&self) -> Result<String>;

    /// Signing certificate, when keyless signing was used.
    async fn cert(&self) -> Result<Option<Certificate>> {
        Ok(None)
    }

    /// Certificate chain up to the root, leaf excluded.
    async fn chain(&self) -> Result<Vec<Certificate>> {
        Ok(Vec::new())
    }

    /// Transparency-log inclusion bundle.
    async fn bundle(&self) -> Result<Option<RekorBundle>> {
        Ok(None)
    }
}

/// A named, non-signature artifact such as an SBOM.
#[async_trait]
pub trait AttachmentHandle: Send + Sync {
    /// Raw attachment bytes.
    async fn payload(&self) -> Result<Vec<u8>>;

    /// Media type declared for the attachment content.
    async fn media_type(&self) -> Result<String>;
}

/// Index introspection, available only on multi-platform entities.
#[async_trait]
pub trait SignedIndex: Send + Sync {
    /// The index manifest with its child descriptors.
    async fn index_manifest(&self) -> Result<IndexManifest>;
}

/// Handle bound to one resolved image or index.
#[async_trait]
pub trait SignedEntity: Send + Sync {
    /// The reference this entity was opened with.
    fn reference(&self) -> &ImageReference;

    /// Signatures attached to this entity, in enumeration order.
    async fn signatures(&self) -> Result<Vec<Arc<dyn SignatureHandle>>>;

    /// Attestations attached to this entity, in enumeration order.
    async fn attestations(&self) -> Result<Vec<Arc<dyn SignatureHandle>>>;

    /// The attachment called `name`, or `None` when nothing is attached.
    async fn attachment(&self, name: &str) -> Result<Option<Arc<dyn AttachmentHandle>>>;

    /// Index view of this entity, `None` for single images.
    fn as_index(&self) -> Option<&dyn SignedIndex> {
        None
    }
}

/// Opens signed entities. Transport, authentication and retries live behind
/// this trait.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Resolve `reference` and return a handle to its artifacts.
    async fn signed_entity(&self, reference: &ImageReference) -> Result<Box<dyn SignedEntity>>;
}

#[async_trait]
impl<T: RegistryClient + ?Sized> RegistryClient for Arc<T> {
    async fn signed_entity(&self, reference: &ImageReference) -> Result<Box<dyn SignedEntity>> {
        (**self).signed_entity(reference).await
    }
}
