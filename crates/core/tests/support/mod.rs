//! In-memory registry used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use sigfetch_core::{
    AttachmentHandle, Certificate, Error, ImageReference, IndexManifest, ManifestDescriptor,
    Platform, RegistryClient, RekorBundle, Result, SignatureHandle, SignedEntity, SignedIndex,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Install a test subscriber so fetch logs show up with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sigfetch_core=trace")
        .with_test_writer()
        .try_init();
}

/// A signature or attestation layer with scripted behavior.
#[derive(Clone, Default)]
pub struct FakeSignature {
    pub payload: Vec<u8>,
    pub signature: String,
    pub cert: Option<Certificate>,
    pub chain: Vec<Certificate>,
    pub bundle: Option<RekorBundle>,
    /// Delay applied before the payload is returned.
    pub delay: Duration,
    /// Field whose fetch fails.
    pub fail: Option<&'static str>,
}

impl FakeSignature {
    pub fn new(payload: &str, signature: &str) -> Self {
        Self {
            payload: payload.as_bytes().to_vec(),
            signature: signature.to_string(),
            ..Self::default()
        }
    }

    pub fn attestation(envelope: &str) -> Self {
        Self::new(envelope, "")
    }

    pub fn delayed(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    pub fn failing(mut self, field: &'static str) -> Self {
        self.fail = Some(field);
        self
    }

    fn check(&self, field: &'static str) -> Result<()> {
        if self.fail == Some(field) {
            Err(Error::registry("memory", format!("{field} unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SignatureHandle for FakeSignature {
    async fn payload(&self) -> Result<Vec<u8>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.check("payload")?;
        Ok(self.payload.clone())
    }

    async fn base64_signature(&self) -> Result<String> {
        self.check("signature")?;
        Ok(self.signature.clone())
    }

    async fn cert(&self) -> Result<Option<Certificate>> {
        self.check("certificate")?;
        Ok(self.cert.clone())
    }

    async fn chain(&self) -> Result<Vec<Certificate>> {
        self.check("chain")?;
        Ok(self.chain.clone())
    }

    async fn bundle(&self) -> Result<Option<RekorBundle>> {
        self.check("bundle")?;
        Ok(self.bundle.clone())
    }
}

/// A named attachment with scripted behavior.
#[derive(Clone, Default)]
pub struct FakeAttachment {
    pub payload: Vec<u8>,
    pub media_type: String,
    pub fail_payload: bool,
    pub fail_media_type: bool,
}

impl FakeAttachment {
    pub fn new(payload: &str, media_type: &str) -> Self {
        Self {
            payload: payload.as_bytes().to_vec(),
            media_type: media_type.to_string(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl AttachmentHandle for FakeAttachment {
    async fn payload(&self) -> Result<Vec<u8>> {
        if self.fail_payload {
            return Err(Error::registry("memory", "blob unknown"));
        }
        Ok(self.payload.clone())
    }

    async fn media_type(&self) -> Result<String> {
        if self.fail_media_type {
            return Err(Error::registry("memory", "manifest has no layers"));
        }
        Ok(self.media_type.clone())
    }
}

/// Everything stored for one reference.
#[derive(Clone, Default)]
pub struct Entry {
    pub index: Option<IndexManifest>,
    pub signatures: Vec<FakeSignature>,
    pub attestations: Vec<FakeSignature>,
    pub attachments: HashMap<String, FakeAttachment>,
}

impl Entry {
    pub fn signature(&mut self, signature: FakeSignature) -> &mut Self {
        self.signatures.push(signature);
        self
    }

    pub fn attestation(&mut self, attestation: FakeSignature) -> &mut Self {
        self.attestations.push(attestation);
        self
    }

    pub fn attach(&mut self, name: &str, attachment: FakeAttachment) -> &mut Self {
        self.attachments.insert(name.to_string(), attachment);
        self
    }
}

/// Registry client backed by a map of references.
#[derive(Default)]
pub struct MemoryRegistry {
    entries: HashMap<String, Entry>,
    opened: Mutex<Vec<String>>,
}

fn key(reference: &str) -> String {
    ImageReference::parse(reference)
        .map(|r| r.to_string())
        .unwrap_or_else(|_| reference.to_string())
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&mut self, reference: &str) -> &mut Entry {
        self.entries.entry(key(reference)).or_default()
    }

    pub fn index(&mut self, reference: &str, manifest: IndexManifest) -> &mut Entry {
        let entry = self.entries.entry(key(reference)).or_default();
        entry.index = Some(manifest);
        entry
    }

    /// References opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

pub fn descriptor(digest: &str, platform: &str) -> ManifestDescriptor {
    ManifestDescriptor {
        digest: digest.to_string(),
        size: 527,
        media_type: "application/vnd.oci.image.manifest.v1+json".to_string(),
        platform: Some(Platform::parse(platform).unwrap()),
    }
}

pub fn index_of(descriptors: Vec<ManifestDescriptor>) -> IndexManifest {
    IndexManifest {
        media_type: Some("application/vnd.oci.image.index.v1+json".to_string()),
        manifests: descriptors,
    }
}

struct MemoryEntity {
    reference: ImageReference,
    entry: Entry,
}

#[async_trait]
impl SignedEntity for MemoryEntity {
    fn reference(&self) -> &ImageReference {
        &self.reference
    }

    async fn signatures(&self) -> Result<Vec<Arc<dyn SignatureHandle>>> {
        Ok(self
            .entry
            .signatures
            .iter()
            .cloned()
            .map(|s| Arc::new(s) as Arc<dyn SignatureHandle>)
            .collect())
    }

    async fn attestations(&self) -> Result<Vec<Arc<dyn SignatureHandle>>> {
        Ok(self
            .entry
            .attestations
            .iter()
            .cloned()
            .map(|s| Arc::new(s) as Arc<dyn SignatureHandle>)
            .collect())
    }

    async fn attachment(&self, name: &str) -> Result<Option<Arc<dyn AttachmentHandle>>> {
        Ok(self
            .entry
            .attachments
            .get(name)
            .cloned()
            .map(|a| Arc::new(a) as Arc<dyn AttachmentHandle>))
    }

    fn as_index(&self) -> Option<&dyn SignedIndex> {
        if self.entry.index.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl SignedIndex for MemoryEntity {
    async fn index_manifest(&self) -> Result<IndexManifest> {
        self.entry
            .index
            .clone()
            .ok_or_else(|| Error::not_an_index(&self.reference))
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    async fn signed_entity(&self, reference: &ImageReference) -> Result<Box<dyn SignedEntity>> {
        let key = reference.to_string();
        self.opened.lock().unwrap().push(key.clone());
        let entry = self
            .entries
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::registry(reference, "MANIFEST_UNKNOWN"))?;
        Ok(Box::new(MemoryEntity {
            reference: reference.clone(),
            entry,
        }))
    }
}
