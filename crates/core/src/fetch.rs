//! High-level fetch operations over a registry client.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::attachment::fetch_named;
use crate::cancel::cancellable;
use crate::collection::{self, default_concurrency};
use crate::entity::{RegistryClient, SignedEntity};
use crate::payload::{AttachmentPayload, AttestationPayload, SignedPayload};
use crate::platform::{Platform, select_child};
use crate::reference::ImageReference;
use crate::Result;

/// Fetches signatures, attestations and attachments through a registry client.
///
/// The client is shared read-only by every concurrent member fetch. No state
/// is kept between calls.
#[derive(Debug, Clone)]
pub struct Fetcher<C> {
    client: C,
    concurrency: usize,
}

impl<C: RegistryClient> Fetcher<C> {
    /// Create a fetcher bounded by the host's available parallelism.
    #[must_use]
    pub fn new(client: C) -> Self {
        Self {
            client,
            concurrency: default_concurrency(),
        }
    }

    /// Override the bound on concurrently fetched collection members.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The configured member concurrency.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// The underlying registry client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Open the signed entity at `reference`.
    pub async fn open(
        &self,
        cancel: &CancellationToken,
        reference: &ImageReference,
    ) -> Result<Box<dyn SignedEntity>> {
        let entity = cancellable(cancel, self.client.signed_entity(reference)).await?;
        debug!(%reference, index = entity.as_index().is_some(), "Opened signed entity");
        Ok(entity)
    }

    /// Fetch every signature attached to `reference`, in enumeration order.
    #[tracing::instrument(skip_all, fields(reference = %reference))]
    pub async fn fetch_signatures(
        &self,
        cancel: &CancellationToken,
        reference: &ImageReference,
    ) -> Result<Vec<SignedPayload>> {
        let entity = self.open(cancel, reference).await?;
        collection::fetch_signatures(cancel, entity.as_ref(), self.concurrency).await
    }

    /// Fetch and decode every attestation attached to `reference`.
    #[tracing::instrument(skip_all, fields(reference = %reference))]
    pub async fn fetch_attestations(
        &self,
        cancel: &CancellationToken,
        reference: &ImageReference,
    ) -> Result<Vec<AttestationPayload>> {
        let entity = self.open(cancel, reference).await?;
        collection::fetch_attestations(cancel, entity.as_ref(), self.concurrency).await
    }

    /// Fetch the attachment `name` of the entity at `reference`.
    #[tracing::instrument(skip_all, fields(reference = %reference, attachment = name))]
    pub async fn fetch_attachment(
        &self,
        cancel: &CancellationToken,
        reference: &ImageReference,
        name: &str,
    ) -> Result<AttachmentPayload> {
        let entity = self.open(cancel, reference).await?;
        fetch_named(cancel, entity.as_ref(), name).await
    }

    /// Fetch the attachment `name` of the index child built for `platform`.
    #[tracing::instrument(
        skip_all,
        fields(reference = %reference, platform = %platform, attachment = name)
    )]
    pub async fn fetch_attachment_from_index(
        &self,
        cancel: &CancellationToken,
        reference: &ImageReference,
        platform: &Platform,
        name: &str,
    ) -> Result<AttachmentPayload> {
        let index = self.open(cancel, reference).await?;
        let child = cancellable(cancel, select_child(index.as_ref(), platform)).await?;
        info!(%reference, %platform, child = %child, "Resolved platform child");

        let entity = self.open(cancel, &child).await?;
        fetch_named(cancel, entity.as_ref(), name).await
    }

    /// Fetch the attachment `name`, narrowing to `platform` when one is given.
    pub async fn fetch_attachment_for(
        &self,
        cancel: &CancellationToken,
        reference: &ImageReference,
        name: &str,
        platform: Option<&Platform>,
    ) -> Result<AttachmentPayload> {
        match platform {
            Some(platform) => {
                self.fetch_attachment_from_index(cancel, reference, platform, name)
                    .await
            }
            None => self.fetch_attachment(cancel, reference, name).await,
        }
    }
}
