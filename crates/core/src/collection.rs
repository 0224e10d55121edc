//! Concurrent retrieval of signature and attestation collections.
//!
//! Every member is fetched by its own task. Tasks are bounded by a semaphore
//! sized to the configured concurrency and each task reports into the slot
//! matching its enumeration position, so the output order never depends on
//! completion order. The first member error fails the whole call; sibling
//! tasks are left to finish and their results are dropped.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::cancel::cancellable;
use crate::entity::{SignatureHandle, SignedEntity};
use crate::payload::{AttestationPayload, SignedPayload};
use crate::reference::ImageReference;
use crate::{CollectionKind, Error, Result};

/// Default bound on concurrently fetched members.
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Fetch every member with at most `limit` fetches in flight.
///
/// The result has one entry per member, in member order.
pub(crate) async fn fetch_ordered<M, T, F, Fut>(
    cancel: &CancellationToken,
    members: Vec<M>,
    limit: usize,
    fetch: F,
) -> Result<Vec<T>>
where
    M: Send + 'static,
    T: Send + 'static,
    F: Fn(usize, M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let total = members.len();
    let permits = Arc::new(Semaphore::new(limit.max(1)));
    let fetch = Arc::new(fetch);
    // Capacity covers every member so a finished worker never waits on the receiver.
    let (tx, mut rx) = mpsc::channel::<(usize, Result<T>)>(total.max(1));

    for (index, member) in members.into_iter().enumerate() {
        let permits = Arc::clone(&permits);
        let fetch = Arc::clone(&fetch);
        let tx = tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let outcome = cancellable(&cancel, async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return Err(Error::Cancelled);
                };
                (*fetch)(index, member).await
            })
            .await;
            // The receiver is gone once the call has already failed.
            let _ = tx.send((index, outcome)).await;
        });
    }
    drop(tx);

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
    loop {
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            received = rx.recv() => received,
        };
        match received {
            Some((index, Ok(value))) => {
                trace!(index, "Member fetched");
                slots[index] = Some(value);
            }
            Some((index, Err(err))) => {
                debug!(index, error = %err, "Member fetch failed");
                return Err(err);
            }
            None => break,
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or(Error::Worker { index }))
        .collect()
}

fn member_error<'a>(
    kind: CollectionKind,
    reference: &'a ImageReference,
    index: usize,
    field: &'static str,
) -> impl FnOnce(Error) -> Error + 'a {
    move |source| Error::member_fetch(kind, reference, index, field, source)
}

async fn signature_record(
    reference: ImageReference,
    index: usize,
    signature: Arc<dyn SignatureHandle>,
) -> Result<SignedPayload> {
    let kind = CollectionKind::Signatures;
    let payload = signature
        .payload()
        .await
        .map_err(member_error(kind, &reference, index, "payload"))?;
    let base64_signature = signature
        .base64_signature()
        .await
        .map_err(member_error(kind, &reference, index, "signature"))?;
    let cert = signature
        .cert()
        .await
        .map_err(member_error(kind, &reference, index, "certificate"))?;
    let chain = signature
        .chain()
        .await
        .map_err(member_error(kind, &reference, index, "chain"))?;
    let bundle = signature
        .bundle()
        .await
        .map_err(member_error(kind, &reference, index, "bundle"))?;

    Ok(SignedPayload {
        base64_signature,
        payload,
        cert,
        chain,
        bundle,
    })
}

async fn attestation_record(
    reference: ImageReference,
    index: usize,
    attestation: Arc<dyn SignatureHandle>,
) -> Result<AttestationPayload> {
    let bytes = attestation.payload().await.map_err(member_error(
        CollectionKind::Attestations,
        &reference,
        index,
        "payload",
    ))?;
    serde_json::from_slice(&bytes).map_err(|source| Error::attestation_decode(&reference, index, source))
}

async fn list_members(
    cancel: &CancellationToken,
    entity: &dyn SignedEntity,
    kind: CollectionKind,
) -> Result<Vec<Arc<dyn SignatureHandle>>> {
    let reference = entity.reference();
    let listing = match kind {
        CollectionKind::Signatures => cancellable(cancel, entity.signatures()).await,
        CollectionKind::Attestations => cancellable(cancel, entity.attestations()).await,
    };
    let members = listing.map_err(|e| Error::list_collection(kind, reference, e))?;
    if members.is_empty() {
        return Err(Error::empty_collection(kind, reference));
    }
    debug!(%reference, %kind, count = members.len(), "Fetching collection");
    Ok(members)
}

/// Materialize every signature attached to `entity`.
pub async fn fetch_signatures(
    cancel: &CancellationToken,
    entity: &dyn SignedEntity,
    limit: usize,
) -> Result<Vec<SignedPayload>> {
    let members = list_members(cancel, entity, CollectionKind::Signatures).await?;
    let reference = entity.reference().clone();
    fetch_ordered(cancel, members, limit, move |index, signature| {
        signature_record(reference.clone(), index, signature)
    })
    .await
}

/// Materialize and decode every attestation attached to `entity`.
pub async fn fetch_attestations(
    cancel: &CancellationToken,
    entity: &dyn SignedEntity,
    limit: usize,
) -> Result<Vec<AttestationPayload>> {
    let members = list_members(cancel, entity, CollectionKind::Attestations).await?;
    let reference = entity.reference().clone();
    fetch_ordered(cancel, members, limit, move |index, attestation| {
        attestation_record(reference.clone(), index, attestation)
    })
    .await
}
