//! Named attachment extraction.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cancel::cancellable;
use crate::entity::{AttachmentHandle, SignedEntity};
use crate::payload::AttachmentPayload;
use crate::reference::ImageReference;
use crate::{Error, Result};

/// Read the bytes and then the media type of one attachment.
///
/// `name` and `reference` only label errors.
pub async fn extract(
    handle: &dyn AttachmentHandle,
    name: &str,
    reference: &ImageReference,
) -> Result<AttachmentPayload> {
    let payload = handle
        .payload()
        .await
        .map_err(|e| Error::payload(name, reference, e))?;
    let media_type = handle
        .media_type()
        .await
        .map_err(|e| Error::media_type(name, reference, e))?;

    Ok(AttachmentPayload {
        payload,
        media_type,
    })
}

/// Locate the attachment `name` on `entity` and extract it.
pub(crate) async fn fetch_named(
    cancel: &CancellationToken,
    entity: &dyn SignedEntity,
    name: &str,
) -> Result<AttachmentPayload> {
    let reference = entity.reference();
    let handle = cancellable(cancel, entity.attachment(name))
        .await?
        .ok_or_else(|| Error::attachment_not_found(name, reference))?;

    let attachment = cancellable(cancel, extract(handle.as_ref(), name, reference)).await?;
    debug!(
        %reference,
        name,
        media_type = %attachment.media_type,
        size = attachment.payload.len(),
        "Fetched attachment"
    );
    Ok(attachment)
}
