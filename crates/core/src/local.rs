//! Loading exported signatures from disk.

use std::path::Path;
use tracing::debug;

use crate::payload::LocalSignedPayload;
use crate::{Error, Result};

/// Read and decode a signed payload file written by an export step.
pub fn fetch_local_signed_payload(path: impl AsRef<Path>) -> Result<LocalSignedPayload> {
    let path = path.as_ref();
    let contents = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let payload: LocalSignedPayload =
        serde_json::from_slice(&contents).map_err(|e| Error::decode(path, e))?;
    debug!(
        ?path,
        has_cert = payload.cert.is_some(),
        has_bundle = payload.bundle.is_some(),
        "Loaded local signed payload"
    );
    Ok(payload)
}
