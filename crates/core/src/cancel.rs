//! Cancellation and deadline helpers.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Race `future` against `cancel`.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        outcome = future => outcome,
    }
}

/// Child token of `parent` that is also cancelled once `timeout` elapses.
///
/// Must be called from within a Tokio runtime.
#[must_use]
pub fn cancel_after(parent: &CancellationToken, timeout: Duration) -> CancellationToken {
    let token = parent.child_token();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(timeout) => timer.cancel(),
            () = timer.cancelled() => {}
        }
    });
    token
}
