//! `download sbom`: fetch the SBOM attached to an image and write it out.

use sigfetch_core::{
    CancellationToken, Fetcher, ImageReference, RegistryClient, SBOM, parse_platform_filter,
};
use std::io::Write;
use tracing::info;

use crate::options::DownloadSbomOptions;
use crate::registry::OciRegistryClient;
use crate::{Error, Result};

/// Download the SBOM attached to `image_ref` from its registry.
///
/// When `options.platform` is set the reference must be an index and the SBOM
/// of the matching child is returned. The SBOM bytes are written to `out`
/// unchanged, followed by a newline, and returned as text.
pub async fn download_sbom(
    options: &DownloadSbomOptions,
    image_ref: &str,
    out: &mut impl Write,
) -> Result<Vec<String>> {
    let fetcher = OciRegistryClient::new(options.registry.clone()).into_fetcher();
    download_sbom_with(&fetcher, &CancellationToken::new(), &options.platform, image_ref, out).await
}

/// [`download_sbom`] over an arbitrary registry client.
pub async fn download_sbom_with<C: RegistryClient>(
    fetcher: &Fetcher<C>,
    cancel: &CancellationToken,
    platform: &str,
    image_ref: &str,
    out: &mut impl Write,
) -> Result<Vec<String>> {
    let reference = ImageReference::parse(image_ref)?;
    let platform = parse_platform_filter(platform)?;

    let sbom = fetcher
        .fetch_attachment_for(cancel, &reference, SBOM, platform.as_ref())
        .await?;

    info!(%reference, media_type = %sbom.media_type, "Found SBOM of media type: {}", sbom.media_type);

    // A single attached file per image.
    out.write_all(&sbom.payload)
        .and_then(|()| out.write_all(b"\n"))
        .map_err(|e| Error::output("SBOM", e))?;
    Ok(vec![String::from_utf8_lossy(&sbom.payload).into_owned()])
}
