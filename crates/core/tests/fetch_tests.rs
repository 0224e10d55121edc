//! End-to-end fetch behavior against an in-memory registry.

mod support;

use sigfetch_core::{
    CancellationToken, Certificate, CollectionKind, Error, Fetcher, ImageReference, Platform,
    SBOM,
};
use std::sync::Arc;
use support::{FakeAttachment, FakeSignature, MemoryRegistry, descriptor, index_of};

const APP: &str = "ghcr.io/acme/app:v1";
const AMD64_DIGEST: &str =
    "sha256:1111111111111111111111111111111111111111111111111111111111111111";
const ARM64_DIGEST: &str =
    "sha256:2222222222222222222222222222222222222222222222222222222222222222";

fn app() -> ImageReference {
    ImageReference::parse(APP).unwrap()
}

fn envelope(statement_b64: &str) -> String {
    format!(
        r#"{{"payloadType":"application/vnd.in-toto+json","payload":"{statement_b64}","signatures":[{{"keyid":"","sig":"MEUCIQ=="}}]}}"#
    )
}

/// Index with linux/amd64 and linux/arm64 children, each carrying its own SBOM.
fn multi_arch_registry() -> MemoryRegistry {
    let mut registry = MemoryRegistry::new();
    registry.index(
        APP,
        index_of(vec![
            descriptor(AMD64_DIGEST, "linux/amd64"),
            descriptor(ARM64_DIGEST, "linux/arm64"),
        ]),
    );
    registry
        .image(&app().with_digest(AMD64_DIGEST).to_string())
        .attach(SBOM, FakeAttachment::new("amd64-sbom", "application/spdx+json"));
    registry
        .image(&app().with_digest(ARM64_DIGEST).to_string())
        .attach(SBOM, FakeAttachment::new("arm64-sbom", "application/vnd.cyclonedx+json"));
    registry
}

// ==========================================================================
// Signatures
// ==========================================================================

#[tokio::test]
async fn test_signatures_keep_enumeration_order() {
    support::init_tracing();
    let mut registry = MemoryRegistry::new();
    let entry = registry.image(APP);
    // Earlier signatures finish later.
    for i in 0..6u64 {
        entry.signature(
            FakeSignature::new(&format!("payload-{i}"), &format!("sig-{i}")).delayed(30 - i * 5),
        );
    }

    let fetcher = Fetcher::new(registry).with_concurrency(6);
    let signatures = fetcher
        .fetch_signatures(&CancellationToken::new(), &app())
        .await
        .unwrap();

    assert_eq!(signatures.len(), 6);
    for (i, signature) in signatures.iter().enumerate() {
        assert_eq!(signature.payload, format!("payload-{i}").into_bytes());
        assert_eq!(signature.base64_signature, format!("sig-{i}"));
    }
}

#[tokio::test]
async fn test_signature_fields_are_carried() {
    let cert = Certificate::from_der(vec![0x30, 0x82, 0x01, 0x0a]);
    let chain = vec![Certificate::from_der(vec![0x30, 0x01]), Certificate::from_der(vec![0x30, 0x02])];
    let mut registry = MemoryRegistry::new();
    registry.image(APP).signature(FakeSignature {
        cert: Some(cert.clone()),
        chain: chain.clone(),
        ..FakeSignature::new("{\"critical\":{}}", "MEUCIQ==")
    });

    let signatures = Fetcher::new(registry)
        .fetch_signatures(&CancellationToken::new(), &app())
        .await
        .unwrap();

    assert_eq!(signatures[0].cert, Some(cert));
    assert_eq!(signatures[0].chain, chain);
    assert!(signatures[0].bundle.is_none());
}

#[tokio::test]
async fn test_empty_signatures_is_an_error() {
    let mut registry = MemoryRegistry::new();
    registry.image(APP);

    let err = Fetcher::new(registry)
        .fetch_signatures(&CancellationToken::new(), &app())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::EmptyCollection {
            kind: CollectionKind::Signatures,
            ..
        }
    ));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_one_failing_signature_fails_the_call() {
    let mut registry = MemoryRegistry::new();
    registry
        .image(APP)
        .signature(FakeSignature::new("a", "sig-a"))
        .signature(FakeSignature::new("b", "sig-b").failing("certificate"))
        .signature(FakeSignature::new("c", "sig-c"));

    let err = Fetcher::new(registry)
        .fetch_signatures(&CancellationToken::new(), &app())
        .await
        .unwrap_err();

    match err {
        Error::MemberFetch {
            kind, index, field, ..
        } => {
            assert_eq!(kind, CollectionKind::Signatures);
            assert_eq!(index, 1);
            assert_eq!(field, "certificate");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_single_worker_still_preserves_order() {
    let mut registry = MemoryRegistry::new();
    let entry = registry.image(APP);
    for i in 0..4 {
        entry.signature(FakeSignature::new(&i.to_string(), "s"));
    }

    let signatures = Fetcher::new(registry)
        .with_concurrency(1)
        .fetch_signatures(&CancellationToken::new(), &app())
        .await
        .unwrap();

    let payloads: Vec<Vec<u8>> = signatures.into_iter().map(|s| s.payload).collect();
    assert_eq!(payloads, vec![b"0".to_vec(), b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
}

// ==========================================================================
// Attestations
// ==========================================================================

#[tokio::test]
async fn test_attestations_are_decoded_in_order() {
    let mut registry = MemoryRegistry::new();
    registry
        .image(APP)
        .attestation(FakeSignature::attestation(&envelope("Zmlyc3Q=")).delayed(20))
        .attestation(FakeSignature::attestation(&envelope("c2Vjb25k")));

    let attestations = Fetcher::new(registry)
        .fetch_attestations(&CancellationToken::new(), &app())
        .await
        .unwrap();

    assert_eq!(attestations.len(), 2);
    assert_eq!(attestations[0].decode_payload().unwrap(), b"first");
    assert_eq!(attestations[1].decode_payload().unwrap(), b"second");
    assert_eq!(attestations[0].payload_type, "application/vnd.in-toto+json");
    assert_eq!(attestations[1].signatures[0].sig, "MEUCIQ==");
}

#[tokio::test]
async fn test_malformed_attestation_fails_whole_call() {
    let mut registry = MemoryRegistry::new();
    registry
        .image(APP)
        .attestation(FakeSignature::attestation(&envelope("Zmlyc3Q=")))
        .attestation(FakeSignature::attestation("{\"payloadType\": "))
        .attestation(FakeSignature::attestation(&envelope("dGhpcmQ=")));

    let result = Fetcher::new(registry)
        .fetch_attestations(&CancellationToken::new(), &app())
        .await;

    assert!(matches!(result, Err(Error::AttestationDecode { index: 1, .. })));
}

#[tokio::test]
async fn test_attestation_payload_read_failure_is_reported() {
    let mut registry = MemoryRegistry::new();
    registry
        .image(APP)
        .attestation(FakeSignature::attestation(&envelope("Zmlyc3Q=")).failing("payload"));

    let err = Fetcher::new(registry)
        .fetch_attestations(&CancellationToken::new(), &app())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::MemberFetch {
            kind: CollectionKind::Attestations,
            field: "payload",
            ..
        }
    ));
}

#[tokio::test]
async fn test_empty_attestations_is_an_error() {
    let mut registry = MemoryRegistry::new();
    registry.image(APP).signature(FakeSignature::new("p", "s"));

    let err = Fetcher::new(registry)
        .fetch_attestations(&CancellationToken::new(), &app())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::EmptyCollection {
            kind: CollectionKind::Attestations,
            ..
        }
    ));
}

// ==========================================================================
// Attachments
// ==========================================================================

#[tokio::test]
async fn test_attachment_for_single_image() {
    let mut registry = MemoryRegistry::new();
    registry
        .image(APP)
        .attach(SBOM, FakeAttachment::new("sbom-body", "text/spdx"));

    let sbom = Fetcher::new(registry)
        .fetch_attachment(&CancellationToken::new(), &app(), SBOM)
        .await
        .unwrap();

    assert_eq!(sbom.payload, b"sbom-body");
    assert_eq!(sbom.media_type, "text/spdx");
}

#[tokio::test]
async fn test_missing_attachment_is_not_found() {
    let mut registry = MemoryRegistry::new();
    registry.image(APP);

    let err = Fetcher::new(registry)
        .fetch_attachment(&CancellationToken::new(), &app(), SBOM)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AttachmentNotFound { .. }));
}

#[tokio::test]
async fn test_attachment_media_type_failure_is_distinct() {
    let mut registry = MemoryRegistry::new();
    registry.image(APP).attach(
        SBOM,
        FakeAttachment {
            fail_media_type: true,
            ..FakeAttachment::new("body", "text/plain")
        },
    );

    let err = Fetcher::new(registry)
        .fetch_attachment(&CancellationToken::new(), &app(), SBOM)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MediaType { .. }));
}

#[tokio::test]
async fn test_index_returns_matching_child_only() {
    let registry = Arc::new(multi_arch_registry());
    let fetcher = Fetcher::new(Arc::clone(&registry));

    let sbom = fetcher
        .fetch_attachment_from_index(
            &CancellationToken::new(),
            &app(),
            &Platform::parse("linux/arm64").unwrap(),
            SBOM,
        )
        .await
        .unwrap();

    assert_eq!(sbom.payload, b"arm64-sbom");
    assert_eq!(sbom.media_type, "application/vnd.cyclonedx+json");
    assert_eq!(
        registry.opened(),
        vec![APP.to_string(), app().with_digest(ARM64_DIGEST).to_string()]
    );
}

#[tokio::test]
async fn test_index_amd64_child() {
    let sbom = Fetcher::new(multi_arch_registry())
        .fetch_attachment_from_index(
            &CancellationToken::new(),
            &app(),
            &Platform::new("linux", "amd64"),
            SBOM,
        )
        .await
        .unwrap();

    assert_eq!(sbom.payload, b"amd64-sbom");
    assert_eq!(sbom.media_type, "application/spdx+json");
}

#[tokio::test]
async fn test_index_platform_not_found() {
    let err = Fetcher::new(multi_arch_registry())
        .fetch_attachment_from_index(
            &CancellationToken::new(),
            &app(),
            &Platform::parse("linux/arm64/v8").unwrap(),
            SBOM,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::PlatformNotFound { .. }));
    assert!(err.to_string().contains("linux/arm64/v8"));
}

#[tokio::test]
async fn test_index_first_matching_descriptor_wins() {
    let mut registry = MemoryRegistry::new();
    registry.index(
        APP,
        index_of(vec![
            descriptor(ARM64_DIGEST, "linux/arm64"),
            descriptor(AMD64_DIGEST, "linux/arm64"),
        ]),
    );
    registry
        .image(&app().with_digest(ARM64_DIGEST).to_string())
        .attach(SBOM, FakeAttachment::new("first", "text/plain"));
    registry
        .image(&app().with_digest(AMD64_DIGEST).to_string())
        .attach(SBOM, FakeAttachment::new("second", "text/plain"));

    let sbom = Fetcher::new(registry)
        .fetch_attachment_from_index(
            &CancellationToken::new(),
            &app(),
            &Platform::new("linux", "arm64"),
            SBOM,
        )
        .await
        .unwrap();

    assert_eq!(sbom.payload, b"first");
}

#[tokio::test]
async fn test_index_request_on_single_image_is_not_an_index() {
    let mut registry = MemoryRegistry::new();
    registry
        .image(APP)
        .attach(SBOM, FakeAttachment::new("body", "text/plain"));

    let err = Fetcher::new(registry)
        .fetch_attachment_from_index(
            &CancellationToken::new(),
            &app(),
            &Platform::new("linux", "amd64"),
            SBOM,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotAnIndex { .. }));
}

#[tokio::test]
async fn test_index_child_without_attachment() {
    let mut registry = MemoryRegistry::new();
    registry.index(APP, index_of(vec![descriptor(AMD64_DIGEST, "linux/amd64")]));
    registry.image(&app().with_digest(AMD64_DIGEST).to_string());

    let err = Fetcher::new(registry)
        .fetch_attachment_from_index(
            &CancellationToken::new(),
            &app(),
            &Platform::new("linux", "amd64"),
            SBOM,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AttachmentNotFound { .. }));
}

#[tokio::test]
async fn test_fetch_attachment_for_dispatches_on_platform() {
    let fetcher = Fetcher::new(multi_arch_registry());
    let cancel = CancellationToken::new();
    let arm = Platform::new("linux", "arm64");

    let with_platform = fetcher
        .fetch_attachment_for(&cancel, &app(), SBOM, Some(&arm))
        .await
        .unwrap();
    assert_eq!(with_platform.payload, b"arm64-sbom");

    // The index itself carries no SBOM.
    let without_platform = fetcher.fetch_attachment_for(&cancel, &app(), SBOM, None).await;
    assert!(matches!(without_platform, Err(Error::AttachmentNotFound { .. })));
}

// ==========================================================================
// Registry failures and cancellation
// ==========================================================================

#[tokio::test]
async fn test_unknown_reference_is_registry_error() {
    let err = Fetcher::new(MemoryRegistry::new())
        .fetch_signatures(&CancellationToken::new(), &app())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Registry { .. }));
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_cancelled_token_stops_fetch() {
    let mut registry = MemoryRegistry::new();
    registry
        .image(APP)
        .signature(FakeSignature::new("p", "s").delayed(10_000));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = Fetcher::new(registry)
        .fetch_signatures(&cancel, &app())
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_deadline_interrupts_slow_members() {
    let mut registry = MemoryRegistry::new();
    registry
        .image(APP)
        .signature(FakeSignature::new("fast", "s"))
        .signature(FakeSignature::new("slow", "s").delayed(60_000));

    let cancel =
        sigfetch_core::cancel_after(&CancellationToken::new(), std::time::Duration::from_millis(20));
    let err = Fetcher::new(registry)
        .fetch_signatures(&cancel, &app())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
}
