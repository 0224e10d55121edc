//! Error types for artifact resolution and retrieval.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::platform::Platform;
use crate::reference::ImageReference;

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The artifact collections that are fetched member by member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Detached signatures.
    Signatures,
    /// In-toto attestations.
    Attestations,
}

impl CollectionKind {
    /// Name of a single member of this collection.
    #[must_use]
    pub fn member(self) -> &'static str {
        match self {
            Self::Signatures => "signature",
            Self::Attestations => "attestation",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signatures => write!(f, "signatures"),
            Self::Attestations => write!(f, "attestations"),
        }
    }
}

/// Errors that can occur while resolving or fetching signed artifacts.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The reference text is not a valid repository coordinate.
    #[error("Invalid image reference '{reference}': {message}")]
    #[diagnostic(
        code(sigfetch::reference::invalid),
        help("Use the form [registry/]repository[:tag|@digest]")
    )]
    InvalidReference {
        /// The rejected text.
        reference: String,
        /// Parser message.
        message: String,
    },

    /// The platform text is not `os/arch[/variant][:osversion]`.
    #[error("Invalid platform '{platform}': {message}")]
    #[diagnostic(
        code(sigfetch::platform::invalid),
        help("The format is os/arch[/variant][:osversion]")
    )]
    InvalidPlatform {
        /// The rejected text.
        platform: String,
        /// What is wrong with it.
        message: String,
    },

    /// The registry could not open or resolve an entity.
    #[error("Registry error for '{reference}': {message}")]
    #[diagnostic(code(sigfetch::registry))]
    Registry {
        /// Reference being resolved.
        reference: String,
        /// Transport or registry message.
        message: String,
    },

    /// Enumerating a signature or attestation collection failed.
    #[error("Failed to list {kind} for '{reference}'")]
    #[diagnostic(code(sigfetch::collection::list))]
    ListCollection {
        /// Collection being enumerated.
        kind: CollectionKind,
        /// Reference whose artifacts were requested.
        reference: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// A platform was requested for a reference that is a single image.
    #[error("{reference} is not an index")]
    #[diagnostic(
        code(sigfetch::index::not_an_index),
        help("Drop the platform filter for single-platform images")
    )]
    NotAnIndex {
        /// The reference that resolved to a single image.
        reference: String,
    },

    /// Reading the index manifest failed while selecting a platform child.
    #[error("Failed to read index manifest of {reference} to select platform {platform}")]
    #[diagnostic(code(sigfetch::index::manifest))]
    IndexManifest {
        /// The requested platform.
        platform: String,
        /// The index reference.
        reference: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// No index child carries the requested platform.
    #[error("No child with platform {platform} in index {reference}")]
    #[diagnostic(code(sigfetch::index::platform_not_found))]
    PlatformNotFound {
        /// The requested platform.
        platform: String,
        /// The index reference.
        reference: String,
    },

    /// The reference has nothing attached in the requested collection.
    #[error("No {kind} associated with {reference}")]
    #[diagnostic(code(sigfetch::collection::empty))]
    EmptyCollection {
        /// Collection that was empty.
        kind: CollectionKind,
        /// Reference that was inspected.
        reference: String,
    },

    /// Fetching one field of one collection member failed.
    #[error("Failed to fetch {field} of {} #{index} for '{reference}'", kind.member())]
    #[diagnostic(code(sigfetch::collection::member))]
    MemberFetch {
        /// Collection the member belongs to.
        kind: CollectionKind,
        /// Reference whose artifacts were requested.
        reference: String,
        /// Enumeration position of the member.
        index: usize,
        /// The field being fetched (payload, certificate, ...).
        field: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// An attestation payload is not a valid attestation envelope.
    #[error("Failed to decode attestation #{index} for '{reference}'")]
    #[diagnostic(code(sigfetch::collection::decode))]
    AttestationDecode {
        /// Reference whose attestations were requested.
        reference: String,
        /// Enumeration position of the attestation.
        index: usize,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The resolved entity has no attachment with this name.
    #[error("No {name} attached to {reference}")]
    #[diagnostic(code(sigfetch::attachment::not_found))]
    AttachmentNotFound {
        /// Attachment name (e.g. "sbom").
        name: String,
        /// Reference that was inspected.
        reference: String,
    },

    /// Reading the bytes of an attachment failed.
    #[error("Failed to read {name} payload for '{reference}'")]
    #[diagnostic(code(sigfetch::attachment::payload))]
    Payload {
        /// Attachment name.
        name: String,
        /// Reference the attachment belongs to.
        reference: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Reading the declared media type of an attachment failed.
    #[error("Failed to read {name} media type for '{reference}'")]
    #[diagnostic(code(sigfetch::attachment::media_type))]
    MediaType {
        /// Attachment name.
        name: String,
        /// Reference the attachment belongs to.
        reference: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// A certificate annotation or file is not valid PEM.
    #[error("Invalid certificate: {message}")]
    #[diagnostic(code(sigfetch::certificate))]
    InvalidCertificate {
        /// Parser message.
        message: String,
    },

    /// A base64 field could not be decoded.
    #[error("Invalid base64 in {field}")]
    #[diagnostic(code(sigfetch::encoding))]
    InvalidEncoding {
        /// Field that was being decoded.
        field: &'static str,
        /// Decoder error.
        #[source]
        source: base64::DecodeError,
    },

    /// A local payload file could not be read.
    #[error("Failed to read {}", path.display())]
    #[diagnostic(
        code(sigfetch::local::io),
        help("Check the path exists and is readable")
    )]
    Io {
        /// Path that was read.
        path: Box<Path>,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A local payload file is not a valid signed payload document.
    #[error("Failed to decode signed payload in {}", path.display())]
    #[diagnostic(code(sigfetch::local::decode))]
    Decode {
        /// Path that was decoded.
        path: Box<Path>,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The operation was cancelled or its deadline elapsed.
    #[error("Operation cancelled")]
    #[diagnostic(code(sigfetch::cancelled))]
    Cancelled,

    /// A fetch worker stopped without reporting a result.
    #[error("Fetch worker for member #{index} exited without a result")]
    #[diagnostic(code(sigfetch::worker))]
    Worker {
        /// Slot the worker owned.
        index: usize,
    },
}

impl Error {
    /// Create an invalid reference error.
    #[must_use]
    pub fn invalid_reference(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create an invalid platform error.
    #[must_use]
    pub fn invalid_platform(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPlatform {
            platform: platform.into(),
            message: message.into(),
        }
    }

    /// Create a registry error.
    #[must_use]
    pub fn registry(reference: impl ToString, message: impl Into<String>) -> Self {
        Self::Registry {
            reference: reference.to_string(),
            message: message.into(),
        }
    }

    /// Wrap a failure to enumerate a collection. Cancellation passes through.
    #[must_use]
    pub fn list_collection(kind: CollectionKind, reference: &ImageReference, source: Self) -> Self {
        if source.is_cancelled() {
            return source;
        }
        Self::ListCollection {
            kind,
            reference: reference.to_string(),
            source: Box::new(source),
        }
    }

    /// Create a not-an-index error.
    #[must_use]
    pub fn not_an_index(reference: &ImageReference) -> Self {
        Self::NotAnIndex {
            reference: reference.to_string(),
        }
    }

    /// Wrap a failure to read an index manifest. Cancellation passes through.
    #[must_use]
    pub fn index_manifest(platform: &Platform, reference: &ImageReference, source: Self) -> Self {
        if source.is_cancelled() {
            return source;
        }
        Self::IndexManifest {
            platform: platform.to_string(),
            reference: reference.to_string(),
            source: Box::new(source),
        }
    }

    /// Create a platform not found error.
    #[must_use]
    pub fn platform_not_found(platform: &Platform, reference: &ImageReference) -> Self {
        Self::PlatformNotFound {
            platform: platform.to_string(),
            reference: reference.to_string(),
        }
    }

    /// Create an empty collection error.
    #[must_use]
    pub fn empty_collection(kind: CollectionKind, reference: &ImageReference) -> Self {
        Self::EmptyCollection {
            kind,
            reference: reference.to_string(),
        }
    }

    /// Wrap a per-member failure. Cancellation passes through.
    #[must_use]
    pub fn member_fetch(
        kind: CollectionKind,
        reference: &ImageReference,
        index: usize,
        field: &'static str,
        source: Self,
    ) -> Self {
        if source.is_cancelled() {
            return source;
        }
        Self::MemberFetch {
            kind,
            reference: reference.to_string(),
            index,
            field,
            source: Box::new(source),
        }
    }

    /// Create an attestation decode error.
    #[must_use]
    pub fn attestation_decode(
        reference: &ImageReference,
        index: usize,
        source: serde_json::Error,
    ) -> Self {
        Self::AttestationDecode {
            reference: reference.to_string(),
            index,
            source,
        }
    }

    /// Create an attachment not found error.
    #[must_use]
    pub fn attachment_not_found(name: impl Into<String>, reference: &ImageReference) -> Self {
        Self::AttachmentNotFound {
            name: name.into(),
            reference: reference.to_string(),
        }
    }

    /// Wrap a failure to read attachment bytes.
    #[must_use]
    pub fn payload(name: impl Into<String>, reference: &ImageReference, source: Self) -> Self {
        if source.is_cancelled() {
            return source;
        }
        Self::Payload {
            name: name.into(),
            reference: reference.to_string(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure to read an attachment media type.
    #[must_use]
    pub fn media_type(name: impl Into<String>, reference: &ImageReference, source: Self) -> Self {
        if source.is_cancelled() {
            return source;
        }
        Self::MediaType {
            name: name.into(),
            reference: reference.to_string(),
            source: Box::new(source),
        }
    }

    /// Create an invalid certificate error.
    #[must_use]
    pub fn invalid_certificate(message: impl Into<String>) -> Self {
        Self::InvalidCertificate {
            message: message.into(),
        }
    }

    /// Create a local read error.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().into(),
            source,
        }
    }

    /// Create a local decode error.
    #[must_use]
    pub fn decode(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Decode {
            path: path.as_ref().into(),
            source,
        }
    }

    /// Whether this error is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error means "nothing is attached" rather than a failure
    /// to talk to the registry or to read local input.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EmptyCollection { .. }
                | Self::AttachmentNotFound { .. }
                | Self::PlatformNotFound { .. }
        )
    }
}
