//! Value objects produced by fetch operations.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Name of the signature attachment kind.
pub const SIGNATURE: &str = "signature";
/// Name of the SBOM attachment kind.
pub const SBOM: &str = "sbom";
/// Name of the attestation attachment kind.
pub const ATTESTATION: &str = "attestation";

/// An X.509 certificate in DER form.
///
/// Only carried, never validated.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    /// Wrap DER bytes.
    #[must_use]
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self { der: der.into() }
    }

    /// DER bytes.
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Parse every `CERTIFICATE` block in a PEM document, in order.
    pub fn parse_pem(pem: &[u8]) -> Result<Vec<Self>> {
        let mut reader = pem;
        rustls_pemfile::certs(&mut reader)
            .map(|cert| {
                cert.map(|der| Self::from_der(der.to_vec()))
                    .map_err(|e| Error::invalid_certificate(e.to_string()))
            })
            .collect()
    }

    /// Encode as a PEM `CERTIFICATE` block.
    #[must_use]
    pub fn to_pem(&self) -> String {
        let encoded = STANDARD.encode(&self.der);
        let mut pem = String::from("-----BEGIN CERTIFICATE-----\n");
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % 64 == 0 {
                pem.push('\n');
            }
            pem.push(c);
        }
        pem.push_str("\n-----END CERTIFICATE-----\n");
        pem
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("der_len", &self.der.len())
            .finish()
    }
}

/// Transparency-log inclusion proof attached to a signature.
///
/// Field names follow the bundle JSON written by signing tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RekorBundle {
    /// Base64 signed entry timestamp from the log.
    #[serde(rename = "SignedEntryTimestamp")]
    pub signed_entry_timestamp: String,
    /// Log entry summary.
    #[serde(rename = "Payload")]
    pub payload: RekorPayload,
}

/// The log entry referenced by a [`RekorBundle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RekorPayload {
    /// Canonicalized entry body, kept as received.
    pub body: serde_json::Value,
    /// Unix time the entry was integrated.
    #[serde(rename = "integratedTime")]
    pub integrated_time: i64,
    /// Position in the log.
    #[serde(rename = "logIndex")]
    pub log_index: i64,
    /// Log identifier.
    #[serde(rename = "logID")]
    pub log_id: String,
}

impl RekorBundle {
    /// Decode the signed entry timestamp.
    pub fn signed_entry_timestamp_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.signed_entry_timestamp)
            .map_err(|source| Error::InvalidEncoding {
                field: "SignedEntryTimestamp",
                source,
            })
    }
}

/// One signature record.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedPayload {
    /// Base64-encoded signature.
    pub base64_signature: String,
    /// Signed payload bytes.
    pub payload: Vec<u8>,
    /// Signing certificate.
    pub cert: Option<Certificate>,
    /// Certificate chain.
    pub chain: Vec<Certificate>,
    /// Transparency-log bundle.
    pub bundle: Option<RekorBundle>,
}

/// One `{keyid, sig}` pair of an attestation envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationSignature {
    /// Key identifier hint, often empty.
    #[serde(rename = "keyid")]
    pub key_id: String,
    /// Base64 signature.
    pub sig: String,
}

/// One attestation envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationPayload {
    /// Payload type URI (e.g. `application/vnd.in-toto+json`).
    #[serde(rename = "payloadType")]
    pub payload_type: String,
    /// Base64-encoded statement.
    pub payload: String,
    /// Signatures over the envelope, in envelope order.
    pub signatures: Vec<AttestationSignature>,
}

impl AttestationPayload {
    /// Decode the base64 statement.
    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.payload)
            .map_err(|source| Error::InvalidEncoding {
                field: "payload",
                source,
            })
    }
}

/// Bytes and media type of a named attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPayload {
    /// Raw attachment content.
    pub payload: Vec<u8>,
    /// Declared media type.
    pub media_type: String,
}

/// On-disk form of an exported signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSignedPayload {
    /// Base64-encoded signature.
    #[serde(rename = "base64Signature", default)]
    pub base64_signature: String,
    /// PEM signing certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    /// Transparency-log bundle.
    #[serde(rename = "rekorBundle", default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<RekorBundle>,
}
