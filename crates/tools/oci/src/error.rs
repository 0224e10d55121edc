//! Error types for the OCI registry provider.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for OCI provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring the registry client or running a download.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Resolution or fetch failure reported by the core fetcher.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fetch(#[from] sigfetch_core::Error),

    /// An option or environment variable has an unusable value.
    #[error("Invalid value for {key}: '{value}'")]
    #[diagnostic(code(sigfetch::oci::config), help("{hint}"))]
    Config {
        /// Option or environment variable name.
        key: &'static str,
        /// The rejected value.
        value: String,
        /// What a valid value looks like.
        hint: &'static str,
    },

    /// Writing downloaded content to the output failed.
    #[error("Failed to write {what} to output")]
    #[diagnostic(code(sigfetch::oci::output))]
    Output {
        /// What was being written.
        what: &'static str,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn config(key: &'static str, value: impl Into<String>, hint: &'static str) -> Self {
        Self::Config {
            key,
            value: value.into(),
            hint,
        }
    }

    /// Create an output error.
    #[must_use]
    pub fn output(what: &'static str, source: std::io::Error) -> Self {
        Self::Output { what, source }
    }

    /// Whether the failure means nothing was attached to the image.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_not_found())
    }
}
