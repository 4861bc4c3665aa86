//! Error types for the certificate scan pipeline.
//!
//! Errors fall into two groups. [`ExporterError`] is fatal to the unit of
//! work that raised it (initialisation or a whole scan cycle) and is returned
//! to the caller. [`EntryError`] is scoped to a single certificate; the scan
//! records it in the cycle report and moves on.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Fatal errors surfaced to whoever drives the exporter.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// The certificate root is missing or is not a directory
    #[error("{} is not a directory or does not exist", path.display())]
    Configuration {
        /// The configured certificate root
        path: PathBuf,
    },

    /// Listing the certificate root failed, so the cycle was abandoned
    #[error("scan of {} aborted: {source}", path.display())]
    ScanAborted {
        /// The directory that could not be enumerated
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The task running the cycle panicked or was cancelled
    #[error("scan task failed: {reason}")]
    ScanTask {
        /// Description reported by the runtime
        reason: String,
    },
}

/// Failures isolated to one certificate during a scan cycle.
#[derive(Debug, Error)]
pub enum EntryError {
    /// `cert.pem` could not be read or is not a PEM encoded X.509 certificate
    #[error("failed to parse certificate {}: {reason}", source_path.display())]
    CertificateParse {
        /// Path of the offending `cert.pem`
        source_path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// The metric registry refused a sample for this subject
    #[error("failed to set gauge of {subject}: {source}")]
    MetricWrite {
        /// Label value that was rejected
        subject: String,
        /// Error reported by the registry
        #[source]
        source: prometheus::Error,
    },
}

impl EntryError {
    /// Classification used in cycle reports.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::CertificateParse { .. } => FailureKind::Parse,
            Self::MetricWrite { .. } => FailureKind::MetricWrite,
        }
    }
}

/// Kind of a per-certificate failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Unreadable or malformed certificate file
    Parse,
    /// Rejected metric write
    MetricWrite,
}

/// Errors raised while walking the certificate root.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The root (or one of its children) could not be listed
    #[error("failed to list {}: {source}", path.display())]
    Enumerate {
        /// Directory being listed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A `cert.pem` exists but reading it failed
    #[error("failed to read {}: {source}", path.display())]
    Unreadable {
        /// Path of the certificate file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}
