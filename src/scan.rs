//! One pass over the certificate store.
//!
//! A cycle lists the store, decodes each `cert.pem`, computes its remaining
//! validity and writes both gauges. Failures tied to one certificate are
//! recorded in the [`CycleReport`]; only losing the store listing itself
//! ends the cycle early.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{EntryError, ExporterError, FailureKind, StoreError};
use crate::expiry::{evaluate, ExpirationAssessment};
use crate::metrics::CertificateMetrics;
use crate::parser::parse;
use crate::store::{CertificateEntry, CertificateStore};

/// A certificate that could not be published in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFailure {
    pub source_path: PathBuf,
    pub kind: FailureKind,
    pub cause: String,
}

/// Outcome of one scan cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Certificates whose gauges were written
    pub processed: usize,
    /// Certificates found but not published; equals `errors.len()`
    pub skipped: usize,
    /// Per-certificate failures, in discovery order
    pub errors: Vec<EntryFailure>,
    /// Assessments written in this cycle, in discovery order
    pub certificates: Vec<ExpirationAssessment>,
}

impl CycleReport {
    fn record_failure(&mut self, source_path: PathBuf, error: &EntryError) {
        warn!(path = %source_path.display(), error = %error, "Skipping certificate");
        self.skipped += 1;
        self.errors.push(EntryFailure {
            source_path,
            kind: error.kind(),
            cause: error.to_string(),
        });
    }
}

/// Drives scan cycles for one store into one set of gauges.
///
/// Cycles must not overlap; whoever calls [`Scanner::run_cycle`] is
/// responsible for serialising calls.
pub struct Scanner {
    store: CertificateStore,
    metrics: Arc<CertificateMetrics>,
}

impl Scanner {
    pub fn new(store: CertificateStore, metrics: Arc<CertificateMetrics>) -> Self {
        Scanner { store, metrics }
    }

    pub fn metrics(&self) -> &Arc<CertificateMetrics> {
        &self.metrics
    }

    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    /// Runs one cycle against the current time.
    pub fn run_cycle(&self) -> Result<CycleReport, ExporterError> {
        self.run_cycle_at(Utc::now())
    }

    /// Runs one cycle, measuring remaining validity from `now`.
    ///
    /// # Errors
    ///
    /// [`ExporterError::ScanAborted`] when the store cannot be listed. Gauges
    /// written before that point are kept.
    pub fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport, ExporterError> {
        let entries = self.discover()?;

        let mut report = CycleReport::default();
        if entries.is_empty() {
            info!(root = %self.store.root().display(), "No certificates found");
            return Ok(report);
        }

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err((source_path, error)) => {
                    report.record_failure(source_path, &error);
                    continue;
                }
            };

            match self.publish(&entry, now) {
                Ok(assessment) => {
                    debug!(
                        path = %entry.source_path.display(),
                        subject = %assessment.subject,
                        days_remaining = assessment.days_remaining,
                        "Certificate expiry metrics updated"
                    );
                    report.processed += 1;
                    report.certificates.push(assessment);
                }
                Err(error) => report.record_failure(entry.source_path, &error),
            }
        }

        info!(
            processed = report.processed,
            skipped = report.skipped,
            "Certificate scan finished"
        );
        Ok(report)
    }

    /// Materialises one listing of the store.
    ///
    /// Unreadable files become per-entry failures; a listing error aborts.
    fn discover(&self) -> Result<Vec<Discovered>, ExporterError> {
        let listing = self.store.list_certificates().map_err(abort)?;

        listing.map(classify).collect()
    }

    fn publish(
        &self,
        entry: &CertificateEntry,
        now: DateTime<Utc>,
    ) -> Result<ExpirationAssessment, EntryError> {
        let cert = parse(entry)?;
        let assessment = evaluate(&cert, now);
        self.metrics
            .set_days_remaining(&assessment.subject, assessment.days_remaining)?;
        self.metrics
            .set_expiration_instant(&assessment.subject, assessment.expiration)?;
        Ok(assessment)
    }
}

type Discovered = Result<CertificateEntry, (PathBuf, EntryError)>;

/// Splits one listing item into a usable entry, a per-entry failure, or a
/// reason to abort the cycle.
fn classify(item: Result<CertificateEntry, StoreError>) -> Result<Discovered, ExporterError> {
    match item {
        Ok(entry) => Ok(Ok(entry)),
        Err(StoreError::Unreadable { path, source }) => {
            let error = EntryError::CertificateParse {
                source_path: path.clone(),
                reason: source.to_string(),
            };
            Ok(Err((path, error)))
        }
        Err(error @ StoreError::Enumerate { .. }) => Err(abort(error)),
    }
}

fn abort(error: StoreError) -> ExporterError {
    match error {
        StoreError::Enumerate { path, source } | StoreError::Unreadable { path, source } => {
            ExporterError::ScanAborted { path, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io;
    use tempfile::TempDir;

    fn scanner_for(root: &TempDir) -> Scanner {
        let store = CertificateStore::open(root.path()).unwrap();
        Scanner::new(store, Arc::new(CertificateMetrics::new().unwrap()))
    }

    #[test]
    fn test_empty_store_is_a_no_op() {
        let root = TempDir::new().unwrap();
        let scanner = scanner_for(&root);
        scanner.metrics().set_days_remaining("previous", 7).unwrap();

        let report = scanner.run_cycle().unwrap();

        assert_eq!(report, CycleReport::default());
        assert_eq!(scanner.metrics().days_series().get("previous"), Some(&7.0));
    }

    #[test]
    fn test_malformed_certificate_is_reported() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("broken")).unwrap();
        fs::write(root.path().join("broken").join("cert.pem"), b"garbage").unwrap();
        let scanner = scanner_for(&root);

        let report = scanner.run_cycle().unwrap();

        assert_eq!(report.processed, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, FailureKind::Parse);
        assert_eq!(
            report.errors[0].source_path,
            root.path().join("broken").join("cert.pem")
        );
        assert!(scanner.metrics().days_series().is_empty());
    }

    #[test]
    fn test_unreadable_certificate_is_a_parse_failure() {
        let path = PathBuf::from("/live/locked/cert.pem");
        let item = Err(StoreError::Unreadable {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        });

        let (failed_path, error) = match classify(item) {
            Ok(Err(failure)) => failure,
            other => panic!("Expected a per-entry failure, got {:?}", other),
        };
        assert_eq!(failed_path, path);
        assert_eq!(error.kind(), FailureKind::Parse);
        assert!(error.to_string().contains("permission denied"));
    }

    #[test]
    fn test_enumeration_error_aborts() {
        let item = Err(StoreError::Enumerate {
            path: PathBuf::from("/live"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        });

        assert!(matches!(
            classify(item),
            Err(ExporterError::ScanAborted { .. })
        ));
    }

    #[test]
    fn test_rejected_metric_write_is_recorded() {
        let error = EntryError::MetricWrite {
            subject: "example.org".to_string(),
            source: prometheus::Error::Msg("label set rejected".to_string()),
        };
        let mut report = CycleReport::default();

        report.record_failure(PathBuf::from("/live/example/cert.pem"), &error);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors[0].kind, FailureKind::MetricWrite);
        assert!(report.errors[0].cause.contains("example.org"));
    }

    #[test]
    fn test_vanished_root_aborts_cycle() {
        let root = TempDir::new().unwrap();
        let scanner = scanner_for(&root);
        fs::remove_dir(root.path()).unwrap();

        let result = scanner.run_cycle();
        assert!(matches!(result, Err(ExporterError::ScanAborted { .. })));
    }
}
