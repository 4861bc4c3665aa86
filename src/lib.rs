//! Certificate expiration exporter for Certbot.
//!
//! Scans a Certbot `live` directory, reads the `cert.pem` of every
//! certificate lineage and publishes two Prometheus gauge families keyed by
//! the certificate subject:
//!
//! - `certificate_expiration_days` - whole days until expiry (negative once
//!   expired)
//! - `certificate_expiration_date` - expiry as Unix epoch seconds
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use certbot_exporter::{CertificateMetrics, CertificateStore, Scanner};
//!
//! let store = CertificateStore::open("/etc/letsencrypt/live")?;
//! let metrics = Arc::new(CertificateMetrics::new()?);
//! let scanner = Scanner::new(store, Arc::clone(&metrics));
//!
//! let report = scanner.run_cycle()?;
//! println!("{} certificates, {} failures", report.processed, report.errors.len());
//! print!("{}", metrics.encode()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod expiry;
pub mod logging;
pub mod metrics;
pub mod parser;
pub mod scan;
pub mod server;
pub mod store;

pub use error::{EntryError, ExporterError, FailureKind, StoreError};
pub use expiry::{evaluate, ExpirationAssessment};
pub use metrics::CertificateMetrics;
pub use parser::{parse, ParsedCertificate};
pub use scan::{CycleReport, EntryFailure, Scanner};
pub use store::{CertificateEntry, CertificateStore};
