//! Metrics storage and export.
//!
//! This module holds the gauges the exporter publishes and knows how to
//! render them in the Prometheus text format or push them to a Push Gateway.
//!
//! # Submodules
//!
//! - `prom` - Prometheus registry and certificate gauges

pub mod prom;

pub use prom::CertificateMetrics;
