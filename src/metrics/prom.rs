use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use prometheus::{labels, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tracing::debug;

use crate::error::EntryError;

pub const DAYS_METRIC: &str = "certificate_expiration_days";
pub const DATE_METRIC: &str = "certificate_expiration_date";
pub const LABEL: &str = "certificate_name";

/// A gauge family keyed by certificate subject, plus the set of subjects
/// written so far.
struct SubjectGauge {
    vec: GaugeVec,
    subjects: RwLock<BTreeSet<String>>,
}

impl SubjectGauge {
    fn new(name: &str, help: &str) -> Result<Self, prometheus::Error> {
        Ok(SubjectGauge {
            vec: GaugeVec::new(Opts::new(name, help), &[LABEL])?,
            subjects: RwLock::new(BTreeSet::new()),
        })
    }

    fn set(&self, subject: &str, value: f64) -> Result<(), EntryError> {
        let gauge = self
            .vec
            .get_metric_with_label_values(&[subject])
            .map_err(|source| EntryError::MetricWrite {
                subject: subject.to_string(),
                source,
            })?;
        gauge.set(value);

        self.subjects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject.to_string());
        Ok(())
    }

    fn snapshot(&self) -> BTreeMap<String, f64> {
        let subjects = self
            .subjects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        subjects
            .into_iter()
            .filter_map(|subject| {
                let value = self.vec.get_metric_with_label_values(&[subject.as_str()]).ok()?.get();
                Some((subject, value))
            })
            .collect()
    }
}

/// The two certificate gauge families and the registry exposing them.
///
/// Values are overwritten in place; subjects that stop appearing in the
/// store keep their last value until the process restarts. Every sample is
/// an atomic, so a concurrent reader sees either the old or the new value.
pub struct CertificateMetrics {
    registry: Registry,
    days: SubjectGauge,
    date: SubjectGauge,
}

impl CertificateMetrics {
    /// Creates both gauge families in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let days = SubjectGauge::new(DAYS_METRIC, "Days to expiration date of Certbot certificate")?;
        let date = SubjectGauge::new(
            DATE_METRIC,
            "Exact date and time of expiration of Certbot certificate",
        )?;
        registry.register(Box::new(days.vec.clone()))?;
        registry.register(Box::new(date.vec.clone()))?;

        Ok(CertificateMetrics {
            registry,
            days,
            date,
        })
    }

    /// Like [`CertificateMetrics::new`], with the `process_*` collector added
    /// where the platform supports it.
    pub fn with_process_metrics() -> Result<Self, prometheus::Error> {
        let metrics = Self::new()?;
        #[cfg(target_os = "linux")]
        metrics.registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;
        Ok(metrics)
    }

    pub fn set_days_remaining(&self, subject: &str, days: i64) -> Result<(), EntryError> {
        self.days.set(subject, days as f64)
    }

    pub fn set_expiration_instant(
        &self,
        subject: &str,
        instant: DateTime<Utc>,
    ) -> Result<(), EntryError> {
        self.date.set(subject, instant.timestamp() as f64)
    }

    /// Current `certificate_expiration_days` values by subject.
    pub fn days_series(&self) -> BTreeMap<String, f64> {
        self.days.snapshot()
    }

    /// Current `certificate_expiration_date` values by subject.
    pub fn date_series(&self) -> BTreeMap<String, f64> {
        self.date.snapshot()
    }

    /// Renders every registered family in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = String::new();
        TextEncoder::new().encode_utf8(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    /// Content type of [`CertificateMetrics::encode`] output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Pushes the current values to a Prometheus Push Gateway.
    ///
    /// # Arguments
    /// * `address` - Push Gateway base address, e.g. `http://localhost:9091`
    /// * `job` - job label of the pushed group
    pub fn push(&self, address: &str, job: &str) -> Result<(), prometheus::Error> {
        let grouping: HashMap<String, String> = labels! {
            "instance".to_owned() => job.to_owned(),
        };
        debug!(address = address, job = job, "Pushing metrics");
        prometheus::push_metrics(job, grouping, address, self.registry.gather(), None)
    }
}
