//! Remaining validity of parsed certificates.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::parser::ParsedCertificate;

const SECONDS_PER_DAY: i64 = 86_400;

/// Remaining validity of one certificate at a given moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpirationAssessment {
    pub subject: String,
    /// Whole days left, rounded towards negative infinity
    pub days_remaining: i64,
    pub expiration: DateTime<Utc>,
}

impl ExpirationAssessment {
    /// Expiration as Unix epoch seconds.
    pub fn expiration_timestamp(&self) -> i64 {
        self.expiration.timestamp()
    }
}

/// Computes how long `cert` has left at `now`.
///
/// An expired certificate yields a negative day count; half a day past
/// expiry is already `-1`.
pub fn evaluate(cert: &ParsedCertificate, now: DateTime<Utc>) -> ExpirationAssessment {
    let remaining = cert.not_after - now;
    // num_seconds truncates towards zero
    let mut seconds = remaining.num_seconds();
    if remaining < Duration::seconds(seconds) {
        seconds -= 1;
    }
    ExpirationAssessment {
        subject: cert.subject.clone(),
        days_remaining: seconds.div_euclid(SECONDS_PER_DAY),
        expiration: cert.not_after,
    }
}
