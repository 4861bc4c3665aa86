//! Decoding of `cert.pem` buffers into the fields the exporter needs.

use chrono::{DateTime, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509};
use serde::Serialize;

use crate::error::EntryError;
use crate::store::CertificateEntry;

/// Subject and expiry of a decoded certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCertificate {
    pub subject: String,
    pub not_after: DateTime<Utc>,
}

/// Decodes a PEM encoded X.509 certificate.
///
/// The subject identity is the RFC 4514 form of the subject name with the
/// `CN=` attribute tokens removed, so a plain `CN=example.org` subject yields
/// `example.org`.
///
/// # Errors
///
/// [`EntryError::CertificateParse`] when the buffer is not a certificate,
/// when the subject is empty or cannot be rendered, or when the expiry lies
/// outside the representable range.
pub fn parse(entry: &CertificateEntry) -> Result<ParsedCertificate, EntryError> {
    let fail = |reason: String| EntryError::CertificateParse {
        source_path: entry.source_path.clone(),
        reason,
    };

    let cert = X509::from_pem(&entry.raw).map_err(|e| fail(e.to_string()))?;

    let rfc4514 = rfc4514_subject(cert.subject_name()).map_err(|e| fail(e.to_string()))?;
    let subject = subject_identity(&rfc4514);
    if subject.is_empty() {
        return Err(fail("certificate has an empty subject".to_string()));
    }

    let not_after = not_after_utc(cert.not_after()).map_err(fail)?;

    Ok(ParsedCertificate { subject, not_after })
}

/// Converts an ASN.1 time to the instant it denotes.
///
/// The value is measured as an offset from the Unix epoch, so whatever
/// encoding the certificate uses the result is the same absolute instant,
/// expressed in UTC. Nothing is reinterpreted.
fn not_after_utc(not_after: &Asn1TimeRef) -> Result<DateTime<Utc>, String> {
    let epoch = Asn1Time::from_unix(0).map_err(|e| e.to_string())?;
    let diff = epoch.diff(not_after).map_err(|e| e.to_string())?;
    let seconds = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| format!("expiry {} is out of range", not_after))
}

/// Renders a distinguished name the way RFC 4514 does: last RDN first,
/// attributes joined with `,`.
pub fn rfc4514_subject(name: &X509NameRef) -> Result<String, openssl::error::ErrorStack> {
    let mut parts = Vec::new();
    for entry in name.entries() {
        let object = entry.object();
        let key = match attribute_keyword(object.nid()) {
            Some(key) => key.to_string(),
            None => dotted_oid(object.to_owned().as_slice()).unwrap_or_else(|| object.to_string()),
        };
        let value = entry.data().as_utf8()?;
        parts.push(format!("{}={}", key, escape_value(&value)));
    }
    parts.reverse();
    Ok(parts.join(","))
}

fn attribute_keyword(nid: Nid) -> Option<&'static str> {
    let keyword = match nid {
        Nid::COMMONNAME => "CN",
        Nid::LOCALITYNAME => "L",
        Nid::STATEORPROVINCENAME => "ST",
        Nid::ORGANIZATIONNAME => "O",
        Nid::ORGANIZATIONALUNITNAME => "OU",
        Nid::COUNTRYNAME => "C",
        Nid::STREETADDRESS => "STREET",
        Nid::DOMAINCOMPONENT => "DC",
        Nid::USERID => "UID",
        _ => return None,
    };
    Some(keyword)
}

/// Dotted decimal form of a DER encoded object identifier.
fn dotted_oid(der: &[u8]) -> Option<String> {
    let mut arcs: Vec<u64> = Vec::new();
    let mut current: u64 = 0;
    for (i, byte) in der.iter().enumerate() {
        current = current.checked_mul(128)? | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            arcs.push(current);
            current = 0;
        } else if i == der.len() - 1 {
            return None;
        }
    }

    let (&first, rest) = arcs.split_first()?;
    let (top, second) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    let mut dotted = format!("{}.{}", top, second);
    for arc in rest {
        dotted.push('.');
        dotted.push_str(&arc.to_string());
    }
    Some(dotted)
}

fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            '\\' | '"' | '+' | ',' | ';' | '<' | '>' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' if i == 0 => escaped.push_str("\\#"),
            ' ' if i == 0 || i == last => escaped.push_str("\\ "),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Drops every `CN=` attribute token from an RFC 4514 string.
///
/// Only tokens that start an attribute are removed; other attribute types
/// and `CN=` text inside escaped values are left as they are.
pub fn subject_identity(rfc4514: &str) -> String {
    let mut out = String::with_capacity(rfc4514.len());
    let mut at_attribute_start = true;
    let mut rest = rfc4514;

    while !rest.is_empty() {
        if at_attribute_start && rest.starts_with("CN=") {
            rest = &rest["CN=".len()..];
        }
        at_attribute_start = false;

        let mut chars = rest.chars();
        let Some(c) = chars.next() else { break };
        out.push(c);
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else if c == ',' || c == '+' {
            at_attribute_start = true;
        }
        rest = chars.as_str();
    }
    out
}
