//! End-to-end scan cycles over temporary certificate stores.

mod common;

use std::fs;
use std::sync::Arc;

use certbot_exporter::{CertificateMetrics, CertificateStore, FailureKind, Scanner};
use chrono::{DateTime, Utc};
use common::{write_lineage, write_raw, DAY};
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap()
}

fn scanner_for(root: &TempDir) -> Scanner {
    let store = CertificateStore::open(root.path()).unwrap();
    Scanner::new(store, Arc::new(CertificateMetrics::new().unwrap()))
}

#[test]
fn test_single_certificate_and_misnamed_file() {
    let root = TempDir::new().unwrap();
    let now = now();
    let expiry = now.timestamp() + 5 * DAY;
    write_lineage(root.path(), "a", "alice", expiry);
    fs::create_dir(root.path().join("b")).unwrap();
    fs::write(root.path().join("b").join("cert.pone"), b"misnamed").unwrap();
    let scanner = scanner_for(&root);

    let report = scanner.run_cycle_at(now).unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 0);
    assert!(report.errors.is_empty());
    assert_eq!(report.certificates[0].subject, "alice");
    assert_eq!(report.certificates[0].days_remaining, 5);

    let days = scanner.metrics().days_series();
    assert_eq!(days.len(), 1);
    assert_eq!(days.get("alice"), Some(&5.0));
    let dates = scanner.metrics().date_series();
    assert_eq!(dates.get("alice"), Some(&(expiry as f64)));
}

#[test]
fn test_identical_cycles_yield_identical_series() {
    let root = TempDir::new().unwrap();
    let now = now();
    write_lineage(root.path(), "one", "one.example.org", now.timestamp() + 30 * DAY);
    write_lineage(root.path(), "two", "two.example.org", now.timestamp() - 2 * DAY);
    let scanner = scanner_for(&root);

    let first = scanner.run_cycle_at(now).unwrap();
    let days = scanner.metrics().days_series();
    let dates = scanner.metrics().date_series();

    let second = scanner.run_cycle_at(now).unwrap();

    assert_eq!(first.processed, 2);
    assert_eq!(second.processed, 2);
    assert_eq!(scanner.metrics().days_series(), days);
    assert_eq!(scanner.metrics().date_series(), dates);
    assert_eq!(days.get("two.example.org"), Some(&-2.0));
}

#[test]
fn test_malformed_certificate_does_not_stop_the_cycle() {
    let root = TempDir::new().unwrap();
    let now = now();
    for (lineage, days) in [("a", 10), ("b", 20), ("c", 30)] {
        let cn = format!("{}.example.org", lineage);
        write_lineage(root.path(), lineage, &cn, now.timestamp() + days * DAY);
    }
    let broken = write_raw(root.path(), "broken", b"-----BEGIN CERTIFICATE-----\n");
    let scanner = scanner_for(&root);

    let report = scanner.run_cycle_at(now).unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].source_path, broken);
    assert_eq!(report.errors[0].kind, FailureKind::Parse);

    let days = scanner.metrics().days_series();
    assert_eq!(days.len(), 3);
    assert_eq!(days.get("a.example.org"), Some(&10.0));
    assert_eq!(days.get("b.example.org"), Some(&20.0));
    assert_eq!(days.get("c.example.org"), Some(&30.0));
}

#[test]
fn test_partial_day_rounds_down() {
    let root = TempDir::new().unwrap();
    let now = now();
    write_lineage(root.path(), "half", "half.example.org", now.timestamp() + 10 * DAY + DAY / 2);
    write_lineage(root.path(), "gone", "gone.example.org", now.timestamp() - DAY);
    let scanner = scanner_for(&root);

    scanner.run_cycle_at(now).unwrap();

    let days = scanner.metrics().days_series();
    assert_eq!(days.get("half.example.org"), Some(&10.0));
    assert_eq!(days.get("gone.example.org"), Some(&-1.0));
}

#[test]
fn test_directory_without_certificate_is_ignored() {
    let root = TempDir::new().unwrap();
    fs::create_dir(root.path().join("empty-lineage")).unwrap();
    fs::write(root.path().join("README"), b"certbot").unwrap();
    let scanner = scanner_for(&root);

    let report = scanner.run_cycle().unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(report.skipped, 0);
    assert!(report.errors.is_empty());
}

#[test]
fn test_empty_store_keeps_previous_values() {
    let root = TempDir::new().unwrap();
    let now = now();
    let path = write_lineage(root.path(), "x", "x.example.org", now.timestamp() + 3 * DAY);
    let scanner = scanner_for(&root);
    scanner.run_cycle_at(now).unwrap();

    fs::remove_file(path).unwrap();
    let report = scanner.run_cycle_at(now).unwrap();

    assert_eq!(report.processed, 0);
    assert!(report.errors.is_empty());
    assert_eq!(scanner.metrics().days_series().get("x.example.org"), Some(&3.0));
}

#[test]
fn test_removed_certificate_series_is_stale_not_removed() {
    let root = TempDir::new().unwrap();
    let now = now();
    write_lineage(root.path(), "x", "X", now.timestamp() + 7 * DAY);
    write_lineage(root.path(), "y", "Y", now.timestamp() + 8 * DAY);
    let scanner = scanner_for(&root);
    scanner.run_cycle_at(now).unwrap();

    fs::remove_dir_all(root.path().join("x")).unwrap();
    let later = now + chrono::Duration::days(1);
    let report = scanner.run_cycle_at(later).unwrap();

    assert_eq!(report.processed, 1);
    let days = scanner.metrics().days_series();
    assert_eq!(days.get("X"), Some(&7.0));
    assert_eq!(days.get("Y"), Some(&7.0));
}

#[test]
fn test_renewed_certificate_overwrites_series() {
    let root = TempDir::new().unwrap();
    let now = now();
    write_lineage(root.path(), "site", "site.example.org", now.timestamp() + 2 * DAY);
    let scanner = scanner_for(&root);
    scanner.run_cycle_at(now).unwrap();

    let renewed = now.timestamp() + 90 * DAY;
    write_lineage(root.path(), "site", "site.example.org", renewed);
    scanner.run_cycle_at(now).unwrap();

    assert_eq!(
        scanner.metrics().days_series().get("site.example.org"),
        Some(&90.0)
    );
    assert_eq!(
        scanner.metrics().date_series().get("site.example.org"),
        Some(&(renewed as f64))
    );
}

#[test]
fn test_exposition_format() {
    let root = TempDir::new().unwrap();
    let now = now();
    let expiry = now.timestamp() + 5 * DAY;
    write_lineage(root.path(), "a", "alice", expiry);
    let scanner = scanner_for(&root);
    scanner.run_cycle_at(now).unwrap();

    let text = scanner.metrics().encode().unwrap();

    assert!(text.contains("certificate_expiration_days{certificate_name=\"alice\"} 5"));
    assert!(text.contains(&format!(
        "certificate_expiration_date{{certificate_name=\"alice\"}} {}",
        expiry
    )));
}
