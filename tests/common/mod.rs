//! Fixture certificates for the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::x509::{X509Builder, X509NameBuilder};

pub const DAY: i64 = 86_400;

/// Self-signed certificate with the given subject attributes, PEM encoded.
pub fn certificate_pem(subject: &[(&str, &str)], not_after: i64) -> Vec<u8> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    for (field, value) in subject {
        name.append_entry_by_text(field, value).unwrap();
    }
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::from_unix(not_after - 90 * DAY).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(not_after).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    builder.build().to_pem().unwrap()
}

/// Writes `<root>/<lineage>/cert.pem` for a certificate with subject `CN=<cn>`.
pub fn write_lineage(root: &Path, lineage: &str, cn: &str, not_after: i64) -> PathBuf {
    write_raw(root, lineage, &certificate_pem(&[("CN", cn)], not_after))
}

/// Writes arbitrary bytes as `<root>/<lineage>/cert.pem`.
pub fn write_raw(root: &Path, lineage: &str, contents: &[u8]) -> PathBuf {
    let dir = root.join(lineage);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("cert.pem");
    fs::write(&path, contents).unwrap();
    path
}
