//! Discovery of certificates on disk.
//!
//! Certbot keeps one directory per certificate lineage under its `live`
//! directory; the leaf certificate of each lineage is `<lineage>/cert.pem`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ExporterError, StoreError};

/// File looked up inside every child directory of the store root.
pub const CERT_FILE_NAME: &str = "cert.pem";

/// Raw contents of one `cert.pem`, as read from disk.
#[derive(Debug, Clone)]
pub struct CertificateEntry {
    pub source_path: PathBuf,
    pub raw: Vec<u8>,
}

/// A validated certificate root directory.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    root: PathBuf,
}

impl CertificateStore {
    /// Opens the store rooted at `root`.
    ///
    /// # Errors
    ///
    /// [`ExporterError::Configuration`] when `root` does not exist or is not
    /// a directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, ExporterError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ExporterError::Configuration {
                path: root.to_path_buf(),
            });
        }
        Ok(CertificateStore {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the store from scratch.
    ///
    /// The returned iterator is lazy: each `cert.pem` is read when the
    /// iterator reaches it. Children without a `cert.pem` are skipped
    /// silently.
    pub fn list_certificates(&self) -> Result<CertificateEntries, StoreError> {
        let inner = fs::read_dir(&self.root).map_err(|source| StoreError::Enumerate {
            path: self.root.clone(),
            source,
        })?;
        Ok(CertificateEntries {
            root: self.root.clone(),
            inner,
        })
    }
}

/// Iterator over the certificates of one listing of a [`CertificateStore`].
#[derive(Debug)]
pub struct CertificateEntries {
    root: PathBuf,
    inner: fs::ReadDir,
}

impl Iterator for CertificateEntries {
    type Item = Result<CertificateEntry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let child = match self.inner.next()? {
                Ok(child) => child,
                Err(source) => {
                    return Some(Err(StoreError::Enumerate {
                        path: self.root.clone(),
                        source,
                    }))
                }
            };

            let cert_path = child.path().join(CERT_FILE_NAME);
            if !cert_path.is_file() {
                continue;
            }

            return Some(match fs::read(&cert_path) {
                Ok(raw) => Ok(CertificateEntry {
                    source_path: cert_path,
                    raw,
                }),
                Err(source) => Err(StoreError::Unreadable {
                    path: cert_path,
                    source,
                }),
            });
        }
    }
}
