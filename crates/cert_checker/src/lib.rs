// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Trust anchor store and certificate chain verifier.
//!
//! A [`CertChecker`] holds the set of trusted roots and decides whether a
//! [`CertificateChain`] is an unbroken path of issuance, in presentation
//! order, ending at one of them. The root set is replaced copy-on-write on
//! every load, so validations run against an immutable snapshot and never
//! contend with loads.
//!
//! ```no_run
//! use cert_checker::{CertChecker, CertificateChain, ChainStatus};
//!
//! let checker = CertChecker::new();
//! checker.load_trusted_certificate("roots/ca-cert.pem").unwrap();
//!
//! let chain = CertificateChain::from_pem(&std::fs::read("chain.pem").unwrap()).unwrap();
//! assert_eq!(checker.validate_chain(&chain), ChainStatus::Valid);
//! ```

mod chain;

pub use chain::{CertificateChain, ChainError, ChainStatus, TrustAnchor, VerifiedChain};

use ct_intake_config::AppConfig;
use log::{info, warn};
use parking_lot::RwLock;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use x509_cert::Certificate;
use x509_util::{parse_pem_chain, CertPool, PemChainError};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Pem {
        path: PathBuf,
        #[source]
        source: PemChainError,
    },
    #[error("{} holds {found} certificates, expected exactly one", path.display())]
    NotSingleCertificate { path: PathBuf, found: usize },
    #[error("no trusted roots configured")]
    NoRoots,
    #[error(transparent)]
    Der(#[from] der::Error),
}

/// Trust anchor store and chain verifier.
///
/// Shared between request handlers behind an [`Arc`]. Loads take `&self` and
/// are serialized by the write lock; validations only hold the read lock for
/// as long as it takes to clone the current snapshot.
#[derive(Default)]
pub struct CertChecker {
    roots: RwLock<Arc<CertPool>>,
}

impl CertChecker {
    /// Creates a checker with an empty trust store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a checker trusting the given certificates.
    ///
    /// # Errors
    ///
    /// Returns an error if a certificate cannot be DER-encoded.
    pub fn with_roots(roots: Vec<Certificate>) -> Result<Self, LoadError> {
        Ok(Self {
            roots: RwLock::new(Arc::new(CertPool::new(roots)?)),
        })
    }

    /// Creates a checker trusting every root listed in the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured root cannot be loaded, or if no
    /// root was found at all.
    pub fn from_config(config: &AppConfig) -> Result<Self, LoadError> {
        let checker = Self::new();
        for path in &config.roots {
            if path.is_dir() {
                checker.load_trusted_certificates_from_dir(path)?;
            } else {
                checker.load_trusted_certificates(path)?;
            }
        }
        if checker.num_roots() == 0 {
            return Err(LoadError::NoRoots);
        }
        Ok(checker)
    }

    /// Loads a PEM file holding exactly one certificate into the trust store.
    /// Returns whether the certificate was new.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a valid PEM
    /// certificate, or holds more than one certificate.
    pub fn load_trusted_certificate<P: AsRef<Path>>(&self, path: P) -> Result<bool, LoadError> {
        let path = path.as_ref();
        let certs = read_pem_file(path)?;
        if certs.len() != 1 {
            return Err(LoadError::NotSingleCertificate {
                path: path.to_path_buf(),
                found: certs.len(),
            });
        }
        let added = self.add_trusted_certificates(certs)?;
        info!("Loaded trusted root from {}", path.display());
        Ok(added == 1)
    }

    /// Loads every certificate of a PEM bundle into the trust store. Returns
    /// the number of certificates that were new.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid PEM
    /// certificate bundle.
    pub fn load_trusted_certificates<P: AsRef<Path>>(&self, path: P) -> Result<usize, LoadError> {
        let path = path.as_ref();
        let added = self.add_trusted_certificates(read_pem_file(path)?)?;
        info!("Loaded {added} new trusted roots from {}", path.display());
        Ok(added)
    }

    /// Loads every `*.pem` file of a directory, in file name order. Returns
    /// the number of certificates that were new.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed, or if one of its
    /// PEM files cannot be read or parsed.
    pub fn load_trusted_certificates_from_dir<P: AsRef<Path>>(
        &self,
        dir: P,
    ) -> Result<usize, LoadError> {
        let dir = dir.as_ref();
        let io_err = |source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && path.extension().is_some_and(|ext| ext == "pem") {
                        files.push(path);
                    }
                }
                Err(e) => warn!("Skipping unreadable entry in {}: {e}", dir.display()),
            }
        }
        files.sort();

        // Parse everything before publishing, so a bad file leaves the store
        // untouched.
        let mut certs = Vec::new();
        for file in &files {
            certs.append(&mut read_pem_file(file)?);
        }
        let added = self.add_trusted_certificates(certs)?;
        info!(
            "Loaded {added} new trusted roots from {} files in {}",
            files.len(),
            dir.display()
        );
        Ok(added)
    }

    /// Adds already-parsed certificates to the trust store and publishes the
    /// new root set. Returns the number of certificates that were new.
    ///
    /// # Errors
    ///
    /// Returns an error if a certificate cannot be DER-encoded, in which case
    /// the store is left unchanged.
    pub fn add_trusted_certificates(&self, certs: Vec<Certificate>) -> Result<usize, LoadError> {
        let mut roots = self.roots.write();
        let mut pool = CertPool::clone(&roots);
        let mut added = 0;
        for cert in certs {
            if pool.add_cert(cert)? {
                added += 1;
            }
        }
        *roots = Arc::new(pool);
        Ok(added)
    }

    /// Returns a snapshot of the current trust store. Later loads do not
    /// affect it.
    pub fn roots(&self) -> Arc<CertPool> {
        Arc::clone(&self.roots.read())
    }

    pub fn num_roots(&self) -> usize {
        self.roots.read().len()
    }

    /// Returns the DER encoding of every trusted root, as served by the
    /// RFC 6962 `get-roots` endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if a root cannot be DER-encoded.
    pub fn roots_der(&self) -> Result<Vec<Vec<u8>>, der::Error> {
        x509_util::certs_to_bytes(&self.roots().certs)
    }

    /// Reports whether `chain` is a valid path of issuance to a trusted root.
    /// Presentation order is taken literally; the chain is never reordered.
    pub fn validate_chain(&self, chain: &CertificateChain) -> ChainStatus {
        status(chain::walk(&self.roots(), chain.as_slice(), false))
    }

    /// Like [`CertChecker::validate_chain`], but the leaf may be signed by a
    /// Precertificate Signing Certificate that is not a CA.
    pub fn validate_precert_chain(&self, chain: &CertificateChain) -> ChainStatus {
        status(chain::walk(&self.roots(), chain.as_slice(), true))
    }

    /// Verifies `chain` and returns it along with the trust anchor it ends at.
    ///
    /// # Errors
    ///
    /// Returns a [`ChainError`] describing the first failed check.
    pub fn check_cert_chain(&self, chain: CertificateChain) -> Result<VerifiedChain, ChainError> {
        chain::verify(&self.roots(), chain, false)
    }

    /// Verifies a precertificate chain and returns it along with the trust
    /// anchor it ends at.
    ///
    /// # Errors
    ///
    /// Returns a [`ChainError`] describing the first failed check.
    pub fn check_precert_chain(
        &self,
        chain: CertificateChain,
    ) -> Result<VerifiedChain, ChainError> {
        chain::verify(&self.roots(), chain, true)
    }
}

fn status(result: Result<TrustAnchor, ChainError>) -> ChainStatus {
    match result {
        Ok(_) => ChainStatus::Valid,
        Err(e) => e.status(),
    }
}

fn read_pem_file(path: &Path) -> Result<Vec<Certificate>, LoadError> {
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_pem_chain(&bytes).map_err(|source| LoadError::Pem {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use x509_util::build_chain;

    fn testdata(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../ct_submission/tests")
            .join(name)
    }

    fn checker() -> CertChecker {
        let checker = CertChecker::new();
        assert!(checker
            .load_trusted_certificate(testdata("ca-cert.pem"))
            .unwrap());
        checker
    }

    macro_rules! test_validate_chain {
        ($name:ident; $want:expr; $($chain_file:expr),+) => {
            #[test]
            fn $name() {
                let chain = CertificateChain::new(build_chain!($($chain_file),+)).unwrap();
                assert_eq!(checker().validate_chain(&chain), $want);
            }
        };
    }

    test_validate_chain!(leaf_only; ChainStatus::Valid;
        "../../ct_submission/tests/test-cert.pem");
    test_validate_chain!(root_only; ChainStatus::Valid;
        "../../ct_submission/tests/ca-cert.pem");
    test_validate_chain!(leaf_and_intermediate; ChainStatus::Valid;
        "../../ct_submission/tests/test2-cert.pem",
        "../../ct_submission/tests/intermediate-cert.pem");
    test_validate_chain!(leaf_intermediate_and_root; ChainStatus::Valid;
        "../../ct_submission/tests/test2-cert.pem",
        "../../ct_submission/tests/intermediate-cert.pem",
        "../../ct_submission/tests/ca-cert.pem");
    test_validate_chain!(missing_intermediate; ChainStatus::UnknownRoot;
        "../../ct_submission/tests/test2-cert.pem");
    test_validate_chain!(untrusted_root; ChainStatus::UnknownRoot;
        "../../ct_submission/tests/untrusted-leaf-cert.pem",
        "../../ct_submission/tests/untrusted-ca-cert.pem");
    // Neither present in the store nor signed by a store member.
    test_validate_chain!(untrusted_self_signed; ChainStatus::UnknownRoot;
        "../../ct_submission/tests/untrusted-ca-cert.pem");
    test_validate_chain!(root_before_leaf; ChainStatus::InvalidChain;
        "../../ct_submission/tests/ca-cert.pem",
        "../../ct_submission/tests/test-cert.pem");
    test_validate_chain!(intermediate_before_leaf; ChainStatus::InvalidChain;
        "../../ct_submission/tests/intermediate-cert.pem",
        "../../ct_submission/tests/test2-cert.pem");
    test_validate_chain!(swapped_root_and_intermediate; ChainStatus::InvalidChain;
        "../../ct_submission/tests/test2-cert.pem",
        "../../ct_submission/tests/ca-cert.pem",
        "../../ct_submission/tests/intermediate-cert.pem");
    test_validate_chain!(non_ca_intermediate; ChainStatus::InvalidChain;
        "../../ct_submission/tests/test3-cert.pem",
        "../../ct_submission/tests/test-cert.pem");
    test_validate_chain!(precert_signing_cert_is_not_ca; ChainStatus::InvalidChain;
        "../../ct_submission/tests/test-pre-cert.pem",
        "../../ct_submission/tests/ca-pre-cert.pem");

    #[test]
    fn test_validate_precert_chain() {
        let checker = checker();
        let chain = CertificateChain::new(build_chain!(
            "../../ct_submission/tests/test-pre-cert.pem",
            "../../ct_submission/tests/ca-pre-cert.pem"
        ))
        .unwrap();
        assert_eq!(checker.validate_precert_chain(&chain), ChainStatus::Valid);

        let reversed = CertificateChain::new(build_chain!(
            "../../ct_submission/tests/ca-pre-cert.pem",
            "../../ct_submission/tests/test-pre-cert.pem"
        ))
        .unwrap();
        assert_eq!(
            checker.validate_precert_chain(&reversed),
            ChainStatus::InvalidChain
        );
    }

    #[test]
    fn test_swapped_adjacent_elements() {
        let checker = checker();
        let mut certs = build_chain!(
            "../../ct_submission/tests/test2-cert.pem",
            "../../ct_submission/tests/intermediate-cert.pem",
            "../../ct_submission/tests/ca-cert.pem"
        );
        let valid = CertificateChain::new(certs.clone()).unwrap();
        assert_eq!(checker.validate_chain(&valid), ChainStatus::Valid);
        for i in 0..certs.len() - 1 {
            certs.swap(i, i + 1);
            let swapped = CertificateChain::new(certs.clone()).unwrap();
            assert_eq!(checker.validate_chain(&swapped), ChainStatus::InvalidChain);
            certs.swap(i, i + 1);
        }
    }

    #[test]
    fn test_empty_store() {
        let chain =
            CertificateChain::new(build_chain!("../../ct_submission/tests/test-cert.pem")).unwrap();
        assert_eq!(
            CertChecker::new().validate_chain(&chain),
            ChainStatus::UnknownRoot
        );
    }

    #[test]
    fn test_load_trusted_certificate() {
        let checker = checker();
        assert_eq!(checker.num_roots(), 1);

        // Loading the same root again is a no-op.
        assert!(!checker
            .load_trusted_certificate(testdata("ca-cert.pem"))
            .unwrap());
        assert_eq!(checker.num_roots(), 1);

        assert!(matches!(
            checker.load_trusted_certificate(testdata("does-not-exist.pem")),
            Err(LoadError::Io { .. })
        ));
        assert!(matches!(
            checker.load_trusted_certificate(testdata("roots/README")),
            Err(LoadError::Pem { .. })
        ));
        assert!(matches!(
            checker.load_trusted_certificate(testdata("test-roots.pem")),
            Err(LoadError::NotSingleCertificate { found: 2, .. })
        ));
        assert_eq!(checker.num_roots(), 1);
    }

    #[test]
    fn test_load_bundle() {
        let checker = CertChecker::new();
        assert_eq!(
            checker
                .load_trusted_certificates(testdata("test-roots.pem"))
                .unwrap(),
            2
        );
        assert_eq!(checker.roots_der().unwrap().len(), 2);

        let chain = CertificateChain::new(build_chain!(
            "../../ct_submission/tests/untrusted-leaf-cert.pem"
        ))
        .unwrap();
        assert_eq!(checker.validate_chain(&chain), ChainStatus::Valid);
    }

    #[test]
    fn test_load_dir() {
        let checker = CertChecker::new();
        assert_eq!(
            checker
                .load_trusted_certificates_from_dir(testdata("roots"))
                .unwrap(),
            2
        );
        // Overlaps with the directory.
        assert_eq!(
            checker
                .load_trusted_certificates(testdata("test-roots.pem"))
                .unwrap(),
            0
        );
        checker
            .load_trusted_certificates_from_dir(testdata("does-not-exist"))
            .unwrap_err();
    }

    #[test]
    fn test_from_config() {
        let config = AppConfig {
            logging_level: None,
            roots: vec![testdata("roots"), testdata("ca-cert.pem")],
        };
        let checker = CertChecker::from_config(&config).unwrap();
        assert_eq!(checker.num_roots(), 2);

        let config = AppConfig {
            logging_level: None,
            roots: Vec::new(),
        };
        assert!(matches!(
            CertChecker::from_config(&config),
            Err(LoadError::NoRoots)
        ));
    }

    #[test]
    fn test_snapshot_unaffected_by_load() {
        let checker = checker();
        let snapshot = checker.roots();
        checker
            .load_trusted_certificate(testdata("untrusted-ca-cert.pem"))
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(checker.roots().len(), 2);
    }

    #[test]
    fn test_concurrent_validation_and_load() {
        let checker = Arc::new(checker());
        let chain = CertificateChain::new(build_chain!(
            "../../ct_submission/tests/test2-cert.pem",
            "../../ct_submission/tests/intermediate-cert.pem"
        ))
        .unwrap();

        let validators: Vec<_> = (0..4)
            .map(|_| {
                let checker = Arc::clone(&checker);
                let chain = chain.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        assert_eq!(checker.validate_chain(&chain), ChainStatus::Valid);
                    }
                })
            })
            .collect();
        let loader = {
            let checker = Arc::clone(&checker);
            thread::spawn(move || {
                checker
                    .load_trusted_certificates_from_dir(testdata("roots"))
                    .unwrap();
            })
        };

        loader.join().unwrap();
        for v in validators {
            v.join().unwrap();
        }
        assert_eq!(checker.num_roots(), 2);
    }
}
