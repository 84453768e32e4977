// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Utilities for X.509 operations shared by the chain verifier and the
//! submission handler.

pub mod pem;
pub mod precert;

pub use pem::{parse_pem_chain, PemChainError};
pub use precert::{is_pre_issuer, is_precert, CTPrecertPoison};

use der::{Encode, Error as DerError};
use sha2::{Digest, Sha256};
use std::collections::{hash_map::Entry, HashMap};
use x509_cert::{
    ext::pkix::{AuthorityKeyIdentifier, BasicConstraints, SubjectKeyIdentifier},
    Certificate,
};
use x509_verify::VerifyingKey;

/// Converts a slice of certificates into a vector of DER-encoded certificates.
///
/// # Errors
///
/// Returns an error if any of the certificates cannot be DER-encoded.
pub fn certs_to_bytes(certs: &[Certificate]) -> Result<Vec<Vec<u8>>, DerError> {
    certs
        .iter()
        .map(der::Encode::to_der)
        .collect::<Result<_, _>>()
}

/// Returns the SHA-256 fingerprint of a certificate's DER encoding.
///
/// # Errors
///
/// Returns an error if the certificate cannot be DER-encoded.
pub fn fingerprint(cert: &Certificate) -> Result<[u8; 32], DerError> {
    Ok(Sha256::digest(cert.to_der()?).into())
}

/// Deduplicated set of certificates, indexed for issuer lookups.
#[derive(Default, Clone)]
pub struct CertPool {
    // SHA-256 of the DER encoding -> index in `certs`.
    by_fingerprint: HashMap<[u8; 32], usize>,
    // Subject name -> indexes in `certs`.
    by_name: HashMap<String, Vec<usize>>,
    // Raw subject key identifier -> indexes in `certs`.
    by_subject_key_id: HashMap<Vec<u8>, Vec<usize>>,
    // Insertion order.
    pub certs: Vec<Certificate>,
}

impl CertPool {
    /// Constructs a `CertPool` from the given certificates, weeding out
    /// duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error if there are issues DER-encoding certificate
    /// extensions.
    pub fn new(certs: Vec<Certificate>) -> Result<Self, DerError> {
        let mut pool = Self::default();
        for cert in certs {
            pool.add_cert(cert)?;
        }
        Ok(pool)
    }

    /// Number of distinct certificates in the pool.
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Returns the indexes of pool certificates that may have issued `cert`:
    /// those whose subject key identifier matches its authority key
    /// identifier or, failing that, whose subject matches its issuer. The
    /// signature is not checked.
    ///
    /// # Errors
    ///
    /// Returns an error if there are issues DER-encoding certificate extensions.
    pub fn find_potential_parents(&self, cert: &Certificate) -> Result<&[usize], DerError> {
        if let Some((_, aki)) = cert.tbs_certificate.get::<AuthorityKeyIdentifier>()? {
            if let Some(key_id) = aki.key_identifier {
                if let Some(indexes) = self.by_subject_key_id.get(key_id.as_bytes()) {
                    return Ok(indexes);
                }
            }
        }
        if let Some(indexes) = self.by_name.get(&cert.tbs_certificate.issuer.to_string()) {
            return Ok(indexes);
        }
        Ok(&[])
    }

    /// Add a certificate to the certificate pool if it is not already
    /// included. Returns whether the certificate was added.
    ///
    /// # Errors
    ///
    /// Returns an error if there are issues DER-encoding the certificate or
    /// parsing its extensions.
    pub fn add_cert(&mut self, cert: Certificate) -> Result<bool, DerError> {
        let fingerprint = fingerprint(&cert)?;
        let Entry::Vacant(e) = self.by_fingerprint.entry(fingerprint) else {
            return Ok(false);
        };
        let idx = self.certs.len();
        e.insert(idx);
        self.by_name
            .entry(cert.tbs_certificate.subject.to_string())
            .or_default()
            .push(idx);
        if let Some((_, ski)) = cert.tbs_certificate.get::<SubjectKeyIdentifier>()? {
            self.by_subject_key_id
                .entry(ski.0.as_bytes().to_vec())
                .or_default()
                .push(idx);
        }
        self.certs.push(cert);

        Ok(true)
    }

    /// Add certs to the pool from a byte slice assumed to contain PEM encoded
    /// certificates, returning how many of them were new.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a well-formed PEM certificate
    /// chain.
    pub fn append_certs_from_pem(&mut self, input: &[u8]) -> Result<usize, PemChainError> {
        let mut added = 0;
        for cert in parse_pem_chain(input)? {
            if self.add_cert(cert)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Check if the pool includes a certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if there are issues DER-encoding the certificate.
    pub fn includes(&self, cert: &Certificate) -> Result<bool, DerError> {
        Ok(self.by_fingerprint.contains_key(&fingerprint(cert)?))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error(transparent)]
    Der(#[from] der::Error),
    #[error("missing or invalid basic constraints")]
    InvalidBasicConstraints,
    #[error("mismatching signature algorithm identifier")]
    MismatchingSigAlg,
    #[error("CT poison extension is not critical or invalid")]
    InvalidCtPoison,
}

/// Verify that a cert is well-formed according to RFC 5280.
///
/// # Errors
///
/// Returns [`ValidationError::MismatchingSigAlg`] if the outer signature
/// algorithm differs from the one inside the `TBSCertificate`.
pub fn check_well_formedness(cert: &Certificate) -> Result<(), ValidationError> {
    // Reject mismatched signature algorithms: https://github.com/google/certificate-transparency-go/pull/702.
    if cert.signature_algorithm != cert.tbs_certificate.signature {
        return Err(ValidationError::MismatchingSigAlg);
    }
    Ok(())
}

/// Returns whether `issuer`'s public key verifies the signature on `child`.
/// An issuer key of an unsupported algorithm never verifies.
pub fn is_link_valid(child: &Certificate, issuer: &Certificate) -> bool {
    VerifyingKey::try_from(issuer).is_ok_and(|key| key.verify_strict(child).is_ok())
}

/// Checks that `ca_cert` may issue certificates at its position in a chain,
/// with `num_intermediates` intermediates between it and the leaf.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidBasicConstraints`] if the extension is
/// missing, `cA` is false, or the path length constraint is exceeded.
pub fn check_ca_basic_constraints(
    ca_cert: &Certificate,
    num_intermediates: usize,
) -> Result<(), ValidationError> {
    // The path length constraint does not count the end-entity certificate.
    let is_valid_ca = ca_cert
        .tbs_certificate
        .get::<BasicConstraints>()?
        .is_some_and(|(_, bc)| {
            bc.ca
                && bc
                    .path_len_constraint
                    .is_none_or(|max| num_intermediates <= usize::from(max))
        });
    if !is_valid_ca {
        return Err(ValidationError::InvalidBasicConstraints);
    }
    Ok(())
}

/// Builds a certificate chain from the given PEM files, relative to the
/// calling source file.
#[macro_export]
macro_rules! build_chain {
    ($($file:expr),+) => {{
        let mut chain = Vec::new();
        $(
            chain.append(
                &mut $crate::parse_pem_chain(include_bytes!($file)).expect("failed to parse PEM file"),
            );
        )*
        chain
    }};
}
