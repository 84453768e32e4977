// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Certificate chains and the issuance walk over them.

use thiserror::Error;
use x509_cert::Certificate;
use x509_util::{
    check_ca_basic_constraints, check_well_formedness, is_link_valid, is_pre_issuer,
    parse_pem_chain, CertPool, PemChainError, ValidationError,
};

/// An ordered, non-empty sequence of certificates. Element 0 is the leaf and
/// every following element claims to be the issuer of the one before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateChain(Vec<Certificate>);

#[allow(clippy::len_without_is_empty)]
impl CertificateChain {
    /// Wraps the certificates in presentation order.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::EmptyChain`] if `certs` is empty.
    pub fn new(certs: Vec<Certificate>) -> Result<Self, ChainError> {
        if certs.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        Ok(Self(certs))
    }

    /// Parses concatenated PEM `CERTIFICATE` blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed or holds no certificate.
    pub fn from_pem(input: &[u8]) -> Result<Self, PemChainError> {
        parse_pem_chain(input).map(Self)
    }

    pub fn leaf(&self) -> &Certificate {
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, index: usize) -> Option<&Certificate> {
        self.0.get(index)
    }

    pub fn as_slice(&self) -> &[Certificate] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Certificate> {
        self.0
    }
}

/// Outcome of validating a chain against the trust store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainStatus {
    /// Every link verifies and the chain ends at a trust anchor.
    Valid,
    /// Every link verifies but the chain does not reach a trust anchor.
    UnknownRoot,
    /// Some link does not verify.
    InvalidChain,
}

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("empty chain")]
    EmptyChain,
    #[error("certificate {index} is malformed: {source}")]
    Malformed {
        index: usize,
        #[source]
        source: ValidationError,
    },
    #[error("certificate {} does not sign certificate {index}", index + 1)]
    InvalidLinkInChain { index: usize },
    #[error("certificate {index} cannot act as an issuer: {source}")]
    InvalidIssuer {
        index: usize,
        #[source]
        source: ValidationError,
    },
    #[error("issuer not in root store: {to_verify_issuer}")]
    NoPathToTrustedRoot { to_verify_issuer: String },
    #[error(transparent)]
    Der(#[from] der::Error),
}

impl ChainError {
    /// Collapses the error into the status reported by
    /// [`crate::CertChecker::validate_chain`].
    pub fn status(&self) -> ChainStatus {
        match self {
            Self::NoPathToTrustedRoot { .. } => ChainStatus::UnknownRoot,
            _ => ChainStatus::InvalidChain,
        }
    }
}

/// Where the verified chain meets the trust store.
#[derive(Clone, Debug)]
pub enum TrustAnchor {
    /// The last presented certificate is itself a trust anchor.
    Presented,
    /// The last presented certificate is signed by this trust anchor, which
    /// was not part of the presented chain.
    Store(Certificate),
}

/// A chain whose issuance walk succeeded, together with the trust anchor it
/// ends at.
#[derive(Clone, Debug)]
pub struct VerifiedChain {
    chain: CertificateChain,
    anchor: TrustAnchor,
}

impl VerifiedChain {
    pub fn chain(&self) -> &CertificateChain {
        &self.chain
    }

    pub fn leaf(&self) -> &Certificate {
        self.chain.leaf()
    }

    pub fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    /// The presented certificates that establish trust, without a presented
    /// trust anchor. The leaf is always included, even when it is the anchor.
    pub fn without_anchor(&self) -> &[Certificate] {
        let certs = self.chain.as_slice();
        match self.anchor {
            TrustAnchor::Presented if certs.len() > 1 => &certs[..certs.len() - 1],
            _ => certs,
        }
    }

    /// Returns the certificate that issued the chain element at `index`,
    /// which is the next presented certificate or, for the last one, the
    /// trust anchor from the store. Returns `None` past the end of the chain
    /// or when the element is itself the anchor.
    pub fn issuer_of(&self, index: usize) -> Option<&Certificate> {
        if let Some(issuer) = self.chain.get(index + 1) {
            return Some(issuer);
        }
        match &self.anchor {
            TrustAnchor::Store(root) if index + 1 == self.chain.len() => Some(root),
            _ => None,
        }
    }

    pub fn into_chain(self) -> CertificateChain {
        self.chain
    }
}

/// Walks `chain` from the leaf to the last element, checking that each
/// certificate is signed by the next one and that every issuer is a CA, and
/// then that the last certificate is or is signed by a member of `roots`.
///
/// If `allow_pre_issuer` is set, the certificate directly above the leaf may
/// be a Precertificate Signing Certificate without the CA basic constraint.
pub(crate) fn verify(
    roots: &CertPool,
    chain: CertificateChain,
    allow_pre_issuer: bool,
) -> Result<VerifiedChain, ChainError> {
    let anchor = walk(roots, chain.as_slice(), allow_pre_issuer)?;
    Ok(VerifiedChain { chain, anchor })
}

pub(crate) fn walk(
    roots: &CertPool,
    certs: &[Certificate],
    allow_pre_issuer: bool,
) -> Result<TrustAnchor, ChainError> {
    let (leaf, issuers) = certs.split_first().ok_or(ChainError::EmptyChain)?;
    check_well_formedness(leaf).map_err(|source| ChainError::Malformed { index: 0, source })?;

    // Precertificate Signing Certificates do not count towards path length
    // constraints.
    let mut delegates = 0;
    let mut to_verify = leaf;
    for (i, issuer) in issuers.iter().enumerate() {
        let index = i + 1;
        check_well_formedness(issuer).map_err(|source| ChainError::Malformed { index, source })?;

        if !is_link_valid(to_verify, issuer) {
            return Err(ChainError::InvalidLinkInChain { index: i });
        }

        // A Precertificate Signing Certificate is a delegate of the real CA
        // and is not required to be a CA itself.
        let delegate = allow_pre_issuer
            && index == 1
            && is_pre_issuer(issuer).map_err(|source| ChainError::Malformed { index, source })?;
        if delegate {
            delegates += 1;
        } else {
            check_ca_basic_constraints(issuer, i - delegates)
                .map_err(|source| ChainError::InvalidIssuer { index, source })?;
        }

        to_verify = issuer;
    }

    // The last certificate in the chain is either a trusted root or a
    // certificate that is signed by one.
    if roots.includes(to_verify)? {
        return Ok(TrustAnchor::Presented);
    }
    if let Some(&idx) = roots.find_potential_parents(to_verify)?.iter().find(|&&idx| {
        let root = &roots.certs[idx];
        is_link_valid(to_verify, root)
            && check_ca_basic_constraints(root, issuers.len() - delegates).is_ok()
    }) {
        return Ok(TrustAnchor::Store(roots.certs[idx].clone()));
    }

    Err(ChainError::NoPathToTrustedRoot {
        to_verify_issuer: to_verify.tbs_certificate.issuer.to_string(),
    })
}
