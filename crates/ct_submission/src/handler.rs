// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

use crate::{
    build_precert_tbs, LogEntry, LogEntryType, PrecertChainEntry, SubmissionError,
    X509ChainEntry,
};
use cert_checker::{CertChecker, CertificateChain, VerifiedChain};
use der::{Decode, Encode};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use x509_cert::{Certificate, TbsCertificate};
use x509_util::{certs_to_bytes, is_pre_issuer, is_precert, parse_pem_chain};

/// Validates submissions against a shared [`CertChecker`] and normalizes
/// accepted ones into [`LogEntry`] values.
///
/// Processing has no side effects: the trust store is only read, and a
/// rejected submission leaves nothing behind.
#[derive(Clone)]
pub struct CertSubmissionHandler {
    checker: Arc<CertChecker>,
}

impl CertSubmissionHandler {
    pub fn new(checker: Arc<CertChecker>) -> Self {
        Self { checker }
    }

    pub fn checker(&self) -> &Arc<CertChecker> {
        &self.checker
    }

    /// Processes a submission made of concatenated PEM `CERTIFICATE` blocks,
    /// leaf first.
    ///
    /// # Errors
    ///
    /// Returns a [`SubmissionError`] if the input cannot be decoded, the
    /// declared entry type does not match the leaf, or the chain does not
    /// lead to a trusted root.
    pub fn process_submission(
        &self,
        submission: &[u8],
        entry_type: LogEntryType,
    ) -> Result<LogEntry, SubmissionError> {
        if submission.is_empty() {
            return Err(SubmissionError::EmptySubmission);
        }
        let certs =
            parse_pem_chain(submission).map_err(SubmissionError::InvalidPemEncodedChain)?;
        self.process_chain(certs, entry_type)
    }

    /// Processes a submission given as a list of DER certificates, as in the
    /// body of an RFC 6962 `add-chain` or `add-pre-chain` request.
    ///
    /// # Errors
    ///
    /// Same as [`CertSubmissionHandler::process_submission`], plus
    /// [`SubmissionError::MalformedCertificate`] for an element that is not a
    /// DER-encoded certificate.
    pub fn process_der_chain(
        &self,
        chain: &[Vec<u8>],
        entry_type: LogEntryType,
    ) -> Result<LogEntry, SubmissionError> {
        let certs = chain
            .iter()
            .enumerate()
            .map(|(index, der)| {
                Certificate::from_der(der)
                    .map_err(|source| SubmissionError::MalformedCertificate { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.process_chain(certs, entry_type)
    }

    /// Processes an already-parsed chain, leaf first.
    ///
    /// # Errors
    ///
    /// Same as [`CertSubmissionHandler::process_submission`].
    pub fn process_chain(
        &self,
        certs: Vec<Certificate>,
        entry_type: LogEntryType,
    ) -> Result<LogEntry, SubmissionError> {
        let chain =
            CertificateChain::new(certs).map_err(|_| SubmissionError::EmptySubmission)?;
        match entry_type {
            LogEntryType::X509Entry => self.x509_entry(chain),
            LogEntryType::PrecertEntry => self.precert_entry(chain),
        }
    }

    fn x509_entry(&self, chain: CertificateChain) -> Result<LogEntry, SubmissionError> {
        if is_precert(chain.leaf())? {
            return Err(SubmissionError::EntryTypeMismatch { is_precert: true });
        }
        let verified = self.checker.check_cert_chain(chain)?;

        Ok(LogEntry::X509(X509ChainEntry {
            leaf_certificate: verified.leaf().to_der()?,
            certificate_chain: certs_to_bytes(&verified.without_anchor()[1..])?,
        }))
    }

    fn precert_entry(&self, chain: CertificateChain) -> Result<LogEntry, SubmissionError> {
        if !is_precert(chain.leaf())? {
            return Err(SubmissionError::EntryTypeMismatch { is_precert: false });
        }

        // Poison and signer problems take precedence over chain errors.
        let pre_issuer = match chain.get(1) {
            Some(signer) if is_pre_issuer(signer)? => Some(&signer.tbs_certificate),
            _ => None,
        };
        let tbs_certificate = build_precert_tbs(&chain.leaf().tbs_certificate, pre_issuer)?;
        let has_pre_issuer = pre_issuer.is_some();

        let verified = self.checker.check_precert_chain(chain)?;
        let issuer = real_issuer(&verified, has_pre_issuer)?;

        Ok(LogEntry::Precert(PrecertChainEntry {
            tbs_certificate,
            issuer_key_hash: issuer_key_hash(&issuer.tbs_certificate)?,
            precertificate_chain: certs_to_bytes(verified.without_anchor())?,
        }))
    }
}

// Returns the CA that will issue the final certificate: the issuer of the
// precertificate, or the issuer of its Precertificate Signing Certificate.
fn real_issuer(
    verified: &VerifiedChain,
    has_pre_issuer: bool,
) -> Result<&Certificate, SubmissionError> {
    let index = usize::from(has_pre_issuer);
    verified
        .issuer_of(index)
        .ok_or(SubmissionError::MissingPrecertSigningCertificateIssuer)
}

fn issuer_key_hash(issuer: &TbsCertificate) -> Result<[u8; 32], SubmissionError> {
    Ok(Sha256::digest(issuer.subject_public_key_info.to_der()?).into())
}
