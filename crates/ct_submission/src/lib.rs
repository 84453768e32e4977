// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Intake of certificate and precertificate submissions for a Certificate
//! Transparency log.
//!
//! A [`CertSubmissionHandler`] turns a submitted PEM chain into a canonical
//! [`LogEntry`], after checking that the declared entry type matches the leaf
//! and that the chain leads to a trusted root of the shared
//! [`cert_checker::CertChecker`].

mod entry;
mod handler;
mod precert;

pub use entry::{LogEntry, LogEntryType, PrecertChainEntry, X509ChainEntry};
pub use handler::CertSubmissionHandler;
pub use precert::build_precert_tbs;

use cert_checker::ChainError;
use x509_util::{PemChainError, ValidationError};

#[derive(thiserror::Error, Debug)]
pub enum SubmissionError {
    #[error("empty submission")]
    EmptySubmission,
    #[error("invalid PEM encoded chain: {0}")]
    InvalidPemEncodedChain(#[source] PemChainError),
    #[error("certificate {index} is malformed: {source}")]
    MalformedCertificate {
        index: usize,
        #[source]
        source: der::Error,
    },
    #[error("unknown root: issuer not in root store: {issuer}")]
    UnknownRoot { issuer: String },
    #[error("invalid certificate chain: {0}")]
    InvalidCertificateChain(#[source] ChainError),
    #[error(
        "{}certificate submitted to add-{}chain", if *.is_precert { "pre-" } else { "final " }, if *.is_precert { "" } else { "pre-" }
    )]
    EntryTypeMismatch { is_precert: bool },
    #[error("CT poison extension is not critical or invalid")]
    InvalidCtPoison,
    #[error("missing precertificate signing certificate issuer")]
    MissingPrecertSigningCertificateIssuer,
    #[error(transparent)]
    Der(#[from] der::Error),
}

impl From<ChainError> for SubmissionError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::NoPathToTrustedRoot { to_verify_issuer } => SubmissionError::UnknownRoot {
                issuer: to_verify_issuer,
            },
            e => SubmissionError::InvalidCertificateChain(e),
        }
    }
}

impl From<ValidationError> for SubmissionError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::InvalidCtPoison => SubmissionError::InvalidCtPoison,
            ValidationError::Der(e) => SubmissionError::Der(e),
            source => SubmissionError::InvalidCertificateChain(ChainError::Malformed {
                index: 0,
                source,
            }),
        }
    }
}
