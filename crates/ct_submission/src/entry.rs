// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Canonical log entries produced by accepted submissions, and their
//! [RFC 6962](https://datatracker.ietf.org/doc/html/rfc6962#section-3.4) encodings.

use byteorder::{BigEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use sha2::{Digest, Sha256};
use std::{
    fmt,
    io::{self, Write},
};

/// Largest value representable by the 24-bit length prefixes of RFC 6962.
const MAX_U24: usize = (1 << 24) - 1;

/// The kind of submission, with its RFC 6962 `LogEntryType` wire value.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum LogEntryType {
    X509Entry = 0,
    PrecertEntry = 1,
}

impl From<LogEntryType> for u16 {
    fn from(value: LogEntryType) -> Self {
        value as u16
    }
}

impl fmt::Display for LogEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEntryType::X509Entry => write!(f, "x509_entry"),
            LogEntryType::PrecertEntry => write!(f, "precert_entry"),
        }
    }
}

/// An RFC 6962 `X509ChainEntry`.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct X509ChainEntry {
    /// DER encoding of the submitted leaf certificate.
    #[serde_as(as = "Base64")]
    pub leaf_certificate: Vec<u8>,

    /// DER encodings of the certificates between the leaf and the trust
    /// anchor, both excluded.
    #[serde_as(as = "Vec<Base64>")]
    pub certificate_chain: Vec<Vec<u8>>,
}

/// An RFC 6962 `PrecertChainEntry`, along with the `PreCert` fields that
/// the log signs.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PrecertChainEntry {
    /// The precertificate's `TBSCertificate` with the poison extension
    /// removed and, for precertificates issued by a Precertificate Signing
    /// Certificate, the issuer information of the real CA.
    #[serde_as(as = "Base64")]
    pub tbs_certificate: Vec<u8>,

    /// SHA-256 of the `SubjectPublicKeyInfo` of the CA that will issue the
    /// final certificate.
    #[serde_as(as = "Base64")]
    pub issuer_key_hash: [u8; 32],

    /// DER encodings of the submitted precertificate followed by every
    /// presented certificate up to, but excluding, the trust anchor.
    #[serde_as(as = "Vec<Base64>")]
    pub precertificate_chain: Vec<Vec<u8>>,
}

/// An accepted submission. Exactly one kind of entry exists per value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum LogEntry {
    #[serde(rename = "x509_entry")]
    X509(X509ChainEntry),
    #[serde(rename = "precert_entry")]
    Precert(PrecertChainEntry),
}

impl LogEntry {
    pub fn entry_type(&self) -> LogEntryType {
        match self {
            LogEntry::X509(_) => LogEntryType::X509Entry,
            LogEntry::Precert(_) => LogEntryType::PrecertEntry,
        }
    }

    pub fn is_precert(&self) -> bool {
        matches!(self, LogEntry::Precert(_))
    }

    /// The chain stored alongside the entry.
    pub fn chain(&self) -> &[Vec<u8>] {
        match self {
            LogEntry::X509(entry) => &entry.certificate_chain,
            LogEntry::Precert(entry) => &entry.precertificate_chain,
        }
    }

    /// Returns the body of an RFC 6962 `TimestampedEntry` without its
    /// timestamp and extensions:
    ///
    /// ```text
    /// LogEntryType entry_type;
    /// select(entry_type) {
    ///     case x509_entry: ASN.1Cert;
    ///     case precert_entry: PreCert;
    /// } signed_entry;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if a certificate does not fit its 24-bit length
    /// prefix.
    pub fn signed_entry(&self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer.write_u16::<BigEndian>(self.entry_type().into())?;
        match self {
            LogEntry::X509(entry) => {
                write_u24_prefixed(&mut buffer, &entry.leaf_certificate)?;
            }
            LogEntry::Precert(entry) => {
                buffer.write_all(&entry.issuer_key_hash)?;
                write_u24_prefixed(&mut buffer, &entry.tbs_certificate)?;
            }
        }
        Ok(buffer)
    }

    /// Returns the chain as an RFC 6962 `ASN.1Cert certificate_chain<0..2^24-1>`,
    /// as stored in a log entry's `extra_data`.
    ///
    /// # Errors
    ///
    /// Returns an error if a certificate or the whole chain does not fit its
    /// 24-bit length prefix.
    pub fn chain_bytes(&self) -> io::Result<Vec<u8>> {
        let mut chain = Vec::new();
        for cert in self.chain() {
            write_u24_prefixed(&mut chain, cert)?;
        }
        let mut buffer = Vec::with_capacity(chain.len() + 3);
        write_u24_prefixed(&mut buffer, &chain)?;
        Ok(buffer)
    }

    /// The SHA-256 hashes of the certificates of [`LogEntry::chain`].
    pub fn chain_fingerprints(&self) -> Vec<[u8; 32]> {
        self.chain()
            .iter()
            .map(|cert| Sha256::digest(cert).into())
            .collect()
    }
}

fn write_u24_prefixed<W: Write>(w: &mut W, data: &[u8]) -> io::Result<()> {
    if data.len() > MAX_U24 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} bytes do not fit a 24-bit length prefix", data.len()),
        ));
    }
    w.write_u24::<BigEndian>(data.len() as u32)?;
    w.write_all(data)
}
