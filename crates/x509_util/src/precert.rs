// Ported from "certificate-transparency-go" (https://github.com/google/certificate-transparency-go)
// Copyright 2016 Google LLC. All Rights Reserved.
// Licensed under Apache-2.0 License found in the LICENSE file or at https://www.apache.org/licenses/LICENSE-2.0
//
// Modifications and Rust implementation Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Markers distinguishing precertificates and Precertificate Signing
//! Certificates ([RFC 6962 s3.1](https://datatracker.ietf.org/doc/html/rfc6962#section-3.1)).

use crate::ValidationError;
use der::{
    asn1::Null,
    oid::{
        db::rfc6962::{CT_PRECERT_POISON, CT_PRECERT_SIGNING_CERT},
        AssociatedOid, ObjectIdentifier,
    },
};
use x509_cert::{ext::pkix::ExtendedKeyUsage, impl_newtype, Certificate};

/// Precertificate poison extension that can be decoded with
/// [`x509_cert::TbsCertificate::get`].
#[derive(Debug)]
pub struct CTPrecertPoison(pub Null);

impl AssociatedOid for CTPrecertPoison {
    const OID: ObjectIdentifier = CT_PRECERT_POISON;
}
impl_newtype!(CTPrecertPoison, Null);

/// Returns whether or not the certificate contains the precertificate poison
/// extension.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidCtPoison`] if the poison extension is
/// present but not critical or its value is not ASN.1 NULL.
pub fn is_precert(cert: &Certificate) -> Result<bool, ValidationError> {
    // Decoding only touches the poison extension, so an error here means it
    // is duplicated or does not hold a NULL.
    match cert.tbs_certificate.get::<CTPrecertPoison>() {
        Ok(Some((true, _))) => Ok(true),
        Ok(Some((false, _))) | Err(_) => Err(ValidationError::InvalidCtPoison),
        Ok(None) => Ok(false),
    }
}

/// Returns whether or not the certificate carries the Certificate
/// Transparency extended key usage, marking it as a Precertificate Signing
/// Certificate.
///
/// # Errors
///
/// Returns an error if the extended key usage extension cannot be decoded.
pub fn is_pre_issuer(cert: &Certificate) -> Result<bool, ValidationError> {
    Ok(cert
        .tbs_certificate
        .get::<ExtendedKeyUsage>()?
        .is_some_and(|(_, eku)| eku.0.contains(&CT_PRECERT_SIGNING_CERT)))
}
