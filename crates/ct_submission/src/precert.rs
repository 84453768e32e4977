// Ported from "certificate-transparency-go" (https://github.com/google/certificate-transparency-go)
// Copyright 2016 Google LLC. All Rights Reserved.
// Licensed under Apache-2.0 License found in the LICENSE file or at https://www.apache.org/licenses/LICENSE-2.0
//
// Modifications and Rust implementation Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

use crate::SubmissionError;
use der::{
    asn1::OctetString,
    oid::db::{rfc5280::ID_CE_AUTHORITY_KEY_IDENTIFIER, rfc6962::CT_PRECERT_POISON},
    Encode,
};
use x509_cert::{
    ext::{pkix::AuthorityKeyIdentifier, Extension},
    TbsCertificate,
};

/// Builds the DER-encoded `TBSCertificate` that a CT log signs for a
/// precertificate ([RFC 6962 s3.2](https://datatracker.ietf.org/doc/html/rfc6962#section-3.2)).
///
/// The precertificate poison extension is removed; all other extensions keep
/// their order. If the precertificate was issued by a Precertificate Signing
/// Certificate (`pre_issuer`), the issuer information is updated to reflect
/// the real CA above it:
///   - the `Issuer` is replaced by the `Issuer` of the signing certificate,
///   - the `AuthorityKeyIdentifier` is replaced by the one of the signing
///     certificate, or removed if it has none.
///
/// # Errors
///
/// Returns [`SubmissionError::InvalidCtPoison`] if `tbs` has no poison
/// extension, or an error if an extension cannot be decoded or re-encoded.
pub fn build_precert_tbs(
    tbs: &TbsCertificate,
    pre_issuer: Option<&TbsCertificate>,
) -> Result<Vec<u8>, SubmissionError> {
    let mut tbs = tbs.clone();

    let exts = tbs
        .extensions
        .as_mut()
        .ok_or(SubmissionError::InvalidCtPoison)?;
    let poison_idx = exts
        .iter()
        .position(|ext| ext.extn_id == CT_PRECERT_POISON)
        .ok_or(SubmissionError::InvalidCtPoison)?;
    exts.remove(poison_idx);

    if let Some(pre_issuer) = pre_issuer {
        tbs.issuer = pre_issuer.issuer.clone();

        let pre_issuer_aki = match pre_issuer.get::<AuthorityKeyIdentifier>()? {
            Some((_, aki)) => Some(OctetString::new(aki.to_der()?)?),
            None => None,
        };
        let aki_idx = exts
            .iter()
            .position(|ext| ext.extn_id == ID_CE_AUTHORITY_KEY_IDENTIFIER);

        match (aki_idx, pre_issuer_aki) {
            (Some(idx), Some(aki)) => exts[idx].extn_value = aki,
            (Some(idx), None) => {
                exts.remove(idx);
            }
            // The precertificate has no AKI but the signing certificate does,
            // so append it.
            (None, Some(aki)) => exts.push(Extension {
                extn_id: ID_CE_AUTHORITY_KEY_IDENTIFIER,
                critical: false,
                extn_value: aki,
            }),
            (None, None) => {}
        }
    }

    Ok(tbs.to_der()?)
}
