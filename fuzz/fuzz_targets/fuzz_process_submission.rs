// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

#![no_main]

use cert_checker::CertChecker;
use ct_submission::{CertSubmissionHandler, LogEntryType};
use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, LazyLock};
use x509_util::parse_pem_chain;

static HANDLER: LazyLock<CertSubmissionHandler> = LazyLock::new(|| {
    let roots = parse_pem_chain(include_bytes!("../../crates/ct_submission/tests/test-roots.pem"))
        .expect("failed to parse roots");
    let checker = CertChecker::with_roots(roots).expect("failed to build trust store");
    CertSubmissionHandler::new(Arc::new(checker))
});

// The first byte selects the entry type, the rest is the submission.
fuzz_target!(|data: &[u8]| {
    let Some((&selector, submission)) = data.split_first() else {
        return;
    };
    let entry_type = if selector & 1 == 0 {
        LogEntryType::X509Entry
    } else {
        LogEntryType::PrecertEntry
    };
    if let Ok(entry) = HANDLER.process_submission(submission, entry_type) {
        assert_eq!(entry.entry_type(), entry_type);
        let _ = entry.signed_entry();
        let _ = entry.chain_bytes();
    }
});
