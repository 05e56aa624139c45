//! Fuzz target for `WWW-Authenticate: DPoP` header parsing

#![no_main]

use libfuzzer_sys::fuzz_target;
use oidc_dpop::DPoPChallenge;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = std::str::from_utf8(data) {
        if let Some(challenge) = DPoPChallenge::from_www_authenticate(header) {
            let _ = challenge.is_nonce_required();
        }
    }
});
