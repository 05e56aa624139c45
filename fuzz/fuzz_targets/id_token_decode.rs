//! Fuzz target for ID token decoding
//!
//! Decoding runs before any signature check, so it sees attacker-controlled
//! input. It must never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use oidc_webauth::oidc::IdToken;

fuzz_target!(|data: &[u8]| {
    if let Ok(token) = std::str::from_utf8(data) {
        if let Ok(decoded) = IdToken::decode(token) {
            // Accessors on a decoded token are infallible
            let _ = decoded.header().alg.len();
            let _ = decoded.signing_input().len();
            let _ = decoded.signature().len();
            if let Some(aud) = &decoded.claims().aud {
                let _ = aud.joined();
            }
        }
    }
});
