//! Fuzz target for passkey login challenge decoding

#![no_main]

use libfuzzer_sys::fuzz_target;
use oidc_webauth::PasskeyLoginChallenge;

fuzz_target!(|data: &[u8]| {
    let _ = PasskeyLoginChallenge::from_json(data);
});
