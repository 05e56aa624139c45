//! Authorization code + PKCE login flow.

use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use parking_lot::Mutex;
use subtle::ConstantTimeEq;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

use super::{is_callback_for, AuthTransaction, WebAuthError};
use crate::pkce::Pkce;

/// Outcome of a login flow
pub type LoginResult = Result<AuthorizationGrant, WebAuthError>;

/// What the token-exchange layer needs after a successful redirect
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
    /// Nonce to expect in the ID token
    pub nonce: Option<String>,
}

impl std::fmt::Debug for AuthorizationGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGrant")
            .field("redirect_uri", &self.redirect_uri)
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

/// A login waiting for its redirect.
///
/// The outcome arrives on the receiver returned at construction, exactly
/// once: a grant, an authorization error, an invalid callback or
/// `UserCancelled`.
pub struct LoginTransaction {
    redirect_url: Url,
    state: Option<String>,
    nonce: Option<String>,
    pkce: Pkce,
    completion: Mutex<Option<oneshot::Sender<LoginResult>>>,
}

impl LoginTransaction {
    /// Login with a fresh PKCE verifier, state and nonce
    pub fn start(redirect_url: Url) -> (Self, oneshot::Receiver<LoginResult>) {
        let (transaction, receiver) = Self::new(redirect_url, Pkce::new());
        let transaction = transaction
            .with_state(random_value())
            .with_nonce(random_value());
        (transaction, receiver)
    }

    /// Login with a caller-chosen verifier and no state or nonce
    pub fn new(redirect_url: Url, pkce: Pkce) -> (Self, oneshot::Receiver<LoginResult>) {
        let (sender, receiver) = oneshot::channel();
        let transaction = Self {
            redirect_url,
            state: None,
            nonce: None,
            pkce,
            completion: Mutex::new(Some(sender)),
        };
        (transaction, receiver)
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }

    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    pub fn pkce(&self) -> &Pkce {
        &self.pkce
    }

    /// Query parameters this flow adds to the authorize request
    pub fn authorize_parameters(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("response_type", "code".to_string()),
            ("redirect_uri", self.redirect_url.to_string()),
            ("code_challenge", self.pkce.challenge().to_string()),
            ("code_challenge_method", self.pkce.method().to_string()),
        ];
        if let Some(state) = &self.state {
            params.push(("state", state.clone()));
        }
        if let Some(nonce) = &self.nonce {
            params.push(("nonce", nonce.clone()));
        }
        params
    }

    fn finish(&self, result: LoginResult) {
        if let Some(sender) = self.completion.lock().take() {
            if sender.send(result).is_err() {
                debug!("Login result dropped, nobody is waiting");
            }
        }
    }

    fn state_matches(&self, params: &HashMap<String, String>) -> bool {
        match &self.state {
            None => true,
            Some(expected) => params
                .get("state")
                .map_or(false, |s| bool::from(s.as_bytes().ct_eq(expected.as_bytes()))),
        }
    }
}

impl AuthTransaction for LoginTransaction {
    fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    fn resume(&self, url: &Url) -> bool {
        if !is_callback_for(url, &self.redirect_url) {
            debug!("Ignoring URL that is not this login's callback");
            return false;
        }

        let params = callback_parameters(url);

        if !self.state_matches(&params) {
            warn!("Login callback state does not match");
            self.finish(Err(WebAuthError::InvalidCallback(
                "state mismatch".to_string(),
            )));
            return false;
        }

        if let Some(error) = params.get("error") {
            warn!(error = %error, "Authorization server returned an error");
            self.finish(Err(WebAuthError::Authorization {
                error: error.clone(),
                description: params.get("error_description").cloned(),
            }));
            return true;
        }

        // State matched, so the callback is consumed either way
        let Some(code) = params.get("code") else {
            warn!("Login callback carries no authorization code");
            self.finish(Err(WebAuthError::InvalidCallback(
                "missing authorization code".to_string(),
            )));
            return true;
        };

        debug!("Login callback accepted");
        self.finish(Ok(AuthorizationGrant {
            code: code.clone(),
            code_verifier: self.pkce.verifier().to_string(),
            redirect_uri: self.redirect_url.to_string(),
            nonce: self.nonce.clone(),
        }));
        true
    }

    fn cancel(&self) {
        self.finish(Err(WebAuthError::UserCancelled));
    }
}

/// Query and fragment parameters of a callback URL; fragment wins on overlap
fn callback_parameters(url: &Url) -> HashMap<String, String> {
    let mut params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    if let Some(fragment) = url.fragment() {
        params.extend(url::form_urlencoded::parse(fragment.as_bytes()).into_owned());
    }
    params
}

/// 32 random bytes, base64url-encoded, for `state` and `nonce`
fn random_value() -> String {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).expect(
        "secure random number generation failed - \
         system may be misconfigured or compromised",
    );
    URL_SAFE_NO_PAD.encode(bytes)
}
