//! In-flight browser redirect flows.
//!
//! A login or logout opens a browser and waits for the identity provider to
//! redirect back. At most one such flow is active; [`TransactionStore`] holds
//! it and routes the callback URL to it.

mod clear_session;
mod login;
mod store;

pub use clear_session::ClearSessionTransaction;
pub use login::{AuthorizationGrant, LoginTransaction};
pub use store::{Generation, TransactionStore};

use thiserror::Error;
use url::Url;

/// How a redirect flow ended, when it did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebAuthError {
    #[error("User cancelled the web authentication flow")]
    UserCancelled,

    #[error("Invalid callback URL: {0}")]
    InvalidCallback(String),

    #[error("Authorization failed: {error}{}", describe(.description))]
    Authorization {
        error: String,
        description: Option<String>,
    },
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

/// A redirect flow the store can hold.
///
/// `resume` and `cancel` are invoked with the store lock held and must not
/// call back into the store.
pub trait AuthTransaction: Send + Sync {
    /// Correlation token sent on the outgoing request, if any
    fn state(&self) -> Option<&str>;

    /// Offer a callback URL. Returns whether this transaction handled it.
    fn resume(&self, url: &Url) -> bool;

    /// Abort the flow; its owner observes a cancellation
    fn cancel(&self);
}

/// Whether `url` is a callback for `redirect_url`, ignoring ASCII case
pub(crate) fn is_callback_for(url: &Url, redirect_url: &Url) -> bool {
    let url = url.as_str().to_ascii_lowercase();
    let redirect = redirect_url.as_str().to_ascii_lowercase();
    url.starts_with(&redirect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_prefix_match() {
        let redirect = Url::parse("com.example.app://tenant.example.com/ios/callback").unwrap();

        let callback =
            Url::parse("com.example.app://tenant.example.com/ios/callback?code=abc").unwrap();
        assert!(is_callback_for(&callback, &redirect));

        let upper =
            Url::parse("com.example.app://tenant.example.com/IOS/CALLBACK?code=abc").unwrap();
        assert!(is_callback_for(&upper, &redirect));

        let other = Url::parse("com.example.app://tenant.example.com/other").unwrap();
        assert!(!is_callback_for(&other, &redirect));
    }

    #[test]
    fn test_error_display() {
        let error = WebAuthError::Authorization {
            error: "access_denied".into(),
            description: Some("User did not consent".into()),
        };
        assert_eq!(
            error.to_string(),
            "Authorization failed: access_denied (User did not consent)"
        );

        let bare = WebAuthError::Authorization {
            error: "login_required".into(),
            description: None,
        };
        assert_eq!(bare.to_string(), "Authorization failed: login_required");
    }
}
