//! Logout flow: the browser clears the identity provider session and
//! redirects back.

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;
use url::Url;

use super::{is_callback_for, AuthTransaction, WebAuthError};

pub type ClearSessionResult = Result<(), WebAuthError>;

pub struct ClearSessionTransaction {
    redirect_url: Url,
    completion: Mutex<Option<oneshot::Sender<ClearSessionResult>>>,
}

impl ClearSessionTransaction {
    pub fn new(redirect_url: Url) -> (Self, oneshot::Receiver<ClearSessionResult>) {
        let (sender, receiver) = oneshot::channel();
        let transaction = Self {
            redirect_url,
            completion: Mutex::new(Some(sender)),
        };
        (transaction, receiver)
    }

    pub fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }

    fn finish(&self, result: ClearSessionResult) {
        if let Some(sender) = self.completion.lock().take() {
            if sender.send(result).is_err() {
                debug!("Logout result dropped, nobody is waiting");
            }
        }
    }
}

impl AuthTransaction for ClearSessionTransaction {
    fn state(&self) -> Option<&str> {
        None
    }

    fn resume(&self, url: &Url) -> bool {
        if !is_callback_for(url, &self.redirect_url) {
            return false;
        }
        self.finish(Ok(()));
        true
    }

    fn cancel(&self) {
        self.finish(Err(WebAuthError::UserCancelled));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logout() -> (ClearSessionTransaction, oneshot::Receiver<ClearSessionResult>) {
        ClearSessionTransaction::new(Url::parse("https://app.example.com/logout").unwrap())
    }

    #[test]
    fn test_resume_completes() {
        let (tx, mut rx) = logout();

        assert!(tx.resume(&Url::parse("https://app.example.com/logout").unwrap()));
        assert_eq!(rx.try_recv().unwrap(), Ok(()));
    }

    #[test]
    fn test_resume_foreign_url() {
        let (tx, mut rx) = logout();

        assert!(!tx.resume(&Url::parse("https://app.example.com/other").unwrap()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cancel() {
        let (tx, mut rx) = logout();

        tx.cancel();
        tx.cancel();

        assert_eq!(rx.try_recv().unwrap(), Err(WebAuthError::UserCancelled));
    }
}
