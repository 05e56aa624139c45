//! Single-slot holder for the active redirect flow.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use url::Url;

use super::AuthTransaction;

/// Stamp of the store's state; advances on every mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct Slot {
    current: Option<Arc<dyn AuthTransaction>>,
    generation: u64,
}

impl Slot {
    fn replace(&mut self, next: Option<Arc<dyn AuthTransaction>>) {
        self.current = next;
        self.generation += 1;
    }
}

/// Holds at most one [`AuthTransaction`].
///
/// Every operation runs under one mutex, so a store, clear, cancel or resume
/// never observes another half-done. Share it as `Arc<TransactionStore>`.
#[derive(Default)]
pub struct TransactionStore {
    slot: Mutex<Slot>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `transaction`, cancelling whatever was held before
    pub fn store(&self, transaction: Arc<dyn AuthTransaction>) {
        let mut slot = self.slot.lock();

        if let Some(previous) = slot.current.take() {
            debug!(state = ?previous.state(), "Cancelling superseded transaction");
            previous.cancel();
        }

        slot.replace(Some(transaction));
    }

    /// Drop the held transaction without cancelling it
    pub fn clear(&self) {
        self.slot.lock().replace(None);
    }

    /// Cancel `transaction` and empty the store.
    ///
    /// The held transaction is also cancelled when it is `transaction` itself
    /// or carries the same `state`; an unrelated held transaction is dropped
    /// without being told.
    pub fn cancel(&self, transaction: &dyn AuthTransaction) {
        let mut slot = self.slot.lock();

        if let Some(held) = slot.current.as_ref() {
            let same_instance = std::ptr::eq(
                Arc::as_ptr(held) as *const (),
                transaction as *const dyn AuthTransaction as *const (),
            );
            let same_state = matches!(
                (held.state(), transaction.state()),
                (Some(a), Some(b)) if a == b
            );

            if !same_instance && same_state {
                held.cancel();
            }
        }

        transaction.cancel();
        slot.replace(None);
    }

    /// Offer `url` to the held transaction. The slot is left as is; callers
    /// follow a handled callback with [`clear`](Self::clear).
    pub fn resume(&self, url: &Url) -> bool {
        let slot = self.slot.lock();

        match slot.current.as_ref() {
            Some(current) => current.resume(url),
            None => false,
        }
    }

    /// The held transaction, if any
    pub fn current(&self) -> Option<Arc<dyn AuthTransaction>> {
        self.slot.lock().current.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().current.is_none()
    }

    pub fn generation(&self) -> Generation {
        Generation(self.slot.lock().generation)
    }

    /// Whether nothing has changed since `generation` was taken
    pub fn is_current(&self, generation: Generation) -> bool {
        self.slot.lock().generation == generation.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockTransaction {
        state: Option<String>,
        handles: bool,
        cancels: AtomicUsize,
        resumes: AtomicUsize,
    }

    impl MockTransaction {
        fn new(state: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                state: state.map(str::to_string),
                handles: true,
                cancels: AtomicUsize::new(0),
                resumes: AtomicUsize::new(0),
            })
        }

        fn cancels(&self) -> usize {
            self.cancels.load(Ordering::SeqCst)
        }
    }

    impl AuthTransaction for MockTransaction {
        fn state(&self) -> Option<&str> {
            self.state.as_deref()
        }

        fn resume(&self, _url: &Url) -> bool {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            self.handles
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn callback() -> Url {
        Url::parse("https://app.example.com/callback?code=abc&state=s1").unwrap()
    }

    #[test]
    fn test_store_holds_transaction() {
        let store = TransactionStore::new();
        assert!(store.is_empty());

        let tx = MockTransaction::new(Some("s1"));
        store.store(tx.clone());

        assert!(!store.is_empty());
        assert_eq!(store.current().unwrap().state(), Some("s1"));
        assert_eq!(tx.cancels(), 0);
    }

    #[test]
    fn test_store_cancels_previous() {
        let store = TransactionStore::new();
        let first = MockTransaction::new(Some("s1"));
        let second = MockTransaction::new(Some("s2"));

        store.store(first.clone());
        store.store(second.clone());

        assert_eq!(first.cancels(), 1);
        assert_eq!(second.cancels(), 0);
        assert_eq!(store.current().unwrap().state(), Some("s2"));
    }

    #[test]
    fn test_clear_does_not_cancel() {
        let store = TransactionStore::new();
        let tx = MockTransaction::new(Some("s1"));
        store.store(tx.clone());

        store.clear();

        assert!(store.is_empty());
        assert_eq!(tx.cancels(), 0);
    }

    #[test]
    fn test_cancel_held_transaction() {
        let store = TransactionStore::new();
        let tx = MockTransaction::new(Some("s1"));
        store.store(tx.clone());

        store.cancel(&*tx);

        assert_eq!(tx.cancels(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_cancel_unrelated_transaction() {
        let store = TransactionStore::new();
        let held = MockTransaction::new(Some("s1"));
        let other = MockTransaction::new(Some("s2"));
        store.store(held.clone());

        store.cancel(&*other);

        assert_eq!(held.cancels(), 0);
        assert_eq!(other.cancels(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_cancel_matching_state_cancels_both() {
        let store = TransactionStore::new();
        let held = MockTransaction::new(Some("s1"));
        let twin = MockTransaction::new(Some("s1"));
        store.store(held.clone());

        store.cancel(&*twin);

        assert_eq!(held.cancels(), 1);
        assert_eq!(twin.cancels(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_cancel_stateless_transactions_are_not_matched() {
        let store = TransactionStore::new();
        let held = MockTransaction::new(None);
        let other = MockTransaction::new(None);
        store.store(held.clone());

        store.cancel(&*other);

        assert_eq!(held.cancels(), 0);
        assert_eq!(other.cancels(), 1);
    }

    #[test]
    fn test_cancel_on_empty_store() {
        let store = TransactionStore::new();
        let tx = MockTransaction::new(Some("s1"));

        store.cancel(&*tx);

        assert_eq!(tx.cancels(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_resume_empty_store() {
        let store = TransactionStore::new();
        assert!(!store.resume(&callback()));
    }

    #[test]
    fn test_resume_delegates_and_keeps_slot() {
        let store = TransactionStore::new();
        let tx = MockTransaction::new(Some("s1"));
        store.store(tx.clone());

        assert!(store.resume(&callback()));

        assert_eq!(tx.resumes.load(Ordering::SeqCst), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_resume_returns_transaction_result() {
        let store = TransactionStore::new();
        let tx = Arc::new(MockTransaction {
            state: None,
            handles: false,
            cancels: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
        });
        store.store(tx);

        assert!(!store.resume(&callback()));
        assert!(!store.is_empty());
    }

    #[test]
    fn test_generation_advances_on_mutation() {
        let store = TransactionStore::new();
        let g0 = store.generation();
        assert!(store.is_current(g0));

        store.store(MockTransaction::new(Some("s1")));
        let g1 = store.generation();
        assert!(g1 > g0);
        assert!(!store.is_current(g0));

        // Resume is not a mutation
        store.resume(&callback());
        assert!(store.is_current(g1));

        store.clear();
        assert!(!store.is_current(g1));
    }

    #[test]
    fn test_concurrent_stores_leave_one_holder() {
        let store = Arc::new(TransactionStore::new());
        let transactions: Vec<_> = (0..16)
            .map(|i| MockTransaction::new(Some(format!("s{}", i).as_str())))
            .collect();

        let handles: Vec<_> = transactions
            .iter()
            .cloned()
            .map(|tx| {
                let store = store.clone();
                std::thread::spawn(move || store.store(tx))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Everyone but the final holder was cancelled exactly once
        let cancelled: usize = transactions.iter().map(|tx| tx.cancels()).sum();
        assert_eq!(cancelled, transactions.len() - 1);
        assert!(transactions.iter().all(|tx| tx.cancels() <= 1));
        assert!(!store.is_empty());
    }
}
