//! The correlation table (spec §4.E): `id -> completion`, where a
//! completion is either a one-shot callback or a one-shot waiter slot.

use std::sync::atomic::{AtomicU64, Ordering};

use cdp_protocol::{Id, ResponseOutcome};
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::SessionError;

pub type CompletionResult = Result<ResponseOutcome, SessionError>;

pub enum Completion {
    Callback(Box<dyn FnOnce(CompletionResult) + Send>),
    Waiter(oneshot::Sender<CompletionResult>),
}

impl Completion {
    fn fulfill(self, result: CompletionResult) {
        match self {
            Completion::Callback(f) => f(result),
            Completion::Waiter(tx) => {
                // The receiver may already be gone (timed out and dropped
                // its end); that's not an error, just a late response.
                let _ = tx.send(result);
            }
        }
    }
}

/// Request-id allocation and pending-request bookkeeping. Every id handed
/// out is greater than zero and never reused within the table's lifetime
/// (spec invariant 1): it's a monotonically increasing per-session counter.
pub struct CorrelationTable {
    next_id: AtomicU64,
    pending: DashMap<Id, Completion>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), pending: DashMap::new() }
    }

    pub fn allocate_id(&self) -> Id {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, id: Id, completion: Completion) {
        self.pending.insert(id, completion);
    }

    pub fn remove(&self, id: Id) -> Option<Completion> {
        self.pending.remove(&id).map(|(_, v)| v)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Resolve a response arriving on the wire: pop the entry and fulfill
    /// it, or log-and-discard if the id is unknown (spec §4.E receive
    /// path).
    pub fn resolve(&self, id: Id, outcome: ResponseOutcome) {
        match self.remove(id) {
            Some(completion) => completion.fulfill(Ok(outcome)),
            None => trace!(id, "response for unknown or already-resolved request id, discarding"),
        }
    }

    /// Fail every still-pending entry with the same error (channel loss,
    /// spec §4.E "connected -> user disconnect" side effect: "fail all
    /// pending").
    pub fn fail_all(&self, err: SessionError) {
        let ids: Vec<Id> = self.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some(completion) = self.remove(id) {
                completion.fulfill(Err(err.clone()));
            }
        }
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_monotonic_and_never_zero() {
        let table = CorrelationTable::new();
        let ids: Vec<_> = (0..5).map(|_| table.allocate_id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn resolve_fulfills_waiter() {
        let table = CorrelationTable::new();
        let id = table.allocate_id();
        let (tx, rx) = oneshot::channel();
        table.insert(id, Completion::Waiter(tx));
        table.resolve(id, ResponseOutcome::Result(json!({"ok": true})));
        let result = rx.await.unwrap().unwrap();
        match result {
            ResponseOutcome::Result(v) => assert_eq!(v["ok"], true),
            _ => panic!("expected result"),
        }
    }

    #[test]
    fn resolve_of_unknown_id_is_a_noop() {
        let table = CorrelationTable::new();
        table.resolve(999, ResponseOutcome::Result(json!(null)));
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn fail_all_resolves_every_pending_waiter() {
        let table = CorrelationTable::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let id = table.allocate_id();
            let (tx, rx) = oneshot::channel();
            table.insert(id, Completion::Waiter(tx));
            receivers.push(rx);
        }
        table.fail_all(SessionError::Connection);
        for rx in receivers {
            assert!(matches!(rx.await.unwrap(), Err(SessionError::Connection)));
        }
    }
}
