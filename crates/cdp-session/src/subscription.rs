//! Event subscription table (spec §4.E): at most one handler per exact
//! method, plus an optional catch-all, dispatched sequentially on the
//! reader task.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Notify;

pub type Handler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

enum Target {
    Method(String),
    CatchAll,
}

/// RAII handle returned by `on_event`/`on_any_event`: dropping it
/// unsubscribes, for scoped use without an explicit `remove` call.
pub struct SubscriptionToken {
    table: Arc<SubscriptionTable>,
    target: Target,
}

impl Drop for SubscriptionToken {
    fn drop(&mut self) {
        match &self.target {
            Target::Method(method) => self.table.remove(method),
            Target::CatchAll => self.table.clear_catch_all(),
        }
    }
}

pub struct SubscriptionTable {
    handlers: RwLock<HashMap<String, Handler>>,
    catch_all: RwLock<Option<Handler>>,
    event_counter: AtomicU64,
    notify: Notify,
}

impl SubscriptionTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handlers: RwLock::new(HashMap::new()),
            catch_all: RwLock::new(None),
            event_counter: AtomicU64::new(0),
            notify: Notify::new(),
        })
    }

    pub fn on_event(self: &Arc<Self>, method: impl Into<String>, handler: Handler) -> SubscriptionToken {
        let method = method.into();
        self.handlers.write().insert(method.clone(), handler);
        SubscriptionToken { table: Arc::clone(self), target: Target::Method(method) }
    }

    pub fn on_any_event(self: &Arc<Self>, handler: Handler) -> SubscriptionToken {
        *self.catch_all.write() = Some(handler);
        SubscriptionToken { table: Arc::clone(self), target: Target::CatchAll }
    }

    pub fn remove(&self, method: &str) {
        self.handlers.write().remove(method);
    }

    pub fn remove_by_prefix(&self, prefix: &str) {
        self.handlers.write().retain(|method, _| !method.starts_with(prefix));
    }

    fn clear_catch_all(&self) {
        *self.catch_all.write() = None;
    }

    /// Look up the exact-method handler and the catch-all, copying both
    /// out before releasing the read lock so removal mid-callback (from
    /// within a handler) is safe (spec §5 deadlock rule / §9 reentrancy).
    pub fn dispatch(&self, method: &str, params: &Value) -> (Option<Handler>, Option<Handler>) {
        let exact = self.handlers.read().get(method).cloned();
        let catch_all = self.catch_all.read().clone();
        self.event_counter.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_waiters();
        (exact, catch_all)
    }

    pub fn event_count(&self) -> u64 {
        self.event_counter.load(Ordering::Relaxed)
    }

    /// Block until the next event is dispatched or `timeout` elapses.
    /// Supplemented from `original_source`'s `CDPConnection.cpp`, which
    /// exposes the same "wait for next event" primitive as a thin wrapper
    /// over this counter (spec §6, MODULE 6).
    pub async fn wait_for_event(&self, timeout: Duration) -> bool {
        let before = self.event_count();
        tokio::select! {
            _ = self.notify.notified() => true,
            _ = tokio::time::sleep(timeout) => self.event_count() != before,
        }
    }
}
