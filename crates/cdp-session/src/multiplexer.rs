//! The session multiplexer (spec §4.E): request/response correlation,
//! event dispatch, heartbeat, and auto-reconnect on top of a
//! [`MessageChannel`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cdp_protocol::{Id, InboundMessage, Request, ResponseOutcome};
use cdp_transport::{ChannelConfig, ChannelError, MessageChannel, PolledMessage};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::correlation::{Completion, CorrelationTable};
use crate::error::SessionError;
use crate::subscription::{Handler, SubscriptionTable, SubscriptionToken};

tokio::task_local! {
    static IN_READER_TASK: ();
}

fn in_reader_task() -> bool {
    IN_READER_TASK.try_with(|_| ()).is_ok()
}

/// Mirrors spec §4.E's session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub channel: ChannelConfig,
    /// `None` disables the heartbeat task entirely; `Some(interval)` pings
    /// at half the interval when the channel has been idle that long.
    pub heartbeat_interval: Option<Duration>,
    pub auto_reconnect: bool,
    pub reconnect_initial_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub reconnect_multiplier: f64,
    /// `0` retries indefinitely (spec §8 boundary behavior).
    pub reconnect_max_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            heartbeat_interval: Some(Duration::from_secs(15)),
            auto_reconnect: false,
            reconnect_initial_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_multiplier: 2.0,
            reconnect_max_attempts: 0,
        }
    }
}

type LifecycleSlot<T> = Mutex<Option<Arc<T>>>;

#[derive(Default)]
struct Lifecycle {
    on_reconnecting: LifecycleSlot<dyn Fn(u32) + Send + Sync>,
    on_reconnected: LifecycleSlot<dyn Fn() + Send + Sync>,
    on_reconnect_failed: LifecycleSlot<dyn Fn(&str) + Send + Sync>,
    on_disconnect: LifecycleSlot<dyn Fn() + Send + Sync>,
    on_error: LifecycleSlot<dyn Fn(&str) + Send + Sync>,
}

impl Lifecycle {
    fn fire_on_reconnecting(&self, attempt: u32) {
        if let Some(f) = self.on_reconnecting.lock().clone() {
            f(attempt);
        }
    }
    fn fire_on_reconnected(&self) {
        if let Some(f) = self.on_reconnected.lock().clone() {
            f();
        }
    }
    fn fire_on_reconnect_failed(&self, reason: &str) {
        if let Some(f) = self.on_reconnect_failed.lock().clone() {
            f(reason);
        }
    }
    fn fire_on_disconnect(&self) {
        if let Some(f) = self.on_disconnect.lock().clone() {
            f();
        }
    }
    fn fire_on_error(&self, message: &str) {
        if let Some(f) = self.on_error.lock().clone() {
            f(message);
        }
        warn!(%message, "session error");
    }
}

#[derive(Default)]
struct Tasks {
    reader: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
}

struct Inner {
    url: String,
    channel: RwLock<Arc<MessageChannel>>,
    correlation: CorrelationTable,
    subscriptions: Arc<SubscriptionTable>,
    state: Mutex<SessionState>,
    config: SessionConfig,
    tasks: Mutex<Tasks>,
    lifecycle: Lifecycle,
    user_disconnect: AtomicBool,
}

impl Inner {
    fn state(&self) -> SessionState {
        *self.state.lock()
    }

    fn set_state(&self, s: SessionState) {
        *self.state.lock() = s;
    }

    fn channel(&self) -> Arc<MessageChannel> {
        self.channel.read().clone()
    }

    fn handle_inbound_text(&self, text: &str) {
        match InboundMessage::parse(text) {
            Ok(InboundMessage::Response { id, outcome }) => self.correlation.resolve(id, outcome),
            Ok(InboundMessage::Event { method, params }) => self.dispatch_event(&method, &params),
            Err(e) => self.lifecycle.fire_on_error(&format!("malformed CDP message: {e}")),
        }
    }

    fn dispatch_event(&self, method: &str, params: &Value) {
        let (exact, catch_all) = self.subscriptions.dispatch(method, params);
        self.invoke_guarded(exact, method, params);
        self.invoke_guarded(catch_all, method, params);
    }

    fn invoke_guarded(&self, handler: Option<Handler>, method: &str, params: &Value) {
        let Some(handler) = handler else { return };
        let outcome = catch_unwind(AssertUnwindSafe(|| handler(method, params)));
        if outcome.is_err() {
            self.lifecycle.fire_on_error(&format!("event handler for '{method}' panicked"));
        }
    }
}

/// The session multiplexer. Cheap to clone (wraps an `Arc`); clones share
/// the same correlation table, subscriptions, and background tasks.
#[derive(Clone)]
pub struct Session(Arc<Inner>);

impl Session {
    pub async fn connect(url: &str, config: SessionConfig) -> Result<Self, SessionError> {
        let channel = MessageChannel::connect(url, config.channel)
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;

        let inner = Arc::new(Inner {
            url: url.to_string(),
            channel: RwLock::new(Arc::new(channel)),
            correlation: CorrelationTable::new(),
            subscriptions: SubscriptionTable::new(),
            state: Mutex::new(SessionState::Connected),
            config,
            tasks: Mutex::new(Tasks::default()),
            lifecycle: Lifecycle::default(),
            user_disconnect: AtomicBool::new(false),
        });

        let session = Session(inner);
        session.start_reader();
        session.start_heartbeat();
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.0.state()
    }

    pub fn pending_count(&self) -> usize {
        self.0.correlation.pending_count()
    }

    pub fn event_count(&self) -> u64 {
        self.0.subscriptions.event_count()
    }

    pub async fn wait_for_event(&self, timeout: Duration) -> bool {
        self.0.subscriptions.wait_for_event(timeout).await
    }

    pub fn on_event(&self, method: impl Into<String>, handler: Handler) -> SubscriptionToken {
        self.0.subscriptions.on_event(method, handler)
    }

    pub fn on_any_event(&self, handler: Handler) -> SubscriptionToken {
        self.0.subscriptions.on_any_event(handler)
    }

    pub fn remove(&self, method: &str) {
        self.0.subscriptions.remove(method)
    }

    pub fn remove_by_prefix(&self, prefix: &str) {
        self.0.subscriptions.remove_by_prefix(prefix)
    }

    pub fn set_on_reconnecting<F: Fn(u32) + Send + Sync + 'static>(&self, f: F) {
        *self.0.lifecycle.on_reconnecting.lock() = Some(Arc::new(f));
    }
    pub fn set_on_reconnected<F: Fn() + Send + Sync + 'static>(&self, f: F) {
        *self.0.lifecycle.on_reconnected.lock() = Some(Arc::new(f));
    }
    pub fn set_on_reconnect_failed<F: Fn(&str) + Send + Sync + 'static>(&self, f: F) {
        *self.0.lifecycle.on_reconnect_failed.lock() = Some(Arc::new(f));
    }
    pub fn set_on_disconnect<F: Fn() + Send + Sync + 'static>(&self, f: F) {
        *self.0.lifecycle.on_disconnect.lock() = Some(Arc::new(f));
    }
    pub fn set_on_error<F: Fn(&str) + Send + Sync + 'static>(&self, f: F) {
        *self.0.lifecycle.on_error.lock() = Some(Arc::new(f));
    }

    /// Submit a request and invoke `callback` once it completes, without
    /// blocking the caller (spec §4.E submit path, callback completion).
    pub async fn submit<F>(&self, method: &str, params: Value, callback: F) -> Result<Id, SessionError>
    where
        F: FnOnce(Result<ResponseOutcome, SessionError>) + Send + 'static,
    {
        let id = self.0.correlation.allocate_id();
        self.0.correlation.insert(id, Completion::Callback(Box::new(callback)));

        let request = Request { id, method: method.to_string(), params };
        let text = serde_json::to_string(&request)
            .expect("CDP requests are always serializable JSON");

        let sent = self.0.channel().send_text(&text).await.map_err(SessionError::from)?;
        if !sent {
            if let Some(completion) = self.0.correlation.remove(id) {
                if let Completion::Callback(f) = completion {
                    f(Err(SessionError::Connection));
                }
            }
            return Err(SessionError::Connection);
        }
        Ok(id)
    }

    /// Submit a request and block until it completes or `timeout` elapses
    /// (spec §4.E `send_sync`). Fails immediately with `WouldDeadlock`
    /// when called from the reader task itself (spec invariant 6).
    pub async fn send_sync(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<ResponseOutcome, SessionError> {
        if in_reader_task() {
            return Err(SessionError::WouldDeadlock);
        }

        let id = self.0.correlation.allocate_id();
        let (tx, mut rx) = oneshot::channel();
        self.0.correlation.insert(id, Completion::Waiter(tx));

        let request = Request { id, method: method.to_string(), params };
        let text = serde_json::to_string(&request)
            .expect("CDP requests are always serializable JSON");

        let channel = self.0.channel();
        match channel.send_text(&text).await {
            Ok(true) => {}
            Ok(false) => {
                self.0.correlation.remove(id);
                return Err(SessionError::Connection);
            }
            Err(e) => {
                self.0.correlation.remove(id);
                return Err(SessionError::from(e));
            }
        }

        let reader_running = self.0.tasks.lock().reader.is_some();
        if reader_running {
            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(SessionError::Connection),
                Err(_) => {
                    self.0.correlation.remove(id);
                    Err(SessionError::Timeout)
                }
            }
        } else {
            // No reader task: drive the channel ourselves (spec §4.E
            // "else, loop poll(10ms)").
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                if let Ok(result) = rx.try_recv() {
                    return result;
                }
                if tokio::time::Instant::now() >= deadline {
                    self.0.correlation.remove(id);
                    return Err(SessionError::Timeout);
                }
                match channel.poll(Duration::from_millis(10)).await {
                    Ok(PolledMessage::Text(text)) => self.0.handle_inbound_text(&text),
                    Ok(_) => {}
                    Err(e) => {
                        self.0.correlation.remove(id);
                        return Err(SessionError::from(e));
                    }
                }
            }
        }
    }

    /// User-initiated disconnect. Must not be called from the reader task
    /// (spec §4.E "Disconnect safety"); the check mirrors `send_sync`'s.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        if in_reader_task() {
            return Err(SessionError::WouldDeadlock);
        }
        self.0.user_disconnect.store(true, Ordering::SeqCst);
        self.0.set_state(SessionState::Disconnected);

        let channel = self.0.channel();
        let _ = channel.close(1000, "client disconnect").await;
        self.0.correlation.fail_all(SessionError::Connection);

        let mut tasks = self.0.tasks.lock();
        if let Some(h) = tasks.reader.take() {
            h.abort();
        }
        if let Some(h) = tasks.heartbeat.take() {
            h.abort();
        }
        if let Some(h) = tasks.reconnect.take() {
            h.abort();
        }
        drop(tasks);

        self.0.lifecycle.fire_on_disconnect();
        Ok(())
    }

    fn start_reader(&self) {
        let inner = Arc::clone(&self.0);
        let handle = tokio::spawn(IN_READER_TASK.scope((), async move {
            reader_loop(inner).await;
        }));
        self.0.tasks.lock().reader = Some(handle);
    }

    fn start_heartbeat(&self) {
        if self.0.config.heartbeat_interval.is_none() {
            return;
        }
        let inner = Arc::clone(&self.0);
        let handle = tokio::spawn(heartbeat_loop(inner));
        self.0.tasks.lock().heartbeat = Some(handle);
    }

    fn start_reconnect(&self) {
        let inner = Arc::clone(&self.0);
        let handle = tokio::spawn(reconnect_loop(inner));
        self.0.tasks.lock().reconnect = Some(handle);
    }
}

async fn reader_loop(inner: Arc<Inner>) {
    let mut backoff = Duration::from_millis(1);
    const MAX_BACKOFF: Duration = Duration::from_millis(50);

    loop {
        if inner.state() == SessionState::Disconnected {
            break;
        }
        let channel = inner.channel();
        match channel.poll(backoff).await {
            Ok(PolledMessage::None) => {
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Ok(PolledMessage::Text(text)) => {
                backoff = Duration::from_millis(1);
                inner.handle_inbound_text(&text);
            }
            Ok(PolledMessage::Binary(_)) => {
                backoff = Duration::from_millis(1);
            }
            Err(e) => {
                debug!(error = %e, "transport loss in reader task");
                handle_transport_loss(&inner, e);
                break;
            }
        }
    }
}

fn handle_transport_loss(inner: &Arc<Inner>, _err: ChannelError) {
    inner.correlation.fail_all(SessionError::Connection);
    if inner.user_disconnect.load(Ordering::SeqCst) {
        return;
    }
    let was_connected = inner.state() == SessionState::Connected;
    if was_connected && inner.config.auto_reconnect {
        inner.set_state(SessionState::Reconnecting);
        let session = Session(Arc::clone(inner));
        session.start_reconnect();
    } else {
        inner.set_state(SessionState::Disconnected);
        inner.lifecycle.fire_on_disconnect();
    }
}

async fn reconnect_loop(inner: Arc<Inner>) {
    let mut attempt: u32 = 1;
    let mut delay = inner.config.reconnect_initial_delay;

    loop {
        inner.lifecycle.fire_on_reconnecting(attempt);
        tokio::time::sleep(delay).await;

        match MessageChannel::connect(&inner.url, inner.config.channel).await {
            Ok(new_channel) => {
                *inner.channel.write() = Arc::new(new_channel);
                inner.set_state(SessionState::Connected);
                let session = Session(Arc::clone(&inner));
                session.start_reader();
                session.start_heartbeat();
                inner.lifecycle.fire_on_reconnected();
                return;
            }
            Err(e) => {
                error!(error = %e, attempt, "reconnect attempt failed");
                attempt += 1;
                if inner.config.reconnect_max_attempts != 0 && attempt > inner.config.reconnect_max_attempts {
                    inner.set_state(SessionState::Disconnected);
                    inner.lifecycle.fire_on_reconnect_failed("attempts exhausted");
                    inner.lifecycle.fire_on_disconnect();
                    return;
                }
                let next = delay.as_secs_f64() * inner.config.reconnect_multiplier;
                delay = Duration::from_secs_f64(next.min(inner.config.reconnect_max_delay.as_secs_f64()));
            }
        }
    }
}

async fn heartbeat_loop(inner: Arc<Inner>) {
    let Some(interval) = inner.config.heartbeat_interval else { return };
    let half = interval / 2;
    let wake_every = half.min(Duration::from_millis(500)).max(Duration::from_millis(50));

    loop {
        tokio::time::sleep(wake_every).await;
        if inner.state() != SessionState::Connected {
            break;
        }
        let channel = inner.channel();
        if channel.idle_duration() >= half {
            if let Err(e) = channel.ping(b"cdp-heartbeat").await {
                debug!(error = %e, "heartbeat ping failed");
            }
        }
    }
}
