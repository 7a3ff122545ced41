//! Remote command dispatch: correlation, timeouts, cancellation.
//!
//! [`DispatchClient`] owns the in-flight request table. The table is touched
//! only by `send`, response delivery, and cancel/timeout/shutdown, each of
//! which holds the table lock for its whole check-and-mutate step, so a
//! request leaves the table exactly once and its caller is settled exactly once.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use ts_rs::TS;

use crate::config::DispatchConfig;
use crate::envelope::{CommandEnvelope, CorrelationId, RequestFrame, ResponseFrame};
use crate::error::DispatchError;
use crate::transport::{Inbound, InboundSender, Transport};

const CANCELLED_BY_CALLER: &str = "cancelled by caller";
const CLIENT_SHUT_DOWN: &str = "dispatch client shut down";
const CLIENT_CLOSED: &str = "dispatch client is shut down";
const UNSPECIFIED_BACKEND_ERROR: &str = "backend reported an unspecified error";

type Settlement = Result<Value, DispatchError>;

// ── Request state ────────────────────────────────────────────────

/// Lifecycle of a request. Every request leaves `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RequestState {
    Pending,
    Resolved,
    Rejected,
    TimedOut,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// What happened to an inbound response.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Matched a pending request and settled it.
    Settled(RequestState),
    /// Could not be attributed to a pending request. Carries the
    /// `Protocol` error that was logged.
    Dropped(DispatchError),
}

/// Counters over the client's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct DispatchStats {
    pub sent: u64,
    pub resolved: u64,
    pub rejected: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    /// Unmatched or malformed responses.
    pub dropped: u64,
}

impl DispatchStats {
    fn record(&mut self, state: RequestState) {
        match state {
            RequestState::Pending => {}
            RequestState::Resolved => self.resolved += 1,
            RequestState::Rejected => self.rejected += 1,
            RequestState::TimedOut => self.timed_out += 1,
            RequestState::Cancelled => self.cancelled += 1,
        }
    }

    /// Requests that have reached a terminal state.
    pub fn settled(&self) -> u64 {
        self.resolved + self.rejected + self.timed_out + self.cancelled
    }
}

// ── Pending command ──────────────────────────────────────────────

/// Deferred result of one `send`. Resolves to the backend's payload or to
/// the error that ended the request.
#[must_use = "a pending command settles in the background; await it to observe the outcome"]
#[derive(Debug)]
pub struct PendingCommand {
    id: Option<CorrelationId>,
    rx: oneshot::Receiver<Settlement>,
}

impl PendingCommand {
    /// An already-settled command that never entered the in-flight table.
    pub fn rejected(error: DispatchError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self { id: None, rx }
    }

    #[cfg(test)]
    pub(crate) fn resolved(value: Value) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Ok(value));
        Self { id: None, rx }
    }

    /// Correlation id, or `None` if the command was rejected before sending.
    pub fn id(&self) -> Option<CorrelationId> {
        self.id
    }
}

impl Future for PendingCommand {
    type Output = Settlement;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or_else(|_| Err(DispatchError::cancelled(CLIENT_SHUT_DOWN))))
    }
}

// ── Dispatch client ──────────────────────────────────────────────

struct InFlight {
    envelope: CommandEnvelope,
    created_at: Instant,
    settle: oneshot::Sender<Settlement>,
    timer: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Table {
    requests: HashMap<CorrelationId, InFlight>,
    closed: bool,
    stats: DispatchStats,
}

struct Inner {
    config: DispatchConfig,
    transport: Arc<dyn Transport>,
    next_id: AtomicU64,
    table: Mutex<Table>,
    outbound: mpsc::UnboundedSender<RequestFrame>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Runtime captured at `init`, so sends work from any thread.
    runtime: Handle,
}

/// Process-wide command dispatcher. Cheap to clone; clones share one table.
#[derive(Clone)]
pub struct DispatchClient {
    inner: Arc<Inner>,
}

impl DispatchClient {
    /// Start a client over `transport`. Must be called inside a Tokio runtime:
    /// spawns the writer and inbound tasks. The returned handle may then be
    /// used from any thread.
    pub fn init(config: DispatchConfig, transport: Arc<dyn Transport>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        transport.attach(InboundSender::new(inbound_tx));

        let inner = Arc::new(Inner {
            config,
            transport: Arc::clone(&transport),
            next_id: AtomicU64::new(1),
            table: Mutex::new(Table::default()),
            outbound: outbound_tx,
            tasks: Mutex::new(Vec::new()),
            runtime: Handle::current(),
        });

        let writer = tokio::spawn(run_writer(Arc::downgrade(&inner), transport, outbound_rx));
        let reader = tokio::spawn(run_reader(Arc::downgrade(&inner), inbound_rx));
        inner.tasks.lock().extend([writer, reader]);

        tracing::info!(
            timeout_ms = inner.config.timeout_ms,
            max_concurrent = ?inner.config.max_concurrent_requests,
            "dispatch client started"
        );
        Self { inner }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    /// Send with the configured default timeout.
    pub fn send(&self, envelope: CommandEnvelope) -> PendingCommand {
        self.send_with_timeout(envelope, self.inner.config.timeout())
    }

    /// Track the request, queue exactly one transport write, and return
    /// without waiting for it.
    pub fn send_with_timeout(&self, envelope: CommandEnvelope, timeout: Duration) -> PendingCommand {
        let inner = &self.inner;
        let (tx, rx) = oneshot::channel();

        let id = {
            let mut table = inner.table.lock();
            if table.closed {
                tracing::warn!(command = %envelope.qualified_name(), "send after shutdown");
                return PendingCommand::rejected(DispatchError::cancelled(CLIENT_CLOSED));
            }
            if let Some(cap) = inner.config.max_concurrent_requests {
                if table.requests.len() >= cap {
                    tracing::warn!(
                        command = %envelope.qualified_name(),
                        cap,
                        "request limit reached"
                    );
                    return PendingCommand::rejected(DispatchError::transport(format!(
                        "request limit reached ({cap} in flight)"
                    )));
                }
            }

            let id = CorrelationId(inner.next_id.fetch_add(1, Ordering::Relaxed));
            table.requests.insert(
                id,
                InFlight {
                    envelope: envelope.clone(),
                    created_at: Instant::now(),
                    settle: tx,
                    timer: None,
                },
            );
            table.stats.sent += 1;
            id
        };

        let timer = inner
            .runtime
            .spawn(expire_after(Arc::downgrade(inner), id, timeout));
        match inner.table.lock().requests.get_mut(&id) {
            Some(entry) => entry.timer = Some(timer),
            // Settled between the two locks.
            None => timer.abort(),
        }

        tracing::debug!(
            id = %id,
            module = envelope.module(),
            command = envelope.command(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "request sent"
        );

        if inner.outbound.send(RequestFrame::new(id, envelope)).is_err() {
            inner.settle(
                id,
                RequestState::Rejected,
                Err(DispatchError::transport("outbound queue closed")),
            );
        }

        PendingCommand { id: Some(id), rx }
    }

    /// Match a backend response against the table. Unknown or already
    /// settled ids are logged and dropped.
    pub fn deliver(&self, frame: ResponseFrame) -> Delivery {
        self.inner.deliver(frame)
    }

    /// Cancel a pending request. Returns true only if this call settled it;
    /// cancelling a finished or unknown request is a no-op.
    pub fn cancel(&self, id: CorrelationId) -> bool {
        let settled = self.inner.settle(
            id,
            RequestState::Cancelled,
            Err(DispatchError::cancelled(CANCELLED_BY_CALLER)),
        );
        if settled {
            self.inner.transport.disregard(id);
        }
        settled
    }

    /// Cancel everything still pending and stop the background tasks.
    /// Later sends settle immediately as cancelled. Idempotent.
    pub async fn shutdown(&self) {
        let drained: Vec<(CorrelationId, InFlight)> = {
            let mut table = self.inner.table.lock();
            if table.closed {
                return;
            }
            table.closed = true;
            let drained: Vec<_> = table.requests.drain().collect();
            for _ in &drained {
                table.stats.record(RequestState::Cancelled);
            }
            drained
        };

        let count = drained.len();
        for (id, entry) in drained {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
            self.inner.transport.disregard(id);
            let _ = entry
                .settle
                .send(Err(DispatchError::cancelled(CLIENT_SHUT_DOWN)));
        }

        let tasks: Vec<JoinHandle<()>> = self.inner.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        self.inner.transport.close().await;

        tracing::info!(cancelled = count, "dispatch client shut down");
    }

    /// Number of requests awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.inner.table.lock().requests.len()
    }

    pub fn is_pending(&self, id: CorrelationId) -> bool {
        self.inner.table.lock().requests.contains_key(&id)
    }

    /// Ids of pending requests, oldest first.
    pub fn pending_ids(&self) -> Vec<CorrelationId> {
        let mut ids: Vec<CorrelationId> = self.inner.table.lock().requests.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// `module.command` of a pending request.
    pub fn describe(&self, id: CorrelationId) -> Option<String> {
        self.inner
            .table
            .lock()
            .requests
            .get(&id)
            .map(|r| r.envelope.qualified_name())
    }

    pub fn stats(&self) -> DispatchStats {
        self.inner.table.lock().stats
    }

    pub fn is_closed(&self) -> bool {
        self.inner.table.lock().closed
    }
}

impl Inner {
    /// Remove `id` from the table and settle its caller. Returns false if
    /// the request was not pending.
    fn settle(&self, id: CorrelationId, state: RequestState, result: Settlement) -> bool {
        debug_assert!(state.is_terminal());
        let entry = {
            let mut table = self.table.lock();
            let Some(entry) = table.requests.remove(&id) else {
                return false;
            };
            table.stats.record(state);
            entry
        };

        // The timer is the caller when the state is TimedOut.
        if state != RequestState::TimedOut {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }

        tracing::debug!(
            id = %id,
            module = entry.envelope.module(),
            command = entry.envelope.command(),
            state = ?state,
            elapsed_ms = u64::try_from(entry.created_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "request settled"
        );
        if entry.settle.send(result).is_err() {
            tracing::debug!(id = %id, "caller no longer waiting");
        }
        true
    }

    fn deliver(&self, frame: ResponseFrame) -> Delivery {
        let id = frame.id;
        let (state, result) = if frame.success {
            (RequestState::Resolved, Ok(frame.data.unwrap_or(Value::Null)))
        } else {
            let message = frame
                .error
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| UNSPECIFIED_BACKEND_ERROR.to_string());
            (RequestState::Rejected, Err(DispatchError::Backend { message }))
        };

        if self.settle(id, state, result) {
            Delivery::Settled(state)
        } else {
            self.drop_inbound(DispatchError::protocol(format!(
                "response for unknown or settled request {id}"
            )))
        }
    }

    fn receive(&self, inbound: Inbound) {
        match inbound {
            Inbound::Frame(text) => match ResponseFrame::decode(&text) {
                Ok(frame) => {
                    self.deliver(frame);
                }
                Err(err) => {
                    self.drop_inbound(err);
                }
            },
            Inbound::Response(frame) => {
                self.deliver(frame);
            }
            Inbound::Undeliverable { id, message } => {
                tracing::warn!(id = %id, error = %message, "request undeliverable");
                if !self.settle(id, RequestState::Rejected, Err(DispatchError::Transport { message })) {
                    self.drop_inbound(DispatchError::protocol(format!(
                        "delivery failure for unknown or settled request {id}"
                    )));
                }
            }
        }
    }

    fn drop_inbound(&self, error: DispatchError) -> Delivery {
        self.table.lock().stats.dropped += 1;
        tracing::warn!(error = %error, "dropping inbound message");
        Delivery::Dropped(error)
    }

    fn expire(&self, id: CorrelationId, timeout: Duration) {
        let after_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        if self.settle(
            id,
            RequestState::TimedOut,
            Err(DispatchError::Timeout { id, after_ms }),
        ) {
            self.transport.disregard(id);
            tracing::warn!(id = %id, after_ms, "request timed out");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
        for (_, entry) in self.table.get_mut().requests.drain() {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Drains the outbound queue in send order, one write per frame.
async fn run_writer(
    inner: Weak<Inner>,
    transport: Arc<dyn Transport>,
    mut outbound: mpsc::UnboundedReceiver<RequestFrame>,
) {
    while let Some(frame) = outbound.recv().await {
        let id = frame.id;
        if let Err(err) = transport.write(frame).await {
            let Some(inner) = inner.upgrade() else { break };
            tracing::warn!(id = %id, error = %err, "transport write failed");
            let err = match err {
                DispatchError::Transport { .. } => err,
                other => DispatchError::transport(other.to_string()),
            };
            inner.settle(id, RequestState::Rejected, Err(err));
        }
    }
}

async fn run_reader(inner: Weak<Inner>, mut inbound: mpsc::UnboundedReceiver<Inbound>) {
    while let Some(msg) = inbound.recv().await {
        let Some(inner) = inner.upgrade() else { break };
        inner.receive(msg);
    }
}

async fn expire_after(inner: Weak<Inner>, id: CorrelationId, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    if let Some(inner) = inner.upgrade() {
        inner.expire(id, timeout);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;
    use crate::transport::channel::{BackendEndpoint, ChannelTransport};

    fn setup(config: DispatchConfig) -> (DispatchClient, BackendEndpoint) {
        let (transport, backend) = ChannelTransport::pair();
        (DispatchClient::init(config, transport), backend)
    }

    fn set_volumes() -> CommandEnvelope {
        CommandEnvelope::new("audio", "set_volumes")
            .unwrap()
            .param("playback", 80)
            .param("capture", 50)
    }

    #[tokio::test]
    async fn resolves_on_success_response() {
        let (client, mut backend) = setup(DispatchConfig::default());
        let pending = client.send(set_volumes());

        let frame = backend.next_request().await.unwrap();
        assert_eq!(Some(frame.id), pending.id());
        assert_eq!(frame.envelope.module(), "audio");
        assert_eq!(frame.envelope.params()["playback"], json!(80));

        assert!(backend.respond(ResponseFrame::ok(frame.id, Value::Null)));
        assert_eq!(pending.await.unwrap(), Value::Null);
        assert_eq!(client.in_flight(), 0);
        assert_eq!(client.stats().resolved, 1);
    }

    #[tokio::test]
    async fn backend_failure_rejects_with_message() {
        let (client, mut backend) = setup(DispatchConfig::default());
        let pending = client.send(set_volumes());

        let frame = backend.next_request().await.unwrap();
        backend.respond(ResponseFrame::err(frame.id, "device busy"));

        assert_eq!(
            pending.await.unwrap_err(),
            DispatchError::Backend {
                message: "device busy".to_string()
            }
        );
        assert_eq!(client.stats().rejected, 1);
    }

    #[tokio::test]
    async fn backend_failure_without_message_gets_a_default() {
        let (client, mut backend) = setup(DispatchConfig::default());
        let pending = client.send(set_volumes());
        let frame = backend.next_request().await.unwrap();

        let delivery = client.deliver(ResponseFrame {
            id: frame.id,
            success: false,
            data: None,
            error: None,
        });
        assert_eq!(delivery, Delivery::Settled(RequestState::Rejected));
        let err = pending.await.unwrap_err();
        assert_eq!(err.to_string(), UNSPECIFIED_BACKEND_ERROR);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_at_deadline_and_drops_late_response() {
        let (client, mut backend) = setup(DispatchConfig::default().with_timeout_ms(1000));
        let started = Instant::now();
        let pending = client.send(set_volumes());
        let id = pending.id().unwrap();
        let frame = backend.next_request().await.unwrap();

        let err = pending.await.unwrap_err();
        assert_eq!(err, DispatchError::Timeout { id, after_ms: 1000 });
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert_eq!(client.in_flight(), 0);
        assert!(backend.is_disregarded(id));

        let late = client.deliver(ResponseFrame::ok(frame.id, json!({"late": true})));
        assert!(matches!(late, Delivery::Dropped(DispatchError::Protocol { .. })));

        let stats = client.stats();
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.settled(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn per_request_timeout_overrides_default() {
        let (client, _backend) = setup(DispatchConfig::default());
        let started = Instant::now();
        let pending = client.send_with_timeout(set_volumes(), Duration::from_millis(250));
        let err = pending.await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout { after_ms: 250, .. }));
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn unknown_id_is_dropped_without_settling() {
        let (client, _backend) = setup(DispatchConfig::default());
        let pending = client.send(set_volumes());
        let id = pending.id().unwrap();

        let delivery = client.deliver(ResponseFrame::ok(CorrelationId(9_999), Value::Null));
        assert!(matches!(delivery, Delivery::Dropped(DispatchError::Protocol { .. })));
        assert!(client.is_pending(id));
        assert_eq!(client.stats().dropped, 1);

        client.deliver(ResponseFrame::ok(id, json!(1)));
        assert_eq!(pending.await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn duplicate_delivery_settles_once() {
        let (client, _backend) = setup(DispatchConfig::default());
        let pending = client.send(set_volumes());
        let id = pending.id().unwrap();

        assert_eq!(
            client.deliver(ResponseFrame::ok(id, json!("first"))),
            Delivery::Settled(RequestState::Resolved)
        );
        assert!(matches!(
            client.deliver(ResponseFrame::err(id, "second")),
            Delivery::Dropped(_)
        ));
        assert_eq!(pending.await.unwrap(), json!("first"));
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped() {
        let (client, mut backend) = setup(DispatchConfig::default());
        let pending = client.send(set_volumes());
        let frame = backend.next_request().await.unwrap();

        assert!(backend.respond_raw("{not json"));
        backend.respond(ResponseFrame::ok(frame.id, json!({"ok": 1})));

        assert_eq!(pending.await.unwrap(), json!({"ok": 1}));
        assert_eq!(client.stats().dropped, 1);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_disregards_response() {
        let (client, mut backend) = setup(DispatchConfig::default());
        let pending = client.send(set_volumes());
        let id = pending.id().unwrap();
        let frame = backend.next_request().await.unwrap();

        assert!(client.cancel(id));
        assert!(!client.cancel(id));
        assert!(backend.is_disregarded(id));

        assert_eq!(
            pending.await.unwrap_err(),
            DispatchError::cancelled(CANCELLED_BY_CALLER)
        );
        assert!(!backend.respond(ResponseFrame::ok(frame.id, Value::Null)));
        assert!(matches!(
            client.deliver(ResponseFrame::ok(id, Value::Null)),
            Delivery::Dropped(_)
        ));
        assert_eq!(client.stats().cancelled, 1);
    }

    #[tokio::test]
    async fn cancelling_a_settled_request_is_a_no_op() {
        let (client, _backend) = setup(DispatchConfig::default());
        let pending = client.send(set_volumes());
        let id = pending.id().unwrap();
        client.deliver(ResponseFrame::ok(id, Value::Null));

        assert!(!client.cancel(id));
        assert_eq!(pending.await.unwrap(), Value::Null);
        assert_eq!(client.stats().cancelled, 0);
    }

    #[tokio::test]
    async fn write_failure_surfaces_as_transport_error() {
        let (client, backend) = setup(DispatchConfig::default());
        drop(backend);

        let err = client.send(set_volumes()).await.unwrap_err();
        assert_eq!(err, DispatchError::transport("backend endpoint closed"));
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn undeliverable_request_surfaces_as_transport_error() {
        let (client, mut backend) = setup(DispatchConfig::default());
        let pending = client.send(set_volumes());
        let frame = backend.next_request().await.unwrap();

        backend.fail(frame.id, "connection reset");
        assert_eq!(
            pending.await.unwrap_err(),
            DispatchError::transport("connection reset")
        );
    }

    #[tokio::test]
    async fn responses_settle_independently() {
        let (client, _backend) = setup(DispatchConfig::default());
        let first = client.send(set_volumes());
        let second = client.send(CommandEnvelope::new("weather", "get_weather").unwrap());
        let (a, b) = (first.id().unwrap(), second.id().unwrap());
        assert!(a < b);

        client.deliver(ResponseFrame::ok(b, json!("weather")));
        assert!(client.is_pending(a));
        assert!(!client.is_pending(b));
        assert_eq!(client.pending_ids(), vec![a]);
        assert_eq!(client.describe(a).as_deref(), Some("audio.set_volumes"));

        client.deliver(ResponseFrame::ok(a, json!("audio")));
        assert_eq!(second.await.unwrap(), json!("weather"));
        assert_eq!(first.await.unwrap(), json!("audio"));
    }

    #[tokio::test]
    async fn request_limit_rejects_without_tracking() {
        let (client, _backend) = setup(DispatchConfig::default().with_max_concurrent(2));
        let first = client.send(set_volumes());
        let _second = client.send(set_volumes());

        let third = client.send(set_volumes());
        assert_eq!(third.id(), None);
        assert!(matches!(third.await, Err(DispatchError::Transport { .. })));
        assert_eq!(client.in_flight(), 2);

        client.deliver(ResponseFrame::ok(first.id().unwrap(), Value::Null));
        let fourth = client.send(set_volumes());
        assert!(fourth.id().is_some());
        assert_eq!(client.stats().sent, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sends_get_distinct_ids() {
        let (client, _backend) = setup(DispatchConfig::default());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                (0..250)
                    .map(|_| client.send(set_volumes()).id().unwrap())
                    .collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for ids in futures_util::future::join_all(handles).await {
            for id in ids.unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 2000);
        client.shutdown().await;
    }

    #[test]
    fn send_works_from_a_thread_outside_the_runtime() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let (client, mut backend) = rt.block_on(async { setup(DispatchConfig::default()) });

        let sender = client.clone();
        let pending = std::thread::spawn(move || sender.send(set_volumes()))
            .join()
            .expect("send panicked off the runtime");
        assert_eq!(client.in_flight(), 1);

        let result = rt.block_on(async move {
            let frame = backend.next_request().await.unwrap();
            backend.respond(ResponseFrame::ok(frame.id, json!("done")));
            pending.await
        });
        assert_eq!(result.unwrap(), json!("done"));
        assert!(!RequestState::Pending.is_terminal());
        assert!(RequestState::TimedOut.is_terminal());
    }

    #[tokio::test]
    async fn shutdown_cancels_everything_pending() {
        let (client, _backend) = setup(DispatchConfig::default());
        let pending: Vec<PendingCommand> = (0..3).map(|_| client.send(set_volumes())).collect();

        client.shutdown().await;
        assert!(client.is_closed());
        assert_eq!(client.in_flight(), 0);

        for p in pending {
            assert_eq!(
                p.await.unwrap_err(),
                DispatchError::cancelled(CLIENT_SHUT_DOWN)
            );
        }
        assert_eq!(client.stats().cancelled, 3);

        let late = client.send(set_volumes());
        assert_eq!(late.id(), None);
        assert_eq!(late.await.unwrap_err(), DispatchError::cancelled(CLIENT_CLOSED));

        client.shutdown().await;
        assert_eq!(client.stats().cancelled, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn every_send_settles_exactly_once() {
        let (client, mut backend) = setup(DispatchConfig::default().with_timeout_ms(500));
        let ok = client.send(set_volumes());
        let failed = client.send(set_volumes());
        let cancelled = client.send(set_volumes());
        let timed_out = client.send(set_volumes());

        for _ in 0..4 {
            backend.next_request().await.unwrap();
        }
        client.deliver(ResponseFrame::ok(ok.id().unwrap(), Value::Null));
        client.deliver(ResponseFrame::err(failed.id().unwrap(), "nope"));
        client.cancel(cancelled.id().unwrap());

        assert!(ok.await.is_ok());
        assert!(failed.await.is_err());
        assert!(cancelled.await.is_err());
        assert!(matches!(timed_out.await, Err(DispatchError::Timeout { .. })));

        let stats = client.stats();
        assert_eq!(stats.sent, 4);
        assert_eq!(stats.settled(), 4);
        assert_eq!(
            (stats.resolved, stats.rejected, stats.cancelled, stats.timed_out),
            (1, 1, 1, 1)
        );
    }
}
