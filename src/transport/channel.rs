//! In-process transport: requests land on a [`BackendEndpoint`] which
//! answers through the same inbound path a network transport would use.
//! Used to embed a backend in the same process and to drive tests.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{Inbound, InboundSender, Transport};
use crate::envelope::{CorrelationId, RequestFrame, ResponseFrame};
use crate::error::DispatchError;

#[derive(Default)]
struct Shared {
    inbound: OnceLock<InboundSender>,
    disregarded: Mutex<HashSet<CorrelationId>>,
}

pub struct ChannelTransport {
    requests: mpsc::UnboundedSender<RequestFrame>,
    shared: Arc<Shared>,
}

/// Backend side of a [`ChannelTransport`].
pub struct BackendEndpoint {
    requests: mpsc::UnboundedReceiver<RequestFrame>,
    shared: Arc<Shared>,
}

impl ChannelTransport {
    pub fn pair() -> (Arc<Self>, BackendEndpoint) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let transport = Arc::new(Self {
            requests: tx,
            shared: Arc::clone(&shared),
        });
        (
            transport,
            BackendEndpoint {
                requests: rx,
                shared,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn attach(&self, inbound: InboundSender) {
        if self.shared.inbound.set(inbound).is_err() {
            tracing::warn!("channel transport attached twice; keeping the first client");
        }
    }

    async fn write(&self, frame: RequestFrame) -> Result<(), DispatchError> {
        self.requests
            .send(frame)
            .map_err(|_| DispatchError::transport("backend endpoint closed"))
    }

    fn disregard(&self, id: CorrelationId) {
        self.shared.disregarded.lock().insert(id);
    }

    /// Forget disregarded ids the backend never answered.
    async fn close(&self) {
        self.shared.disregarded.lock().clear();
    }
}

impl BackendEndpoint {
    /// Next request written by the client, or `None` once the transport is gone.
    pub async fn next_request(&mut self) -> Option<RequestFrame> {
        self.requests.recv().await
    }

    pub fn try_next_request(&mut self) -> Option<RequestFrame> {
        self.requests.try_recv().ok()
    }

    /// Send a response back. Returns false if the request was cancelled
    /// (the transport was told to disregard it) or the client is gone.
    pub fn respond(&self, frame: ResponseFrame) -> bool {
        if self.shared.disregarded.lock().remove(&frame.id) {
            tracing::debug!(id = %frame.id, "dropping response for disregarded request");
            return false;
        }
        self.shared
            .inbound
            .get()
            .is_some_and(|sender| sender.response(frame))
    }

    /// Push raw wire text, bypassing decoding. Used to simulate stale or
    /// malformed deliveries.
    pub fn respond_raw(&self, text: impl Into<String>) -> bool {
        self.push(Inbound::Frame(text.into()))
    }

    /// Report that delivery of `id` failed inside the channel.
    pub fn fail(&self, id: CorrelationId, message: impl Into<String>) -> bool {
        self.push(Inbound::Undeliverable {
            id,
            message: message.into(),
        })
    }

    pub fn is_disregarded(&self, id: CorrelationId) -> bool {
        self.shared.disregarded.lock().contains(&id)
    }

    fn push(&self, inbound: Inbound) -> bool {
        self.shared
            .inbound
            .get()
            .is_some_and(|sender| sender.push(inbound))
    }
}
