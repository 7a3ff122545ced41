//! Channel abstraction between the dispatch client and a backend.
//!
//! A transport only moves frames. Correlation, timeouts and settlement all
//! live in [`crate::dispatcher`].

pub mod channel;
pub mod http;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::envelope::{CorrelationId, RequestFrame, ResponseFrame};
use crate::error::DispatchError;

/// Traffic flowing from a transport back into the dispatch client.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Raw wire text, decoded by the client.
    Frame(String),
    /// A frame the transport already decoded.
    Response(ResponseFrame),
    /// The channel accepted the request but could not complete delivery.
    Undeliverable { id: CorrelationId, message: String },
}

/// Handle a transport uses to push inbound traffic. Cheap to clone.
#[derive(Debug, Clone)]
pub struct InboundSender {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl InboundSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Inbound>) -> Self {
        Self { tx }
    }

    /// Returns false once the dispatch client has shut down.
    pub fn push(&self, inbound: Inbound) -> bool {
        self.tx.send(inbound).is_ok()
    }

    pub fn frame(&self, text: impl Into<String>) -> bool {
        self.push(Inbound::Frame(text.into()))
    }

    pub fn response(&self, frame: ResponseFrame) -> bool {
        self.push(Inbound::Response(frame))
    }

    pub fn undeliverable(&self, id: CorrelationId, message: impl Into<String>) -> bool {
        self.push(Inbound::Undeliverable {
            id,
            message: message.into(),
        })
    }
}

/// A bidirectional channel to the backend.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Called once by the dispatch client before the first write.
    fn attach(&self, inbound: InboundSender);

    /// Hand one framed request to the channel. An `Err` settles the request
    /// with a transport error; delivery failures after hand-off are reported
    /// through [`Inbound::Undeliverable`].
    async fn write(&self, frame: RequestFrame) -> Result<(), DispatchError>;

    /// The request was cancelled; its eventual response may be discarded.
    fn disregard(&self, _id: CorrelationId) {}

    /// Release channel resources. Called during client shutdown.
    async fn close(&self) {}
}
