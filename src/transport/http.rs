//! HTTP transport: each request frame is POSTed as JSON and the response
//! body is the matching response frame.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::{InboundSender, Transport};
use crate::envelope::{CorrelationId, RequestFrame};
use crate::error::DispatchError;

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    inbound: OnceLock<InboundSender>,
    /// Requests whose POST is still running, keyed for `disregard`.
    tasks: Arc<Mutex<HashMap<CorrelationId, JoinHandle<()>>>>,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Arc<Self> {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            client,
            url: url.into(),
            inbound: OnceLock::new(),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POSTs still running.
    pub fn active_requests(&self) -> usize {
        self.tasks.lock().len()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn attach(&self, inbound: InboundSender) {
        if self.inbound.set(inbound).is_err() {
            tracing::warn!(url = %self.url, "http transport attached twice; keeping the first client");
        }
    }

    async fn write(&self, frame: RequestFrame) -> Result<(), DispatchError> {
        let inbound = self
            .inbound
            .get()
            .cloned()
            .ok_or_else(|| DispatchError::transport("http transport not attached"))?;
        let body = serde_json::to_vec(&frame)
            .map_err(|e| DispatchError::transport(format!("failed to encode request: {e}")))?;

        let id = frame.id;
        let request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let tasks = Arc::clone(&self.tasks);

        // Hold the lock across spawn so the task cannot remove itself first.
        let mut active = self.tasks.lock();
        let handle = tokio::spawn(async move {
            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    match resp.text().await {
                        Ok(text) if status.is_success() => {
                            inbound.frame(text);
                        }
                        Ok(_) => {
                            inbound.undeliverable(id, format!("backend returned HTTP {status}"));
                        }
                        Err(e) => {
                            inbound.undeliverable(id, format!("failed to read response: {e}"));
                        }
                    }
                }
                Err(e) => {
                    inbound.undeliverable(id, format!("request failed: {e}"));
                }
            }
            tasks.lock().remove(&id);
        });
        active.insert(id, handle);
        Ok(())
    }

    fn disregard(&self, id: CorrelationId) {
        if let Some(handle) = self.tasks.lock().remove(&id) {
            handle.abort();
        }
    }

    async fn close(&self) {
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.abort();
        }
    }
}
