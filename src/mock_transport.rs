//! Mock transport for testing
//!
//! [`MockTransport`] implements both [`Transport`] and [`AsyncTransport`]
//! without touching the network. It answers with a scripted outcome (a
//! response or a transport failure) and records every request it receives, so
//! code built on [`BitbankerClient`](crate::BitbankerClient) or
//! [`AsyncBitbankerClient`](crate::AsyncBitbankerClient) can be tested in
//! isolation.
//!
//! # Examples
//!
//! ```rust
//! use bitbanker_sdk::mock_transport::MockTransport;
//! use bitbanker_sdk::{BitbankerClient, Currency, InvoiceData};
//!
//! let transport = MockTransport::new();
//! let client = BitbankerClient::with_transport("key", transport.clone());
//!
//! let invoice = InvoiceData::new(vec![Currency::Btc], 1000, "invoice", "header").unwrap();
//! let response = client.create_invoice(&invoice).unwrap();
//! assert_eq!(response.result(), "success");
//!
//! let request = transport.last_request().unwrap();
//! assert_eq!(request.path, "/v1/invoices");
//! assert_eq!(request.body["amount"], 1000.0);
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::mocks::sample_invoice_response;
use crate::transport::{AsyncTransport, Transport, TransportError, TransportResponse};

/// A request captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub path: String,
    pub body: Value,
}

#[derive(Debug, Clone)]
enum MockOutcome {
    Respond(TransportResponse),
    Fail(String),
}

impl MockOutcome {
    fn resolve(self) -> Result<TransportResponse, TransportError> {
        match self {
            MockOutcome::Respond(response) => Ok(response),
            MockOutcome::Fail(message) => Err(TransportError::new(io::Error::new(
                io::ErrorKind::Other,
                message,
            ))),
        }
    }
}

#[derive(Debug)]
struct MockTransportInner {
    queued: Mutex<VecDeque<MockOutcome>>,
    fallback: Mutex<MockOutcome>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Scripted, recording transport. Clones share state.
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<MockTransportInner>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Creates a transport that answers every request with a 200 and the
    /// sample invoice body from [`sample_invoice_response`].
    #[must_use]
    pub fn new() -> Self {
        let fallback = MockOutcome::Respond(TransportResponse::new(
            200,
            sample_invoice_response().to_string(),
        ));
        Self {
            inner: Arc::new(MockTransportInner {
                queued: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(fallback),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Answers every request with `status` and a raw `body`.
    #[must_use]
    pub fn with_response(self, status: u16, body: impl Into<String>) -> Self {
        *lock(&self.inner.fallback) = MockOutcome::Respond(TransportResponse::new(status, body));
        self
    }

    /// Answers every request with `status` and a JSON `body`.
    #[must_use]
    pub fn with_json(self, status: u16, body: &Value) -> Self {
        self.with_response(status, body.to_string())
    }

    /// Fails every request as if the network were unreachable.
    #[must_use]
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        *lock(&self.inner.fallback) = MockOutcome::Fail(message.into());
        self
    }

    /// Queues a one-shot response used before the default outcome.
    pub fn push_response(&self, status: u16, body: impl Into<String>) {
        lock(&self.inner.queued)
            .push_back(MockOutcome::Respond(TransportResponse::new(status, body)));
    }

    /// Queues a one-shot transport failure used before the default outcome.
    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.inner.queued).push_back(MockOutcome::Fail(message.into()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.inner.requests).clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.inner.requests).last().cloned()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.inner.requests).len()
    }

    fn respond(&self, path: &str, body: &Value) -> Result<TransportResponse, TransportError> {
        lock(&self.inner.requests).push(RecordedRequest {
            path: path.to_string(),
            body: body.clone(),
        });
        let queued = lock(&self.inner.queued).pop_front();
        let outcome = match queued {
            Some(outcome) => outcome,
            None => lock(&self.inner.fallback).clone(),
        };
        outcome.resolve()
    }
}

impl Transport for MockTransport {
    fn post(&self, path: &str, body: &Value) -> Result<TransportResponse, TransportError> {
        self.respond(path, body)
    }
}

#[async_trait]
impl AsyncTransport for MockTransport {
    async fn post(&self, path: &str, body: &Value) -> Result<TransportResponse, TransportError> {
        self.respond(path, body)
    }
}
