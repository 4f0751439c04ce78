//! Scripted transport for tests.
//!
//! `MockTransport` answers from a queue of canned outcomes, falls back to a
//! fixed response once the queue is empty, and records every request it sees.
//! It never touches the network, so code built on top of the client can be
//! tested deterministically:
//!
//! ```rust
//! use std::sync::Arc;
//! use sign_at_core::{fon, ClientConfig, HttpResponse, MockTransport, SignAtClient};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let transport = Arc::new(MockTransport::new());
//! transport.push_response(HttpResponse::new(200, r#"{"authenticated":true}"#));
//!
//! let client = SignAtClient::new(ClientConfig::default(), transport.clone());
//! let op = fon::authenticate("token", sign_at_core::payload(serde_json::json!({
//!     "fon_participant_id": "p", "fon_user_id": "u", "fon_user_pin": "pin",
//! })));
//! let response = client.invoke(op).await.unwrap();
//!
//! assert_eq!(response.body["authenticated"], true);
//! assert_eq!(transport.request_count(), 1);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Transport, TransportError, TransportErrorKind};

type Outcome = Result<HttpResponse, TransportError>;

#[derive(Debug, Default)]
pub struct MockTransport {
    queue: Mutex<VecDeque<Outcome>>,
    fallback: Option<Outcome>,
    delay: Option<Duration>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with `response` whenever the queue is empty.
    pub fn with_fallback(mut self, response: HttpResponse) -> Self {
        self.fallback = Some(Ok(response));
        self
    }

    /// Fail with `error` whenever the queue is empty.
    pub fn with_fallback_error(mut self, error: TransportError) -> Self {
        self.fallback = Some(Err(error));
        self
    }

    /// Sleep before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_response(&self, response: HttpResponse) {
        lock(&self.queue).push_back(Ok(response));
    }

    pub fn push_error(&self, error: TransportError) {
        lock(&self.queue).push_back(Err(error));
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

// A panicking test thread must not hide the recorded requests from the rest.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(
        &self,
        request: &HttpRequest,
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = lock(&self.queue).pop_front();
        match next.or_else(|| self.fallback.clone()) {
            Some(outcome) => outcome,
            None => Err(TransportError::new(
                TransportErrorKind::Connect,
                format!("no scripted response for {} {}", request.method, request.url),
            )),
        }
    }
}
