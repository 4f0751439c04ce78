//! Transport seam between the core and the network.
//!
//! # Design
//! The core never opens sockets itself. A `Transport` takes a prepared
//! `HttpRequest` plus the configured deadline and returns whatever status and
//! body came back; 4xx and 5xx are data, not errors. `TransportError` is
//! reserved for exchanges where no status was received at all.
//!
//! `UreqTransport` is the bundled implementation. ureq is blocking, so each
//! call runs on tokio's blocking pool; the client's own timeout and
//! cancellation race against it and simply drop the join handle when they
//! win.

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes prepared requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one round trip. Implementations should give up after
    /// `timeout`; the client enforces the same deadline on its side.
    async fn execute(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// Why no response was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// DNS, TCP, or TLS setup failed.
    Connect,
    /// The deadline elapsed before a response arrived.
    Timeout,
    /// The caller cancelled the invocation.
    Cancelled,
    /// The connection broke mid-exchange.
    Io,
    /// The request could not be put on the wire (e.g. an invalid header).
    Request,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::Io => "io",
            TransportErrorKind::Request => "request",
        })
    }
}

/// Network-level failure reported by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct TransportError {
    kind: TransportErrorKind,
    detail: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("no response within {} ms", after.as_millis()),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "cancelled by caller")
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        let kind = match &err {
            ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
            ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => {
                TransportErrorKind::Connect
            }
            ureq::Error::Io(io_err) => match io_err.kind() {
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportErrorKind::Timeout,
                io::ErrorKind::ConnectionRefused
                | io::ErrorKind::AddrNotAvailable
                | io::ErrorKind::NotConnected => TransportErrorKind::Connect,
                _ => TransportErrorKind::Io,
            },
            _ => TransportErrorKind::Request,
        };
        TransportError::new(kind, err.to_string())
    }
}

/// Blocking ureq client driven from tokio's blocking pool.
///
/// Non-2xx statuses are returned as responses so the response handler can
/// classify them. One agent is shared by every call (and every clone), so
/// keep-alive connections are pooled; the deadline is set per request.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    fn execute_blocking(
        agent: &ureq::Agent,
        request: HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Put => agent.put(&request.url),
            HttpMethod::Patch => agent.patch(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let builder = builder.config().timeout_global(Some(timeout)).build();
        let body = request.body.unwrap_or_else(|| "{}".to_string());

        let mut response = builder.send(body.as_bytes())?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response.body_mut().read_to_vec()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn execute(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "ureq round trip");
        let request = request.clone();
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || Self::execute_blocking(&agent, request, timeout))
            .await
            .map_err(|e| {
                TransportError::new(TransportErrorKind::Io, format!("transport task failed: {e}"))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Minimal keep-alive HTTP/1.1 peer answering `{}` to every request.
    /// Returns its address and the number of connections it has accepted.
    fn keep_alive_server() -> (std::net::SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::spawn(move || {
                    let mut writer = stream.try_clone().unwrap();
                    let mut reader = BufReader::new(stream);
                    loop {
                        let mut content_length = 0usize;
                        let mut line = String::new();
                        // request line and headers
                        loop {
                            line.clear();
                            if reader.read_line(&mut line).unwrap_or(0) == 0 {
                                return;
                            }
                            if line == "\r\n" {
                                break;
                            }
                            let lower = line.to_ascii_lowercase();
                            if let Some(value) = lower.strip_prefix("content-length:") {
                                content_length = value.trim().parse().unwrap_or(0);
                            }
                        }
                        let mut body = vec![0u8; content_length];
                        if reader.read_exact(&mut body).is_err() {
                            return;
                        }
                        let reply = "HTTP/1.1 200 OK\r\n\
                            Content-Type: application/json\r\n\
                            Content-Length: 2\r\n\r\n{}";
                        if writer.write_all(reply.as_bytes()).is_err() {
                            return;
                        }
                    }
                });
            }
        });

        (addr, accepted)
    }

    #[test]
    fn error_display_includes_kind() {
        let err = TransportError::new(TransportErrorKind::Connect, "connection refused");
        assert_eq!(err.to_string(), "connect: connection refused");
    }

    #[test]
    fn timeout_constructor_mentions_deadline() {
        let err = TransportError::timeout(Duration::from_millis(250));
        assert_eq!(err.kind(), TransportErrorKind::Timeout);
        assert!(err.detail().contains("250 ms"));
    }

    #[test]
    fn io_refused_maps_to_connect() {
        let err: TransportError =
            ureq::Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")).into();
        assert_eq!(err.kind(), TransportErrorKind::Connect);
    }

    #[test]
    fn io_timed_out_maps_to_timeout() {
        let err: TransportError =
            ureq::Error::Io(io::Error::new(io::ErrorKind::TimedOut, "slow")).into();
        assert_eq!(err.kind(), TransportErrorKind::Timeout);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sequential_calls_reuse_the_pooled_connection() {
        let (addr, accepted) = keep_alive_server();
        let transport = UreqTransport::new();
        let request = HttpRequest {
            method: HttpMethod::Put,
            url: format!("http://{addr}/fon/auth"),
            headers: Vec::new(),
            body: Some("{}".to_string()),
        };

        for _ in 0..3 {
            let response = transport
                .execute(&request, Duration::from_secs(2))
                .await
                .unwrap();
            assert_eq!(response.status, 200);
            assert_eq!(response.body, b"{}");
        }
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn per_request_deadline_applies_on_shared_agent() {
        // Accepts into the backlog but never answers.
        let silent = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = silent.local_addr().unwrap();
        let request = HttpRequest {
            method: HttpMethod::Patch,
            url: format!("http://{addr}/cash-register/cr-1"),
            headers: Vec::new(),
            body: Some("{}".to_string()),
        };

        let err = UreqTransport::new()
            .execute(&request, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Timeout, "{err:?}");
        drop(silent);
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = HttpRequest {
            method: HttpMethod::Put,
            url: format!("http://{addr}/fon/auth"),
            headers: Vec::new(),
            body: Some("{}".to_string()),
        };
        let err = UreqTransport::new()
            .execute(&request, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(
            matches!(err.kind(), TransportErrorKind::Connect | TransportErrorKind::Io),
            "unexpected kind: {err:?}"
        );
    }
}
