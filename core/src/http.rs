//! HTTP request and response descriptors.
//!
//! # Design
//! Requests and responses are plain data. `Operation::prepare` produces an
//! `HttpRequest` without touching the network, and `handle_response` consumes
//! an `HttpResponse` without touching the network. Whatever sits in between
//! (the bundled `UreqTransport`, a test double, or a host application doing
//! its own I/O) only has to move bytes.
//!
//! Every action on the SIGN AT surface is an upsert against a caller-chosen
//! id, so only `PUT` and `PATCH` exist here and both always carry a body.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// Idempotent create-or-replace.
    Put,
    /// Partial update, used for state transitions.
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Both verbs target a caller-chosen resource id, so replaying the same
    /// request converges on the same server state.
    pub fn is_idempotent(&self) -> bool {
        true
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully specified HTTP request.
///
/// `url` is absolute (base URL plus the rendered path). Header names are
/// stored as they are sent; use [`HttpRequest::header`] for a
/// case-insensitive lookup.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

// Manual impl so the bearer token never ends up in logs or panic messages.
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(key, value)| {
                if key.eq_ignore_ascii_case("authorization") {
                    (key.as_str(), "Bearer <redacted>")
                } else {
                    (key.as_str(), value.as_str())
                }
            })
            .collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body", &self.body)
            .finish()
    }
}

/// A completed HTTP exchange as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Lossy UTF-8 view of the body, for diagnostics.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
