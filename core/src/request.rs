//! Request construction.
//!
//! # Design
//! `RequestBuilder` turns an endpoint's method and path template, the path
//! identifiers, the bearer token, and an already validated payload into an
//! `HttpRequest`. It performs no I/O and never looks at the environment; the
//! base URL and user agent come from the `ClientConfig` it borrows.

use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};
use crate::types::Payload;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Substitute every `{name}` placeholder in `template` with the matching
/// value from `params`, percent-encoded as a single path segment.
///
/// A placeholder without a value (or with an empty one) is reported as a
/// missing required field named after the placeholder.
pub fn render_path(template: &str, params: &[(&str, String)]) -> Result<String, ApiError> {
    let mut rendered = String::with_capacity(template.len() + 48);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|offset| open + offset) else {
            break;
        };
        rendered.push_str(&rest[..open]);

        let name = &rest[open + 1..close];
        let value = params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ApiError::missing(name))?;
        rendered.push_str(&urlencoding::encode(value));

        rest = &rest[close + 1..];
    }
    rendered.push_str(rest);

    Ok(rendered)
}

/// Builds requests against the configured base URL.
#[derive(Debug, Clone, Copy)]
pub struct RequestBuilder<'a> {
    config: &'a ClientConfig,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(config: &'a ClientConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        method: HttpMethod,
        template: &str,
        params: &[(&str, String)],
        token: &str,
        payload: &Payload,
    ) -> Result<HttpRequest, ApiError> {
        let path = render_path(template, params)?;

        // PUT and PATCH always carry a body; an empty payload is sent as `{}`.
        let body = Value::Object(payload.clone()).to_string();

        Ok(HttpRequest {
            method,
            url: format!("{}{path}", self.config.base_url()),
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {token}")),
                ("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string()),
                ("Accept".to_string(), JSON_CONTENT_TYPE.to_string()),
                ("User-Agent".to_string(), self.config.user_agent().to_string()),
            ],
            body: Some(body),
        })
    }
}
