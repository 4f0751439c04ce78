//! The invoking client.
//!
//! # Design
//! `SignAtClient` owns the read-only configuration and a shared transport,
//! and runs the fixed invocation sequence: validate, build, execute, handle.
//! It keeps no per-call state, so one client can drive any number of
//! concurrent operations.
//!
//! The transport call is the only await point. It is bounded by the
//! configured timeout (enforced here even if a transport ignores the deadline
//! it is given) and raced against an optional caller-supplied cancellation
//! future. Either one winning yields a `TransportError`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::operation::Operation;
use crate::response::handle_response;
use crate::transport::{Transport, TransportError, UreqTransport};

#[derive(Clone)]
pub struct SignAtClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl SignAtClient {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Client backed by the bundled blocking ureq transport.
    pub fn with_ureq(config: ClientConfig) -> Self {
        Self::new(config, Arc::new(UreqTransport::new()))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run `operation` to completion.
    pub async fn invoke(&self, operation: Operation) -> ApiResult {
        self.invoke_with_cancel(operation, std::future::pending::<()>())
            .await
    }

    /// Run `operation`, abandoning the transport call as soon as `cancel`
    /// resolves.
    ///
    /// Validation failures are returned before `cancel` is ever polled.
    pub async fn invoke_with_cancel<C>(&self, operation: Operation, cancel: C) -> ApiResult
    where
        C: Future<Output = ()>,
    {
        let name = operation.endpoint().name;
        let prepared = operation.prepare(&self.config).map_err(|err| {
            warn!(operation = name, kind = %err.kind(), error = %err, "rejected before sending");
            err
        })?;

        let request = prepared.request();
        let timeout = self.config.timeout();
        let started = Instant::now();

        let call = tokio::time::timeout(timeout, self.transport.execute(request, timeout));
        let outcome = tokio::select! {
            biased;
            _ = cancel => Err(TransportError::cancelled()),
            result = call => result.unwrap_or_else(|_| Err(TransportError::timeout(timeout))),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    operation = name,
                    method = %request.method,
                    elapsed_ms,
                    error = %err,
                    "no response"
                );
                return Err(ApiError::from(err));
            }
        };

        let status = response.status;
        let result = handle_response(response);
        match &result {
            Ok(_) => info!(
                operation = name,
                method = %request.method,
                status,
                elapsed_ms,
                "completed"
            ),
            Err(err) => warn!(
                operation = name,
                method = %request.method,
                status,
                elapsed_ms,
                kind = %err.kind(),
                error = %err,
                "failed"
            ),
        }
        result
    }
}

impl std::fmt::Debug for SignAtClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignAtClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
