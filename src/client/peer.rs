//! Pooled, retrying client for one remote peer.
//!
//! # Responsibilities
//! - Run each call on a leased connection under one deadline
//! - Retry: one fast-path attempt for transient failures, then fixed waits
//! - Normalize replies into the shared envelope
//!
//! # Design Decisions
//! - The first attempt reuses an idle connection; retries force a new one
//! - A saturated pool is retried briefly before it counts as a failure
//! - Exhaustion is reported as an ERROR envelope, never a panic

use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;

use crate::client::error::InvokeError;
use crate::config::ClientConfig;
use crate::envelope::response::INVALID_RESPONSE;
use crate::envelope::{RawReply, RequestEnvelope, ResponseEnvelope, Status};
use crate::net::{PeerTransport, Transport, TransportError};
use crate::observability::metrics;
use crate::pool::{ConnectionLease, ConnectionPool, PoolSettings};
use crate::resilience::timeouts::with_deadline;
use crate::resilience::{AttemptKind, CallAttempt, RetryPolicy};

/// Client for one peer over transport `T`.
///
/// [`PeerClient::from_config`] picks the transport from `client.protocol`.
pub struct PeerClient<T: Transport> {
    pool: ConnectionPool<T>,
    policy: RetryPolicy,
    call_timeout: Duration,
}

impl PeerClient<PeerTransport> {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(PeerTransport::from_config(config), config)
    }
}

impl<T: Transport> PeerClient<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self {
            pool: ConnectionPool::new(transport, PoolSettings::from_config(config)),
            policy: config.retry_policy(),
            call_timeout: config.timeout(),
        }
    }

    pub fn from_pool(pool: ConnectionPool<T>, policy: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            pool,
            policy,
            call_timeout,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn pool(&self) -> &ConnectionPool<T> {
        &self.pool
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call the peer. Failures come back as an ERROR envelope whose message
    /// names the last failure and the path.
    pub async fn invoke(&self, request: &RequestEnvelope) -> ResponseEnvelope {
        match self.try_invoke(request).await {
            Ok(reply) => reply.normalize(),
            Err(err) => ResponseEnvelope::error(
                Status::Error,
                "",
                format!("{}: {err}", self.pool.transport().failure_label()),
            ),
        }
    }

    /// Like [`invoke`](Self::invoke), decoding the payload as `D`.
    pub async fn invoke_as<D: DeserializeOwned>(&self, request: &RequestEnvelope) -> ResponseEnvelope<D> {
        let envelope = self.invoke(request).await;
        let total = envelope.total;
        envelope.into_typed().unwrap_or_else(|e| {
            ResponseEnvelope::error(
                Status::Error,
                INVALID_RESPONSE,
                format!("Response Data Error: {e}"),
            )
            .with_total(total)
        })
    }

    /// Call the peer and return the raw reply, or the last failure once
    /// every retry is spent.
    pub async fn try_invoke(&self, request: &RequestEnvelope) -> Result<RawReply, InvokeError> {
        let outbound = request.for_outbound();
        let started = Instant::now();

        let mut number = 1;
        let mut last = self.attempt(&outbound, AttemptKind::Reuse, number, started).await;

        if self.policy.allows_fast_path(&last) {
            number += 1;
            metrics::record_retry(AttemptKind::FastPath.as_str());
            tracing::debug!(path = %outbound.path, "Transient failure, retrying at once on a new connection");
            last = self.attempt(&outbound, AttemptKind::FastPath, number, started).await;
        }

        let mut remaining = self.policy.max_retries;
        while last.failed() && remaining > 0 {
            tokio::time::sleep(self.policy.wait).await;
            remaining -= 1;
            number += 1;
            metrics::record_retry(AttemptKind::Backoff.as_str());
            last = self.attempt(&outbound, AttemptKind::Backoff, number, started).await;
        }

        last.into_outcome().map_err(|source| {
            tracing::warn!(
                path = %outbound.path,
                attempts = number,
                error = %source,
                "Call failed after all retries"
            );
            InvokeError {
                path: outbound.path.clone(),
                attempts: number,
                source,
            }
        })
    }

    async fn attempt(
        &self,
        request: &RequestEnvelope,
        kind: AttemptKind,
        number: u32,
        started: Instant,
    ) -> CallAttempt {
        let attempt_started = Instant::now();
        let outcome = self.call_once(request, kind.prefers_reuse()).await;
        let attempt = CallAttempt {
            number,
            kind,
            elapsed: attempt_started.elapsed(),
            since_start: started.elapsed(),
            outcome,
        };

        match attempt.error() {
            None => metrics::record_call_attempt(kind.as_str(), "ok"),
            Some(err) => {
                tracing::debug!(
                    path = %request.path,
                    attempt = number,
                    kind = kind.as_str(),
                    error = %err,
                    transient = err.is_transient(),
                    elapsed_ms = attempt.elapsed.as_millis() as u64,
                    "Call attempt failed"
                );
                metrics::record_call_attempt(kind.as_str(), err.kind());
            }
        }
        attempt
    }

    /// One lease + round trip, bounded by the call timeout.
    async fn call_once(&self, request: &RequestEnvelope, prefer_reuse: bool) -> Result<RawReply, TransportError> {
        let deadline = Instant::now() + self.call_timeout;
        let mut lease = with_deadline(deadline, self.call_timeout, self.lease(&request.path, prefer_reuse)).await?;

        let result = match lease.handle_mut() {
            Some(handle) => {
                with_deadline(
                    deadline,
                    self.call_timeout,
                    self.pool.transport().round_trip(handle, request),
                )
                .await
            }
            None => Err(TransportError::NotOpen),
        };

        self.pool.release(lease, result.as_ref().err()).await;
        result
    }

    /// Acquire a lease, waiting briefly while the pool is saturated.
    async fn lease(&self, path: &str, prefer_reuse: bool) -> Result<ConnectionLease<T::Handle>, TransportError> {
        for tried in 0..=self.policy.acquire_retries {
            if let Some(lease) = self.pool.acquire(prefer_reuse).await? {
                return Ok(lease);
            }
            if tried < self.policy.acquire_retries {
                tokio::time::sleep(self.policy.acquire_backoff).await;
            }
        }

        tracing::warn!(path, capacity = self.pool.capacity(), "Connection pool is overloaded");
        Err(TransportError::Overloaded {
            path: path.to_string(),
        })
    }
}
