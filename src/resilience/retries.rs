//! Retry policy for outbound calls.
//!
//! # Responsibilities
//! - Hold the retry tunables (count, fixed wait, fast-path grace window)
//! - Record each attempt's outcome for the retry decision
//! - Decide whether a failed first attempt earns an immediate retry
//!
//! # Design Decisions
//! - Fixed wait between attempts, no jitter
//! - Only transient failures inside the grace window are fast-pathed
//! - Saturation (no lease available) is retried separately with its own
//!   small budget before it counts as a failed attempt

use std::time::Duration;

use crate::envelope::RawReply;
use crate::net::TransportError;

/// Retry tunables for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one (and after the fast path, if taken).
    pub max_retries: u32,
    /// Fixed sleep before each standard retry.
    pub wait: Duration,
    /// A first attempt that failed transiently within this window is
    /// retried immediately on a fresh connection.
    pub fast_path_grace: Duration,
    /// Tries to obtain a lease while the pool is saturated.
    pub acquire_retries: u32,
    pub acquire_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            wait: Duration::from_millis(100),
            fast_path_grace: Duration::from_millis(10),
            acquire_retries: 10,
            acquire_backoff: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    /// Whether `attempt` qualifies for the immediate fast-path retry.
    pub fn allows_fast_path(&self, attempt: &CallAttempt) -> bool {
        match &attempt.outcome {
            Err(err) => {
                attempt.kind == AttemptKind::Reuse
                    && err.is_transient()
                    && attempt.since_start <= self.fast_path_grace
            }
            Ok(_) => false,
        }
    }
}

/// How the lease for an attempt was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    /// First attempt, reusing an idle pooled connection when possible.
    Reuse,
    /// Immediate retry on a fresh connection.
    FastPath,
    /// Standard retry after the fixed wait.
    Backoff,
}

impl AttemptKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptKind::Reuse => "reuse",
            AttemptKind::FastPath => "fast_path",
            AttemptKind::Backoff => "backoff",
        }
    }

    /// Whether the attempt should prefer an idle pooled lease.
    pub fn prefers_reuse(self) -> bool {
        self == AttemptKind::Reuse
    }
}

/// Outcome of a single attempt. Lives only until the retry decision.
#[derive(Debug)]
pub struct CallAttempt {
    pub number: u32,
    pub kind: AttemptKind,
    /// Time spent in this attempt.
    pub elapsed: Duration,
    /// Time since the call started, measured at the end of this attempt.
    pub since_start: Duration,
    pub outcome: Result<RawReply, TransportError>,
}

impl CallAttempt {
    pub fn failed(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn error(&self) -> Option<&TransportError> {
        self.outcome.as_ref().err()
    }

    pub fn into_outcome(self) -> Result<RawReply, TransportError> {
        self.outcome
    }
}
