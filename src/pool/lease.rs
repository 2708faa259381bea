//! Connection leases and the per-lease slot state.

use rand::Rng;
use std::fmt;
use std::sync::{Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;

use crate::pool::manager::LeaseTable;

/// Identifier of a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeaseId(u64);

impl LeaseId {
    /// Random ten-digit id. Callers check for collisions.
    pub fn random() -> Self {
        Self(rand::thread_rng().gen_range(1_000_000_000..2_000_000_000))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lease-{}", self.0)
    }
}

enum SlotState<H> {
    Idle { handle: H, created_at: Instant },
    Leased,
}

/// Result of trying to check a slot out.
pub(crate) enum Checkout<H> {
    Leased { handle: H, created_at: Instant },
    Busy,
    /// The idle handle was found closed. The slot stays marked leased so
    /// nobody else picks it while the caller evicts it.
    Stale(H),
}

/// One pooled connection. Its lock only guards the open/in-use check and
/// is never held across an await.
pub(crate) struct Slot<H> {
    state: Mutex<SlotState<H>>,
}

impl<H> Slot<H> {
    pub(crate) fn leased() -> Self {
        Self {
            state: Mutex::new(SlotState::Leased),
        }
    }

    pub(crate) fn checkout(&self, is_open: impl Fn(&H) -> bool) -> Checkout<H> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, SlotState::Leased) {
            return Checkout::Busy;
        }
        match std::mem::replace(&mut *state, SlotState::Leased) {
            SlotState::Idle { handle, created_at } if is_open(&handle) => {
                Checkout::Leased { handle, created_at }
            }
            SlotState::Idle { handle, .. } => Checkout::Stale(handle),
            SlotState::Leased => Checkout::Busy,
        }
    }

    /// Return a handle to the slot, making it available again.
    pub(crate) fn park(&self, handle: H, created_at: Instant) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = SlotState::Idle { handle, created_at };
    }

    pub(crate) fn is_idle(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(*state, SlotState::Idle { .. })
    }
}

/// Exclusive hold on one connection.
///
/// A lease must go back through [`ConnectionPool::release`](crate::pool::ConnectionPool::release).
/// A pooled lease dropped without release is evicted, since the state of its
/// connection is unknown; dropping the handle closes it.
pub struct ConnectionLease<H> {
    id: Option<LeaseId>,
    handle: Option<H>,
    created_at: Instant,
    table: Weak<LeaseTable<H>>,
}

impl<H> ConnectionLease<H> {
    pub(crate) fn pooled(id: LeaseId, handle: H, created_at: Instant, table: Weak<LeaseTable<H>>) -> Self {
        Self {
            id: Some(id),
            handle: Some(handle),
            created_at,
            table,
        }
    }

    pub(crate) fn unpooled(handle: H) -> Self {
        Self {
            id: None,
            handle: Some(handle),
            created_at: Instant::now(),
            table: Weak::new(),
        }
    }

    /// Pool id; `None` for one-shot leases.
    pub fn id(&self) -> Option<LeaseId> {
        self.id
    }

    pub fn is_pooled(&self) -> bool {
        self.id.is_some()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn handle(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    pub(crate) fn take_handle(&mut self) -> Option<H> {
        self.handle.take()
    }
}

impl<H> fmt::Debug for ConnectionLease<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("released", &self.handle.is_none())
            .finish()
    }
}

impl<H> Drop for ConnectionLease<H> {
    fn drop(&mut self) {
        if self.handle.is_none() {
            return;
        }
        if let (Some(id), Some(table)) = (self.id, self.table.upgrade()) {
            if table.remove(id).is_some() {
                tracing::warn!(lease = %id, "Lease dropped without release, evicted");
            }
        }
    }
}
