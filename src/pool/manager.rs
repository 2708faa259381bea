//! Bounded pool of persistent connections to one peer.
//!
//! # Responsibilities
//! - Hand out exclusive leases, reusing idle connections first
//! - Register new connections under collision-checked random ids
//! - Retire broken connections and replace aged ones on release
//!
//! # Design Decisions
//! - The table lock guards membership only; each slot has its own lock
//! - Transport I/O (open, close) always happens with no lock held
//! - Saturation is reported as `Ok(None)`, the caller decides to wait

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::net::{Transport, TransportError};
use crate::observability::metrics;
use crate::pool::lease::{Checkout, ConnectionLease, LeaseId, Slot};

/// Membership table shared by the pool and its outstanding leases.
pub struct LeaseTable<H> {
    slots: Mutex<HashMap<LeaseId, Arc<Slot<H>>>>,
}

impl<H> LeaseTable<H> {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<LeaseId, Arc<Slot<H>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current members, ordered by id so scans are deterministic.
    fn snapshot(&self) -> Vec<(LeaseId, Arc<Slot<H>>)> {
        let mut members: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();
        members.sort_by_key(|(id, _)| *id);
        members
    }

    /// Insert `slot` under a fresh id if the table has room.
    fn register(&self, capacity: usize, slot: Arc<Slot<H>>) -> Option<LeaseId> {
        let mut slots = self.lock();
        if capacity == 0 || slots.len() >= capacity {
            return None;
        }
        let id = loop {
            let candidate = LeaseId::random();
            if !slots.contains_key(&candidate) {
                break candidate;
            }
        };
        slots.insert(id, slot);
        metrics::record_pool_size(slots.len());
        Some(id)
    }

    pub(crate) fn remove(&self, id: LeaseId) -> Option<Arc<Slot<H>>> {
        let mut slots = self.lock();
        let removed = slots.remove(&id);
        if removed.is_some() {
            metrics::record_pool_size(slots.len());
        }
        removed
    }

    fn get(&self, id: LeaseId) -> Option<Arc<Slot<H>>> {
        self.lock().get(&id).cloned()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn idle_count(&self) -> usize {
        self.snapshot().iter().filter(|(_, slot)| slot.is_idle()).count()
    }
}

/// Connection settings for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub address: String,
    /// Maximum pooled connections. `0` pools nothing.
    pub capacity: usize,
    /// Connections older than this are replaced on release.
    pub max_age: Duration,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            address: config.address.clone(),
            capacity: config.max_connections,
            max_age: config.max_age(),
            connect_timeout: config.timeout(),
            io_timeout: config.timeout(),
        }
    }
}

/// Pool of leases over a [`Transport`].
pub struct ConnectionPool<T: Transport> {
    transport: T,
    settings: PoolSettings,
    table: Arc<LeaseTable<T::Handle>>,
}

impl<T: Transport> ConnectionPool<T> {
    pub fn new(transport: T, settings: PoolSettings) -> Self {
        Self {
            transport,
            settings,
            table: Arc::new(LeaseTable::new()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Obtain a lease.
    ///
    /// With `prefer_reuse`, the first idle open connection is returned;
    /// idle connections found closed are evicted on the way. When nothing is
    /// idle and the pool is full, returns `Ok(None)`. Otherwise a new
    /// connection is opened and pooled if there is room, or handed out as a
    /// one-shot lease if not.
    pub async fn acquire(
        &self,
        prefer_reuse: bool,
    ) -> Result<Option<ConnectionLease<T::Handle>>, TransportError> {
        if prefer_reuse {
            for (id, slot) in self.table.snapshot() {
                match slot.checkout(|handle| self.transport.is_open(handle)) {
                    Checkout::Leased { handle, created_at } => {
                        tracing::trace!(lease = %id, "Reusing pooled connection");
                        return Ok(Some(ConnectionLease::pooled(
                            id,
                            handle,
                            created_at,
                            Arc::downgrade(&self.table),
                        )));
                    }
                    Checkout::Busy => continue,
                    Checkout::Stale(handle) => {
                        self.table.remove(id);
                        tracing::debug!(lease = %id, "Evicting closed idle connection");
                        self.transport.close(handle).await;
                    }
                }
            }

            if !self.has_room() {
                return Ok(None);
            }
        }

        self.create().await.map(Some)
    }

    /// Open a new connection, pooling it when there is room.
    pub async fn create(&self) -> Result<ConnectionLease<T::Handle>, TransportError> {
        let handle = self.open().await?;
        let slot = Arc::new(Slot::leased());
        match self.table.register(self.settings.capacity, slot) {
            Some(id) => {
                tracing::debug!(lease = %id, address = %self.settings.address, "Pooled new connection");
                Ok(ConnectionLease::pooled(
                    id,
                    handle,
                    Instant::now(),
                    Arc::downgrade(&self.table),
                ))
            }
            None => Ok(ConnectionLease::unpooled(handle)),
        }
    }

    /// Give a lease back.
    ///
    /// A lease released with an error is closed and removed for good. A lease
    /// at or past the max age is closed and replaced under the same id. An
    /// unpooled lease is closed.
    pub async fn release(&self, mut lease: ConnectionLease<T::Handle>, error: Option<&TransportError>) {
        let Some(handle) = lease.take_handle() else {
            return;
        };
        let Some(id) = lease.id() else {
            self.transport.close(handle).await;
            return;
        };

        if let Some(err) = error {
            self.table.remove(id);
            tracing::warn!(lease = %id, error = %err, "Connection broken, removed from pool");
            self.transport.close(handle).await;
            return;
        }

        let Some(slot) = self.table.get(id) else {
            // Evicted while leased.
            self.transport.close(handle).await;
            return;
        };

        if lease.age() < self.settings.max_age {
            slot.park(handle, lease.created_at());
            return;
        }

        tracing::debug!(lease = %id, age = ?lease.age(), "Connection reached max age, replacing");
        let mut pending = PendingReplacement {
            table: &self.table,
            id,
            armed: true,
        };
        self.transport.close(handle).await;
        match self.open().await {
            Ok(fresh) => {
                slot.park(fresh, Instant::now());
                pending.armed = false;
            }
            Err(e) => {
                tracing::warn!(lease = %id, error = %e, "Failed to replace aged connection, evicted");
            }
        }
    }

    /// Remove a lease from the pool. Returns whether it was a member.
    pub fn evict(&self, id: LeaseId) -> bool {
        self.table.remove(id).is_some()
    }

    /// Number of pooled connections, leased or idle.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn idle(&self) -> usize {
        self.table.idle_count()
    }

    pub fn capacity(&self) -> usize {
        self.settings.capacity
    }

    /// Whether a new connection may be opened. Capacity `0` never blocks
    /// creation; such connections are simply not pooled.
    pub fn has_room(&self) -> bool {
        self.settings.capacity == 0 || self.table.len() < self.settings.capacity
    }

    async fn open(&self) -> Result<T::Handle, TransportError> {
        self.transport
            .open(
                &self.settings.address,
                self.settings.connect_timeout,
                self.settings.io_timeout,
            )
            .await
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for ConnectionPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("transport", &self.transport)
            .field("settings", &self.settings)
            .field("len", &self.len())
            .finish()
    }
}

/// Evicts a slot whose replacement was never parked, e.g. when the
/// releasing task is cancelled mid-reopen.
struct PendingReplacement<'a, H> {
    table: &'a LeaseTable<H>,
    id: LeaseId,
    armed: bool,
}

impl<H> Drop for PendingReplacement<'_, H> {
    fn drop(&mut self) {
        if self.armed {
            self.table.remove(self.id);
        }
    }
}
