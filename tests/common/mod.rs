//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use protocol_adapter::config::{ClientConfig, ServerConfig};
use protocol_adapter::lifecycle::Shutdown;
use protocol_adapter::pool::{ConnectionPool, PoolSettings};
use protocol_adapter::server::{AdapterServer, Dispatcher};
use protocol_adapter::{RawReply, RequestEnvelope, Status, Transport, TransportError};

/// Connection handed out by [`ScriptedTransport`].
#[derive(Debug)]
pub struct MockHandle {
    pub id: usize,
    open: bool,
}

#[derive(Default)]
struct Inner {
    opens: AtomicUsize,
    closes: AtomicUsize,
    calls: AtomicUsize,
    next_handle: AtomicUsize,
    replies: Mutex<VecDeque<Result<RawReply, TransportError>>>,
    open_failures: Mutex<VecDeque<TransportError>>,
    open_delay: Mutex<Duration>,
    call_delay: Mutex<Duration>,
    served_by: Mutex<Vec<usize>>,
    closed_remotely: Mutex<HashSet<usize>>,
}

/// In-memory transport with scripted replies and counters.
///
/// Calls without a scripted reply succeed with [`ok_reply`].
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, reply: RawReply) {
        self.inner.replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn push_error(&self, err: TransportError) {
        self.inner.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn fail_next_open(&self, err: TransportError) {
        self.inner.open_failures.lock().unwrap().push_back(err);
    }

    pub fn set_open_delay(&self, delay: Duration) {
        *self.inner.open_delay.lock().unwrap() = delay;
    }

    pub fn set_call_delay(&self, delay: Duration) {
        *self.inner.call_delay.lock().unwrap() = delay;
    }

    /// Simulate the peer dropping connection `id`.
    pub fn close_remotely(&self, id: usize) {
        self.inner.closed_remotely.lock().unwrap().insert(id);
    }

    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Handle id that served each call, in order.
    pub fn served_by(&self) -> Vec<usize> {
        self.inner.served_by.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    type Handle = MockHandle;

    async fn open(
        &self,
        _address: &str,
        _connect_timeout: Duration,
        _io_timeout: Duration,
    ) -> Result<MockHandle, TransportError> {
        let delay = *self.inner.open_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.inner.open_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        let id = self.inner.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MockHandle { id, open: true })
    }

    fn is_open(&self, handle: &MockHandle) -> bool {
        handle.open && !self.inner.closed_remotely.lock().unwrap().contains(&handle.id)
    }

    async fn close(&self, _handle: MockHandle) {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
    }

    async fn round_trip(
        &self,
        handle: &mut MockHandle,
        _request: &RequestEnvelope,
    ) -> Result<RawReply, TransportError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.served_by.lock().unwrap().push(handle.id);

        let delay = *self.inner.call_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.inner.replies.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(err)) => {
                handle.open = false;
                Err(err)
            }
            None => Ok(ok_reply("[]")),
        }
    }
}

pub fn ok_reply(content: &str) -> RawReply {
    RawReply {
        status: Some(Status::Ok),
        code: Some(200),
        message: "ok".to_string(),
        content: content.to_string(),
        ..RawReply::default()
    }
}

pub fn settings(capacity: usize, max_age: Duration) -> PoolSettings {
    PoolSettings {
        address: "peer:9000".to_string(),
        capacity,
        max_age,
        connect_timeout: Duration::from_secs(1),
        io_timeout: Duration::from_secs(1),
    }
}

pub fn pool(transport: &ScriptedTransport, capacity: usize) -> ConnectionPool<ScriptedTransport> {
    ConnectionPool::new(transport.clone(), settings(capacity, Duration::from_secs(600)))
}

pub fn client_config(capacity: usize) -> ClientConfig {
    ClientConfig {
        address: "peer:9000".to_string(),
        timeout_ms: 1_000,
        max_connections: capacity,
        max_retry: 3,
        wait_to_retry_ms: 100,
        fast_path_grace_ms: 10,
        ..ClientConfig::default()
    }
}

/// Start an adapter server on an ephemeral port.
pub async fn spawn_server(dispatcher: Dispatcher) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let config = ServerConfig {
        bind_address: addr.to_string(),
        hostname: "test-node".to_string(),
        ..ServerConfig::default()
    };
    let server = AdapterServer::new(Arc::new(dispatcher), config);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    (addr, shutdown)
}
