//! Transport chosen at runtime from `client.protocol`.

use std::time::Duration;

use crate::config::{ClientConfig, Protocol};
use crate::envelope::{RawReply, RequestEnvelope};
use crate::net::http::{HttpHandle, HttpTransport};
use crate::net::transport::{Transport, TransportError};
use crate::net::websocket::{WsHandle, WsTransport};

#[derive(Debug, Clone)]
pub enum PeerTransport {
    Rpc(WsTransport),
    Http(HttpTransport),
}

#[derive(Debug)]
pub enum PeerHandle {
    Rpc(WsHandle),
    Http(HttpHandle),
}

impl PeerTransport {
    pub fn from_config(config: &ClientConfig) -> Self {
        match config.protocol {
            Protocol::Rpc => PeerTransport::Rpc(WsTransport::new(config.rpc_path.clone())),
            Protocol::Http => PeerTransport::Http(HttpTransport::default()),
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            PeerTransport::Rpc(_) => Protocol::Rpc,
            PeerTransport::Http(_) => Protocol::Http,
        }
    }
}

impl Transport for PeerTransport {
    type Handle = PeerHandle;

    async fn open(
        &self,
        address: &str,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<PeerHandle, TransportError> {
        match self {
            PeerTransport::Rpc(t) => t
                .open(address, connect_timeout, io_timeout)
                .await
                .map(PeerHandle::Rpc),
            PeerTransport::Http(t) => t
                .open(address, connect_timeout, io_timeout)
                .await
                .map(PeerHandle::Http),
        }
    }

    fn is_open(&self, handle: &PeerHandle) -> bool {
        match (self, handle) {
            (PeerTransport::Rpc(t), PeerHandle::Rpc(h)) => t.is_open(h),
            (PeerTransport::Http(t), PeerHandle::Http(h)) => t.is_open(h),
            _ => false,
        }
    }

    async fn close(&self, handle: PeerHandle) {
        match (self, handle) {
            (PeerTransport::Rpc(t), PeerHandle::Rpc(h)) => t.close(h).await,
            (PeerTransport::Http(t), PeerHandle::Http(h)) => t.close(h).await,
            _ => {}
        }
    }

    async fn round_trip(
        &self,
        handle: &mut PeerHandle,
        request: &RequestEnvelope,
    ) -> Result<RawReply, TransportError> {
        match (self, handle) {
            (PeerTransport::Rpc(t), PeerHandle::Rpc(h)) => t.round_trip(h, request).await,
            (PeerTransport::Http(t), PeerHandle::Http(h)) => t.round_trip(h, request).await,
            _ => Err(TransportError::NotOpen),
        }
    }

    fn failure_label(&self) -> &'static str {
        match self {
            PeerTransport::Rpc(t) => t.failure_label(),
            PeerTransport::Http(t) => t.failure_label(),
        }
    }
}
