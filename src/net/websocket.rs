//! WebSocket transport: one JSON envelope per binary frame.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::envelope::{RawReply, RequestEnvelope};
use crate::net::transport::{Transport, TransportError};

/// Open connection to a peer's RPC endpoint.
pub struct WsHandle {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    open: bool,
    io_timeout: Duration,
}

impl std::fmt::Debug for WsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsHandle")
            .field("open", &self.open)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}

/// Connects to `ws://<address><rpc_path>`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    rpc_path: String,
}

impl WsTransport {
    pub fn new(rpc_path: impl Into<String>) -> Self {
        Self {
            rpc_path: rpc_path.into(),
        }
    }

    pub fn rpc_path(&self) -> &str {
        &self.rpc_path
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new("/rpc")
    }
}

impl Transport for WsTransport {
    type Handle = WsHandle;

    async fn open(
        &self,
        address: &str,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<WsHandle, TransportError> {
        let url = format!("ws://{}{}", address, self.rpc_path);
        let connect_error = |reason: String| TransportError::Connect {
            address: address.to_string(),
            reason,
        };

        let (stream, _response) = timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| connect_error(format!("timed out after {connect_timeout:?}")))?
            .map_err(|e| connect_error(e.to_string()))?;

        tracing::debug!(address, "Peer connection opened");
        Ok(WsHandle {
            stream,
            open: true,
            io_timeout,
        })
    }

    fn is_open(&self, handle: &WsHandle) -> bool {
        handle.open
    }

    async fn close(&self, mut handle: WsHandle) {
        if handle.open {
            let _ = handle.stream.close(None).await;
        }
    }

    async fn round_trip(
        &self,
        handle: &mut WsHandle,
        request: &RequestEnvelope,
    ) -> Result<RawReply, TransportError> {
        if !handle.open {
            return Err(TransportError::NotOpen);
        }

        let io_timeout = handle.io_timeout;
        let result = match timeout(io_timeout, exchange(&mut handle.stream, request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(io_timeout)),
        };

        if result.is_err() {
            handle.open = false;
        }
        result
    }
}

async fn exchange(
    stream: &mut WebSocketStream<MaybeTlsStream<TcpStream>>,
    request: &RequestEnvelope,
) -> Result<RawReply, TransportError> {
    let payload = serde_json::to_vec(request)?;
    stream
        .send(Message::Binary(payload.into()))
        .await
        .map_err(map_ws_error)?;

    loop {
        match stream.next().await {
            Some(Ok(Message::Binary(bytes))) => return Ok(serde_json::from_slice(&bytes)?),
            Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(text.as_str())?),
            Some(Ok(Message::Close(_))) | None => return Err(TransportError::Eof),
            // Ping/pong are answered by tungstenite itself.
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(map_ws_error(e)),
        }
    }
}

fn map_ws_error(err: WsError) -> TransportError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::NotOpen,
        WsError::Io(io) => TransportError::from_io(io),
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => TransportError::Eof,
        other => TransportError::Protocol(other.to_string()),
    }
}
