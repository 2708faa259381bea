//! HTTP transport: each call is one HTTP request against the peer's routes.
//!
//! The reply body is read as a response envelope. When it names no status,
//! the HTTP status code decides it during normalization.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::envelope::{RawReply, RequestEnvelope, Status};
use crate::net::transport::{Transport, TransportError};

const USER_AGENT: &str = concat!("protocol-adapter/", env!("CARGO_PKG_VERSION"));

/// Headers that belong to the hop, not to the call.
const HOP_HEADERS: [&str; 4] = ["host", "content-length", "connection", "transfer-encoding"];

/// HTTP client bound to one peer base URL. Each handle keeps at most one
/// idle keep-alive connection, so pool capacity bounds open sockets.
#[derive(Debug)]
pub struct HttpHandle {
    client: reqwest::Client,
    base: Url,
    open: bool,
    io_timeout: Duration,
}

impl HttpHandle {
    pub fn base_url(&self) -> &Url {
        &self.base
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    user_agent: String,
}

impl HttpTransport {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(USER_AGENT)
    }
}

impl Transport for HttpTransport {
    type Handle = HttpHandle;

    async fn open(
        &self,
        address: &str,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<HttpHandle, TransportError> {
        let connect_error = |reason: String| TransportError::Connect {
            address: address.to_string(),
            reason,
        };

        let base = base_url(address).map_err(|e| connect_error(e.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(io_timeout)
            .pool_max_idle_per_host(1)
            .user_agent(self.user_agent.as_str())
            .no_proxy()
            .build()
            .map_err(|e| connect_error(e.to_string()))?;

        tracing::debug!(address, base = %base, "HTTP peer client opened");
        Ok(HttpHandle {
            client,
            base,
            open: true,
            io_timeout,
        })
    }

    fn is_open(&self, handle: &HttpHandle) -> bool {
        handle.open
    }

    async fn close(&self, _handle: HttpHandle) {}

    async fn round_trip(
        &self,
        handle: &mut HttpHandle,
        request: &RequestEnvelope,
    ) -> Result<RawReply, TransportError> {
        if !handle.open {
            return Err(TransportError::NotOpen);
        }

        let result = call(handle, request).await;
        if result.is_err() {
            handle.open = false;
        }
        result
    }

    fn failure_label(&self) -> &'static str {
        "HTTP Endpoint Error"
    }
}

async fn call(handle: &HttpHandle, request: &RequestEnvelope) -> Result<RawReply, TransportError> {
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(|e| TransportError::Protocol(e.to_string()))?;
    let url = join_path(&handle.base, &request.path);
    let headers = outbound_headers(request);

    let mut builder = handle.client.request(method, url).headers(headers);
    if !request.params.is_empty() {
        builder = builder.query(&request.params);
    }
    if request.method.carries_content() {
        if let Some(content) = &request.content {
            if request.header(CONTENT_TYPE.as_str()).is_none() {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            builder = builder.body(content.clone());
        }
    }

    let io_timeout = handle.io_timeout;
    let response = builder
        .send()
        .await
        .map_err(|e| map_http_error(e, io_timeout))?;

    let code = response.status().as_u16();
    let headers = diagnostic_headers(response.headers());
    let body = response
        .text()
        .await
        .map_err(|e| map_http_error(e, io_timeout))?;

    Ok(reply_from_body(code, headers, &body))
}

fn base_url(address: &str) -> Result<Url, url::ParseError> {
    if address.starts_with("http://") || address.starts_with("https://") {
        Url::parse(address)
    } else {
        Url::parse(&format!("http://{address}"))
    }
}

/// Append `path` to the base URL's own path, so `http://h/api` + `/users`
/// is `http://h/api/users`.
fn join_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    url.set_path(&format!("{prefix}{path}"));
    url
}

fn outbound_headers(request: &RequestEnvelope) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &request.headers {
        if HOP_HEADERS.iter().any(|hop| name.eq_ignore_ascii_case(hop)) {
            continue;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::debug!(header = %name, "Dropping header that is not valid HTTP"),
        }
    }
    headers
}

/// Peer diagnostics travel as `X-` headers.
fn diagnostic_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-"))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

#[derive(Deserialize)]
struct EnvelopeBody {
    status: Option<Status>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    total: i64,
}

/// Body that is not an envelope is kept as the payload, so an array still
/// decodes and anything else fails as an invalid response.
fn reply_from_body(code: u16, headers: HashMap<String, String>, body: &str) -> RawReply {
    match serde_json::from_str::<EnvelopeBody>(body) {
        Ok(envelope) => RawReply {
            status: envelope.status,
            code: Some(code),
            message: envelope.message,
            error_code: envelope.error_code,
            total: envelope.total,
            headers,
            content: envelope.data.map(|data| data.to_string()).unwrap_or_default(),
        },
        Err(_) => RawReply {
            code: Some(code),
            headers,
            content: body.to_string(),
            ..RawReply::default()
        },
    }
}

fn map_http_error(err: reqwest::Error, io_timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(io_timeout)
    } else if err.is_connect() {
        TransportError::Connect {
            address: err.url().map(|url| url.to_string()).unwrap_or_default(),
            reason: err.to_string(),
        }
    } else {
        TransportError::Protocol(err.to_string())
    }
}
