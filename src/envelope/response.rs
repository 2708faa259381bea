//! Response envelope and the raw reply record exchanged with peers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::envelope::error::HandlerError;
use crate::envelope::status::Status;

/// Error code used when a reply payload cannot be decoded.
pub const INVALID_RESPONSE: &str = "INVALID_RESPONSE";

/// Unified response, independent of the transport it arrived on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T = Value> {
    pub status: Status,

    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<T>,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_code: String,

    /// Total item count, for paginated results.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub total: i64,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

impl<T> ResponseEnvelope<T> {
    pub fn ok(data: Vec<T>, message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            data,
            message: message.into(),
            error_code: String::new(),
            total: 0,
            headers: HashMap::new(),
        }
    }

    pub fn error(status: Status, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            data: Vec::new(),
            message: message.into(),
            error_code: error_code.into(),
            total: 0,
            headers: HashMap::new(),
        }
    }

    /// Generic failure returned when a handler faults.
    pub fn internal_error() -> Self {
        Self::error(
            Status::Error,
            "INTERNAL_SERVICE_ERROR",
            "There is an error, please try again later.",
        )
    }

    /// Convert a handler error, choosing the status from the error code.
    pub fn from_handler_error(err: &HandlerError) -> Self {
        match err {
            HandlerError::Coded { code, message } => {
                Self::error(status_for_error_code(code), code.as_str(), message.as_str())
            }
            HandlerError::Other(message) => {
                Self::error(Status::Error, "INTERNAL_SERVER_ERROR", message.as_str())
            }
        }
    }

    pub fn with_total(mut self, total: i64) -> Self {
        self.total = total;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Header lookup, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl ResponseEnvelope<Value> {
    /// Reinterpret the payload as a typed array.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<ResponseEnvelope<T>, serde_json::Error> {
        let data = self
            .data
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?;
        Ok(ResponseEnvelope {
            status: self.status,
            data,
            message: self.message,
            error_code: self.error_code,
            total: self.total,
            headers: self.headers,
        })
    }
}

fn status_for_error_code(code: &str) -> Status {
    if code == "NOT_FOUND" {
        return Status::NotFound;
    }
    [
        ("INVALID", Status::Invalid),
        ("EXISTED", Status::Existed),
        ("FORBIDDEN", Status::Forbidden),
        ("UNAUTHORIZED", Status::Unauthorized),
        ("REDIRECTED", Status::Redirected),
    ]
    .into_iter()
    .find(|(prefix, _)| code.starts_with(prefix))
    .map(|(_, status)| status)
    .unwrap_or(Status::Error)
}

/// Reply record as a peer sends it: the payload is JSON text and the status
/// may be absent, in which case `code` decides it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_code: String,

    #[serde(default)]
    pub total: i64,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// JSON-encoded payload array.
    #[serde(default)]
    pub content: String,
}

impl RawReply {
    pub fn from_envelope(envelope: &ResponseEnvelope) -> Self {
        Self {
            status: Some(envelope.status),
            code: Some(envelope.status.code()),
            message: envelope.message.clone(),
            error_code: envelope.error_code.clone(),
            total: envelope.total,
            headers: envelope.headers.clone(),
            content: serde_json::to_string(&envelope.data).unwrap_or_else(|_| "[]".to_string()),
        }
    }

    /// Normalize into the shared envelope.
    pub fn normalize(self) -> ResponseEnvelope {
        let status = self
            .status
            .or_else(|| self.code.map(Status::from_code))
            .unwrap_or(Status::Ok);

        let data = match decode_payload(&self.content) {
            Ok(data) => data,
            Err(err) => {
                return ResponseEnvelope::error(
                    Status::Error,
                    INVALID_RESPONSE,
                    format!("Response Data Error: {err}"),
                )
                .with_total(self.total);
            }
        };

        ResponseEnvelope {
            status,
            data,
            message: self.message,
            error_code: self.error_code,
            total: self.total,
            headers: self.headers,
        }
    }
}

fn decode_payload(content: &str) -> Result<Vec<Value>, serde_json::Error> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(match serde_json::from_str(content)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    })
}
