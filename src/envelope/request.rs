//! Request envelope.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::envelope::status::Method;

/// Protocol-neutral request, produced by every inbound binding and sent by
/// the outbound client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub path: String,
    pub method: Method,

    /// Query parameters.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Raw body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Path variables bound by the route matcher. Never sent on the wire.
    #[serde(skip)]
    pub vars: HashMap<String, String>,
}

impl RequestEnvelope {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            params: HashMap::new(),
            headers: HashMap::new(),
            content: None,
            vars: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Serialize `body` as JSON content.
    pub fn with_json<T: Serialize>(self, body: &T) -> Result<Self, serde_json::Error> {
        let content = serde_json::to_string(body)?;
        Ok(self.with_content(content))
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Header lookup, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Decode the JSON content. Missing content decodes as `null`.
    pub fn parse_body<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.content.as_deref().unwrap_or("null"))
    }

    /// Copy of this request as it should travel to a remote peer.
    /// GET and DELETE requests drop their content.
    pub fn for_outbound(&self) -> Self {
        let mut outbound = self.clone();
        if !self.method.carries_content() {
            outbound.content = None;
        }
        outbound.vars.clear();
        outbound
    }
}
