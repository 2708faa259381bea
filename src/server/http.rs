//! HTTP binding.
//!
//! # Responsibilities
//! - Turn any HTTP request into a RequestEnvelope
//! - Turn the resulting envelope back into an HTTP response
//!
//! # Design Decisions
//! - Envelope headers travel as HTTP headers, not in the JSON body
//! - The HTTP status code is the envelope status code
//! - REDIRECTED becomes a 302 to the envelope's `Location` header

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::envelope::{Method, RequestEnvelope, ResponseEnvelope, Status};
use crate::server::app::AppState;

/// Fallback handler serving every path through the dispatcher.
pub async fn handle_http(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let method = match parts.method.as_str().parse::<Method>() {
        Ok(method) => method,
        Err(e) => {
            return into_http_response(ResponseEnvelope::error(
                Status::Invalid,
                "INVALID_METHOD",
                e.to_string(),
            ));
        }
    };

    let mut envelope = RequestEnvelope::new(method, parts.uri.path());
    if let Some(query) = parts.uri.query() {
        envelope.params = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
    }
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            envelope
                .headers
                .insert(name.as_str().to_string(), value.to_string());
        }
    }

    match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) if !bytes.is_empty() => {
            envelope.content = Some(String::from_utf8_lossy(&bytes).into_owned());
        }
        Ok(_) => {}
        Err(e) => {
            return into_http_response(ResponseEnvelope::error(
                Status::Invalid,
                "INVALID_BODY",
                format!("Failed to read body: {e}"),
            ));
        }
    }

    into_http_response(state.dispatcher.dispatch(envelope).await)
}

/// Render an envelope as an HTTP response.
pub fn into_http_response(mut envelope: ResponseEnvelope) -> Response {
    let mut headers = HeaderMap::new();
    for (name, value) in std::mem::take(&mut envelope.headers) {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::debug!(header = %name, "Dropping header that is not valid HTTP"),
        }
    }

    if envelope.status == Status::Redirected {
        if !headers.contains_key(header::LOCATION) {
            tracing::warn!("Redirect response without Location header");
        }
        return (StatusCode::FOUND, headers).into_response();
    }

    let status =
        StatusCode::from_u16(envelope.status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, headers, Json(envelope)).into_response()
}
