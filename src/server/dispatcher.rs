//! Inbound dispatch.
//!
//! # Responsibilities
//! - Run the pre-request hook
//! - Route each envelope to its handler, binding path variables
//! - Contain handler failures and panics
//! - Decorate responses with diagnostic headers
//!
//! # Design Decisions
//! - The route table is owned by the dispatcher and frozen at build time
//! - Unmatched routes always produce a NOT_FOUND envelope
//! - One supervising boundary turns panics into an internal error

use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use crate::config::ServerConfig;
use crate::envelope::{HandlerError, Method, RequestEnvelope, ResponseEnvelope, Status};
use crate::observability::metrics;
use crate::routing::{RouteTable, RouteTableBuilder};
use crate::server::handler::{Handler, HandlerResult, PreRequestHook, PreRequestResult};

pub const X_EXECUTION_TIME: &str = "X-Execution-Time";
pub const X_HOSTNAME: &str = "X-Hostname";
pub const X_FUNCTION: &str = "X-Function";

/// Name reported in `X-Function` for responses produced by the dispatcher.
const DISPATCHER_NAME: &str = "Dispatcher::dispatch";

/// Builds a [`Dispatcher`].
pub struct DispatcherBuilder {
    routes: RouteTableBuilder<Handler>,
    hostname: String,
    hide_func_name: bool,
    pre_request: Option<PreRequestHook>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            routes: RouteTableBuilder::new(),
            hostname: "localhost".to_string(),
            hide_func_name: false,
            pre_request: None,
        }
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new()
            .hostname(config.hostname.clone())
            .hide_func_name(config.hide_func_name)
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn hide_func_name(mut self, hide: bool) -> Self {
        self.hide_func_name = hide;
        self
    }

    /// Register `f` for `method` and `pattern`, e.g. `/users/:id`.
    pub fn register<F, Fut>(self, method: Method, pattern: &str, f: F) -> Self
    where
        F: Fn(RequestEnvelope) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
    {
        self.handler(method, pattern, Handler::new(f))
    }

    pub fn register_named<F, Fut>(self, method: Method, pattern: &str, name: &str, f: F) -> Self
    where
        F: Fn(RequestEnvelope) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
    {
        self.handler(method, pattern, Handler::named(name, f))
    }

    pub fn handler(mut self, method: Method, pattern: &str, handler: Handler) -> Self {
        let name = handler.name().to_string();
        self.routes.register(method, pattern, name, handler);
        self
    }

    /// Run `f` before routing every request. It may await, e.g. to look up
    /// credentials.
    pub fn pre_request<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestEnvelope) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = PreRequestResult> + Send + 'static,
    {
        self.pre_request = Some(PreRequestHook::new(f));
        self
    }

    pub fn pre_request_hook(mut self, hook: PreRequestHook) -> Self {
        self.pre_request = Some(hook);
        self
    }

    pub fn build(self) -> Dispatcher {
        let routes = self.routes.build();
        tracing::debug!(routes = routes.len(), hostname = %self.hostname, "Dispatcher built");
        Dispatcher {
            routes,
            hostname: self.hostname,
            hide_func_name: self.hide_func_name,
            pre_request: self.pre_request,
        }
    }
}

/// Routes envelopes to handlers.
#[derive(Debug)]
pub struct Dispatcher {
    routes: RouteTable<Handler>,
    hostname: String,
    hide_func_name: bool,
    pre_request: Option<PreRequestHook>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn routes(&self) -> &RouteTable<Handler> {
        &self.routes
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Handle one request. Never fails: every outcome is an envelope.
    pub async fn dispatch(&self, request: RequestEnvelope) -> ResponseEnvelope {
        let started = Instant::now();
        let method = request.method;
        let request_id = request.header("x-request-id").unwrap_or("-").to_string();

        let response = self.route(request, started).await;

        tracing::debug!(
            request_id = %request_id,
            method = %method,
            status = %response.status,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Request dispatched"
        );
        metrics::record_dispatch(method.as_str(), response.status.as_str(), started.elapsed());
        response
    }

    async fn route(&self, mut request: RequestEnvelope, started: Instant) -> ResponseEnvelope {
        if let Some(hook) = &self.pre_request {
            match contain(|| hook.check(request.clone())).await {
                Ok(Ok(None)) => {}
                Ok(Ok(Some(response))) => return self.decorate(response, hook.name(), started),
                Ok(Err(err)) => {
                    tracing::debug!(hook = hook.name(), error = %err, "Pre-request check rejected request");
                    let code = err.code().unwrap_or("PRE_REQUEST_ERROR").to_string();
                    let response = ResponseEnvelope::error(
                        Status::Error,
                        code,
                        format!("PreRequest error: {err}"),
                    );
                    return self.decorate(response, hook.name(), started);
                }
                Err(panic) => {
                    tracing::error!(hook = hook.name(), panic = %panic_message(&*panic), "Pre-request hook panicked");
                    return self.decorate(ResponseEnvelope::internal_error(), hook.name(), started);
                }
            }
        }

        let Some(found) = self.routes.find(request.method, &request.path) else {
            return self.not_found(&request);
        };

        for (name, value) in found.params {
            request.set_var(name, value);
        }
        let handler = found.route.handler().clone();
        let response = supervise(&handler, request).await;
        self.decorate(response, handler.name(), started)
    }

    fn not_found(&self, request: &RequestEnvelope) -> ResponseEnvelope {
        tracing::debug!(method = %request.method, path = %request.path, "No route matched");
        ResponseEnvelope::error(
            Status::NotFound,
            "API_NOT_FOUND",
            format!("API Method/Path {} {} isn't found", request.method, request.path),
        )
        .with_header(X_HOSTNAME, self.hostname.as_str())
        .with_header(X_FUNCTION, DISPATCHER_NAME)
    }

    fn decorate(&self, mut response: ResponseEnvelope, function: &str, started: Instant) -> ResponseEnvelope {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        response
            .headers
            .insert(X_EXECUTION_TIME.to_string(), format!("{elapsed_ms:.4} ms"));
        response
            .headers
            .insert(X_HOSTNAME.to_string(), self.hostname.clone());
        if !self.hide_func_name {
            response
                .headers
                .insert(X_FUNCTION.to_string(), function.to_string());
        }
        response
    }
}

/// Start and drive a future, catching panics from either stage.
async fn contain<T, Fut>(start: impl FnOnce() -> Fut) -> Result<T, Box<dyn Any + Send>>
where
    Fut: Future<Output = T>,
{
    match catch_unwind(AssertUnwindSafe(start)) {
        Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
        Err(panic) => Err(panic),
    }
}

/// Run a handler, converting errors and panics into envelopes.
async fn supervise(handler: &Handler, request: RequestEnvelope) -> ResponseEnvelope {
    match contain(|| handler.call(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            tracing::debug!(handler = handler.name(), error = %err, "Handler returned error");
            ResponseEnvelope::from_handler_error(&err)
        }
        Err(panic) => {
            tracing::error!(handler = handler.name(), panic = %panic_message(&*panic), "Handler panicked");
            ResponseEnvelope::internal_error()
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn get_user(req: RequestEnvelope) -> HandlerResult {
        let id = req.var("id").unwrap_or_default().to_string();
        Ok(ResponseEnvelope::ok(vec![json!({ "id": id })], "found"))
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::builder()
            .hostname("node-1")
            .register(Method::Get, "/users/:id", get_user)
            .register_named(Method::Get, "/users/active", "users::active", |_req| async {
                Ok(ResponseEnvelope::ok(vec![json!("active")], "ok"))
            })
            .register_named(Method::Post, "/users", "users::create", |req: RequestEnvelope| async move {
                #[derive(serde::Deserialize)]
                struct NewUser {
                    email: String,
                }
                let body: NewUser = req.parse_body()?;
                if !body.email.contains('@') {
                    return Err(HandlerError::new("INVALID_EMAIL", "email is malformed"));
                }
                Ok(ResponseEnvelope::ok(vec![json!(body.email)], "created"))
            })
            .register_named(Method::Get, "/boom", "boom", |_req| async {
                if true {
                    panic!("handler exploded");
                }
                Ok(ResponseEnvelope::ok(vec![], ""))
            })
            .build()
    }

    #[tokio::test]
    async fn test_dispatch_binds_variables() {
        let resp = dispatcher().dispatch(RequestEnvelope::new(Method::Get, "/users/42")).await;
        assert_eq!(resp.status, Status::Ok);
        assert_eq!(resp.data, vec![json!({ "id": "42" })]);
        assert_eq!(resp.header(X_FUNCTION), Some("tests::get_user"));
        assert_eq!(resp.header(X_HOSTNAME), Some("node-1"));
        assert!(resp.header(X_EXECUTION_TIME).unwrap().ends_with(" ms"));
    }

    #[tokio::test]
    async fn test_literal_route_preferred() {
        let resp = dispatcher().dispatch(RequestEnvelope::new(Method::Get, "/users/active")).await;
        assert_eq!(resp.data, vec![json!("active")]);
        assert_eq!(resp.header(X_FUNCTION), Some("users::active"));
    }

    #[tokio::test]
    async fn test_not_found_envelope() {
        let resp = dispatcher().dispatch(RequestEnvelope::new(Method::Delete, "/users/1")).await;
        assert_eq!(resp.status, Status::NotFound);
        assert_eq!(resp.error_code, "API_NOT_FOUND");
        assert_eq!(resp.message, "API Method/Path DELETE /users/1 isn't found");
        assert_eq!(resp.header(X_HOSTNAME), Some("node-1"));
        assert_eq!(resp.header(X_FUNCTION), Some(DISPATCHER_NAME));
    }

    #[tokio::test]
    async fn test_handler_error_mapped() {
        let req = RequestEnvelope::new(Method::Post, "/users").with_content("{\"email\":\"nope\"}");
        let resp = dispatcher().dispatch(req).await;
        assert_eq!(resp.status, Status::Invalid);
        assert_eq!(resp.error_code, "INVALID_EMAIL");

        let req = RequestEnvelope::new(Method::Post, "/users").with_content("not json");
        let resp = dispatcher().dispatch(req).await;
        assert_eq!(resp.status, Status::Invalid);
        assert_eq!(resp.error_code, "INVALID_PAYLOAD");
    }

    #[tokio::test]
    async fn test_panic_contained() {
        let resp = dispatcher().dispatch(RequestEnvelope::new(Method::Get, "/boom")).await;
        assert_eq!(resp.status, Status::Error);
        assert_eq!(resp.error_code, "INTERNAL_SERVICE_ERROR");
        assert_eq!(resp.message, "There is an error, please try again later.");
    }

    #[tokio::test]
    async fn test_pre_request_short_circuits() {
        let d = Dispatcher::builder()
            .register(Method::Get, "/users/:id", get_user)
            .pre_request(|req: RequestEnvelope| async move {
                tokio::task::yield_now().await;
                match req.header("authorization") {
                    None => Ok(Some(ResponseEnvelope::error(
                        Status::Unauthorized,
                        "UNAUTHORIZED",
                        "missing token",
                    ))),
                    Some("bad") => Err(HandlerError::new("FORBIDDEN", "bad token")),
                    Some(_) => Ok(None),
                }
            })
            .build();

        let resp = d.dispatch(RequestEnvelope::new(Method::Get, "/users/1")).await;
        assert_eq!(resp.status, Status::Unauthorized);

        let resp = d
            .dispatch(RequestEnvelope::new(Method::Get, "/users/1").with_header("Authorization", "bad"))
            .await;
        assert_eq!(resp.status, Status::Error);
        assert_eq!(resp.error_code, "FORBIDDEN");
        assert!(resp.message.starts_with("PreRequest error: "));

        let resp = d
            .dispatch(RequestEnvelope::new(Method::Get, "/users/1").with_header("Authorization", "ok"))
            .await;
        assert_eq!(resp.status, Status::Ok);
        assert_eq!(resp.data, vec![json!({ "id": "1" })]);
    }

    #[tokio::test]
    async fn test_pre_request_sees_shared_state() {
        use std::collections::HashSet;
        use std::sync::Arc;
        use tokio::sync::RwLock;

        let tokens = Arc::new(RwLock::new(HashSet::from(["t1".to_string()])));
        let lookup = Arc::clone(&tokens);
        let d = Dispatcher::builder()
            .register(Method::Get, "/users/:id", get_user)
            .pre_request_hook(PreRequestHook::named("auth::check", move |req: RequestEnvelope| {
                let tokens = Arc::clone(&lookup);
                async move {
                    let token = req.header("authorization").unwrap_or_default().to_string();
                    if tokens.read().await.contains(&token) {
                        Ok(None)
                    } else {
                        Err(HandlerError::other("unknown token"))
                    }
                }
            }))
            .build();

        let req = RequestEnvelope::new(Method::Get, "/users/9").with_header("Authorization", "t2");
        let resp = d.dispatch(req.clone()).await;
        assert_eq!(resp.error_code, "PRE_REQUEST_ERROR");
        assert_eq!(resp.header(X_FUNCTION), Some("auth::check"));

        tokens.write().await.insert("t2".to_string());
        let resp = d.dispatch(req).await;
        assert_eq!(resp.status, Status::Ok);
    }

    #[tokio::test]
    async fn test_pre_request_panic_contained() {
        let d = Dispatcher::builder()
            .register(Method::Get, "/users/:id", get_user)
            .pre_request(|_req: RequestEnvelope| async {
                if true {
                    panic!("hook exploded");
                }
                Ok(None)
            })
            .build();

        let resp = d.dispatch(RequestEnvelope::new(Method::Get, "/users/1")).await;
        assert_eq!(resp.status, Status::Error);
        assert_eq!(resp.error_code, "INTERNAL_SERVICE_ERROR");
    }

    #[tokio::test]
    async fn test_hide_func_name() {
        let d = Dispatcher::builder()
            .hide_func_name(true)
            .register(Method::Get, "/users/:id", get_user)
            .build();
        let resp = d.dispatch(RequestEnvelope::new(Method::Get, "/users/1")).await;
        assert_eq!(resp.header(X_FUNCTION), None);
        assert!(resp.header(X_HOSTNAME).is_some());
    }
}
