//! Handler and pre-request hook types.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::envelope::{HandlerError, RequestEnvelope, ResponseEnvelope};

pub type HandlerResult = Result<ResponseEnvelope, HandlerError>;
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Outcome of a pre-request check: `Some` answers the request directly.
pub type PreRequestResult = Result<Option<ResponseEnvelope>, HandlerError>;
pub type PreRequestFuture = Pin<Box<dyn Future<Output = PreRequestResult> + Send>>;

type HandlerFn = dyn Fn(RequestEnvelope) -> HandlerFuture + Send + Sync;
type CheckFn = dyn Fn(RequestEnvelope) -> PreRequestFuture + Send + Sync;

/// A named request handler.
#[derive(Clone)]
pub struct Handler {
    name: Arc<str>,
    call: Arc<HandlerFn>,
}

impl Handler {
    /// Wrap an async function. The name is taken from its type path.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(RequestEnvelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::named(short_type_name::<F>(), f)
    }

    pub fn named<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(RequestEnvelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            call: Arc::new(move |request| Box::pin(f(request)) as HandlerFuture),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start the handler. Panics raised while building the future are not
    /// caught here; the dispatcher supervises both stages.
    pub fn call(&self, request: RequestEnvelope) -> HandlerFuture {
        (self.call)(request)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("name", &self.name).finish()
    }
}

/// Async check run before routing, e.g. an auth lookup.
///
/// `Ok(Some(response))` answers the request without routing it,
/// `Ok(None)` lets it through, and an error rejects it. The check gets its
/// own copy of the request.
#[derive(Clone)]
pub struct PreRequestHook {
    name: Arc<str>,
    check: Arc<CheckFn>,
}

impl PreRequestHook {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(RequestEnvelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PreRequestResult> + Send + 'static,
    {
        Self::named(short_type_name::<F>(), f)
    }

    pub fn named<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(RequestEnvelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PreRequestResult> + Send + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            check: Arc::new(move |request| Box::pin(f(request)) as PreRequestFuture),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, request: RequestEnvelope) -> PreRequestFuture {
        (self.check)(request)
    }
}

impl fmt::Debug for PreRequestHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreRequestHook").field("name", &self.name).finish()
    }
}

/// Last two path segments of a type name, generics dropped:
/// `my_app::users::get_user` becomes `users::get_user`.
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let segments: Vec<&str> = base.rsplitn(3, "::").collect();
    match segments.as_slice() {
        [last, parent, ..] => format!("{parent}::{last}"),
        _ => base.to_string(),
    }
}
