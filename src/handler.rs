//! Handler type and type erasure.
//!
//! # How async handlers are stored
//!
//! A chain wraps handlers of *different* concrete types around one another,
//! so every handler is erased behind one trait object and shared through an
//! `Arc`. The path from user code to the vtable call is:
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← user writes this
//!        ↓ chain.then(hello)
//! hello.into_handler()                             ← IntoHandler blanket impl
//!        ↓
//! Handler(Arc::new(FnHandler(hello)))              ← heap-allocated wrapper
//!        ↓
//! handler.call(req)  at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { hello(req).await.into_result() })  ← BoxFuture
//! ```
//!
//! Cloning a [`Handler`] is one atomic increment. Every interceptor in a
//! chain holds a clone of the handler downstream of it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;

use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future resolving to a handler outcome.
///
/// `Send + 'static` let tokio move the future across threads.
pub type BoxFuture = Pin<Box<dyn Future<Output = Result<Response, Error>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// public `Handler::new` bound. Prefer [`Handler::from_fn`].
#[doc(hidden)]
pub trait ErasedHandler: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture;
}

// ── Handler ───────────────────────────────────────────────────────────────────

/// A unit of request processing.
///
/// This is the one currency of a pipeline: terminal handlers are `Handler`s,
/// an [`Interceptor`](crate::middleware::Interceptor) maps a `Handler` to a
/// `Handler`, and [`Chain::then`](crate::middleware::Chain::then) returns a
/// `Handler` ready for [`Server::serve`](crate::Server::serve).
///
/// Clones share the underlying handler. A `Handler` may be invoked from many
/// requests at once.
#[derive(Clone)]
pub struct Handler(Arc<dyn ErasedHandler>);

impl Handler {
    #[doc(hidden)]
    pub fn new(inner: impl ErasedHandler) -> Self {
        Self(Arc::new(inner))
    }

    /// Wraps an async function or closure taking a [`Request`].
    ///
    /// The future may resolve to anything implementing [`IntoResponse`]
    /// (an infallible handler) or to `Result<impl IntoResponse, E>` where
    /// `E: Into<Error>` (a fallible one).
    ///
    /// ```rust
    /// use onion::{Error, Handler, Request, Response};
    ///
    /// let hello = Handler::from_fn(|_req: Request| async { "hello" });
    ///
    /// let strict = Handler::from_fn(|req: Request| async move {
    ///     if req.body().is_empty() {
    ///         return Err(Error::msg("empty body"));
    ///     }
    ///     Ok(Response::text("thanks"))
    /// });
    /// ```
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        Self::new(FnHandler(f))
    }

    /// The default terminal handler: `404 Not Found` with an empty body.
    ///
    /// Substituted by [`Chain::then_or_fallback`](crate::middleware::Chain::then_or_fallback)
    /// when no terminal is supplied and the chain was given no other
    /// fallback.
    pub fn not_found() -> Self {
        Self::new(StatusHandler(StatusCode::NOT_FOUND))
    }

    /// Runs this handler (and everything it wraps) for one request.
    pub fn call(&self, req: Request) -> BoxFuture {
        self.0.call(req)
    }

    /// True if both values are clones of the same handler.
    pub fn ptr_eq(&self, other: &Handler) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&Arc::as_ptr(&self.0)).finish()
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

/// Anything that can terminate a chain.
///
/// Implemented for [`Handler`] itself and for every function or closure
/// accepted by [`Handler::from_fn`].
pub trait IntoHandler {
    fn into_handler(self) -> Handler;
}

impl IntoHandler for Handler {
    fn into_handler(self) -> Handler { self }
}

impl<F, Fut> IntoHandler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    fn into_handler(self) -> Handler {
        Handler::from_fn(self)
    }
}

/// What a handler function may return.
///
/// Plain responses are always `Ok`; a `Result` has its error converted into
/// [`Error`] and passed to the caller untouched.
pub trait IntoHandlerResult {
    fn into_result(self) -> Result<Response, Error>;
}

impl<R: IntoResponse> IntoHandlerResult for R {
    fn into_result(self) -> Result<Response, Error> {
        Ok(self.into_response())
    }
}

impl<R, E> IntoHandlerResult for Result<R, E>
where
    R: IntoResponse,
    E: Into<Error>,
{
    fn into_result(self) -> Result<Response, Error> {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}

// ── Concrete wrappers ─────────────────────────────────────────────────────────

/// Newtype wrapper that holds a concrete function `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_result() })
    }
}

struct StatusHandler(StatusCode);

impl ErasedHandler for StatusHandler {
    fn call(&self, _req: Request) -> BoxFuture {
        let status = self.0;
        Box::pin(async move { Ok(Response::status(status)) })
    }
}
