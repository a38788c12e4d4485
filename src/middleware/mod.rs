//! Middleware layer.
//!
//! An [`Interceptor`] turns "the rest of the pipeline" into a new handler.
//! The handler it returns may act before delegating, call `next` with the
//! same or a modified request, act on the response afterwards, or never call
//! `next` at all and answer by itself.
//!
//! A [`Chain`] keeps an ordered list of interceptors and folds them around a
//! terminal handler. The first interceptor declared is the outermost: it sees
//! the request first and the response last.
//!
//! ```rust
//! use onion::middleware::{self, Chain};
//! use onion::{Handler, Request, Response, StatusCode};
//!
//! let require_json = middleware::from_fn(|req: Request, next: Handler| async move {
//!     if req.header("content-type") != Some("application/json") {
//!         return Ok(Response::status(StatusCode::UNSUPPORTED_MEDIA_TYPE));
//!     }
//!     next.call(req).await
//! });
//!
//! let app = Chain::new([middleware::boxed(require_json)])
//!     .then(|_req: Request| async { Response::json(r#"{"ok":true}"#) });
//! ```

mod chain;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, ErasedHandler, Handler, IntoHandlerResult};
use crate::request::Request;

pub use chain::Chain;

/// A transformation from the downstream handler to a new handler.
///
/// `apply` runs once per composition, never per request, and must not keep
/// state shared between the handlers it builds for different `next` values.
/// State the returned handler mutates across requests is the
/// implementation's to synchronise.
///
/// Implemented for any `Fn(Handler) -> Handler` closure:
///
/// ```rust
/// use onion::middleware::Interceptor;
/// use onion::{Handler, Request};
///
/// let tag = |next: Handler| {
///     Handler::from_fn(move |req: Request| {
///         let next = next.clone();
///         async move {
///             let mut res = next.call(req).await?;
///             res.headers_mut().insert("x-tagged", "1".parse().unwrap());
///             Ok::<_, onion::Error>(res)
///         }
///     })
/// };
/// let wrapped = tag.apply(Handler::not_found());
/// ```
pub trait Interceptor: Send + Sync + 'static {
    fn apply(&self, next: Handler) -> Handler;
}

/// A shared, type-erased interceptor, the element type of a [`Chain`].
pub type BoxedInterceptor = Arc<dyn Interceptor>;

/// Erases an interceptor so that interceptors of different types can sit in
/// one list.
pub fn boxed(interceptor: impl Interceptor) -> BoxedInterceptor {
    Arc::new(interceptor)
}

impl<F> Interceptor for F
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    fn apply(&self, next: Handler) -> Handler {
        self(next)
    }
}

impl<I: Interceptor + ?Sized> Interceptor for Arc<I> {
    fn apply(&self, next: Handler) -> Handler {
        (**self).apply(next)
    }
}

// ── from_fn ───────────────────────────────────────────────────────────────────

/// Builds an interceptor from an async function of `(request, next)`.
///
/// `next` is the handler downstream of this interceptor; not calling it
/// short-circuits the chain. The function may return anything
/// [`Handler::from_fn`] accepts, typically `Result<Response, Error>` so that
/// `next.call(req).await` can be returned directly.
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Handler) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    FromFn(Arc::new(f))
}

/// Interceptor returned by [`from_fn`].
pub struct FromFn<F>(Arc<F>);

impl<F, Fut> Interceptor for FromFn<F>
where
    F: Fn(Request, Handler) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    fn apply(&self, next: Handler) -> Handler {
        Handler::new(FromFnHandler { f: Arc::clone(&self.0), next })
    }
}

/// The handler built by [`FromFn::apply`]: the user function bound to one
/// particular `next`.
struct FromFnHandler<F> {
    f: Arc<F>,
    next: Handler,
}

impl<F, Fut> ErasedHandler for FromFnHandler<F>
where
    F: Fn(Request, Handler) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.f)(req, self.next.clone());
        Box::pin(async move { fut.await.into_result() })
    }
}
