//! Ordered interceptor chains.
//!
//! # Composition order
//!
//! For interceptors `[a, b, c]` and terminal `t`, [`Chain::then`] returns
//! exactly what manual nesting would:
//!
//! ```text
//! a.apply(b.apply(c.apply(t)))
//! ```
//!
//! `apply` takes the rest of the pipeline as its argument, so the fold runs
//! from the last interceptor to the first. At request time control enters
//! `a` first and leaves it last:
//!
//! ```text
//! a-pre → b-pre → c-pre → t → c-post → b-post → a-post
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use super::{BoxedInterceptor, Interceptor};
use crate::handler::{Handler, IntoHandler, IntoHandlerResult};
use crate::request::Request;

/// An immutable, ordered list of interceptors.
///
/// Declaration order is execution order: the first interceptor is the
/// outermost. Every method that "changes" a chain returns a new one; the
/// receiver and any clones of it are never affected. Cloning is cheap, the
/// list itself is shared.
///
/// A chain is a template. Call [`then`](Chain::then) once per terminal
/// handler; the handlers it returns do not refer back to the chain.
#[derive(Clone)]
pub struct Chain {
    interceptors: Arc<[BoxedInterceptor]>,
    fallback: Handler,
}

impl Chain {
    /// Builds a chain from interceptors in execution order.
    ///
    /// The interceptors are collected into storage owned by the chain, so
    /// later changes to the caller's collection are not seen. An empty list
    /// is valid.
    pub fn new<I>(interceptors: I) -> Self
    where
        I: IntoIterator<Item = BoxedInterceptor>,
    {
        Self {
            interceptors: interceptors.into_iter().collect(),
            fallback: Handler::not_found(),
        }
    }

    /// Sets the handler used by [`then_or_fallback`](Chain::then_or_fallback)
    /// when no terminal is supplied. Defaults to [`Handler::not_found`].
    pub fn with_fallback(self, fallback: impl IntoHandler) -> Self {
        Self { fallback: fallback.into_handler(), ..self }
    }

    /// Returns a new chain running this chain's interceptors followed by
    /// `more`.
    pub fn append<I>(&self, more: I) -> Self
    where
        I: IntoIterator<Item = BoxedInterceptor>,
    {
        let interceptors = self.interceptors.iter().cloned().chain(more).collect();
        Self { interceptors, fallback: self.fallback.clone() }
    }

    /// Returns a new chain running this chain's interceptors followed by
    /// `other`'s. The fallback of `self` is kept.
    pub fn extend(&self, other: &Chain) -> Self {
        self.append(other.interceptors.iter().cloned())
    }

    /// Folds the chain around `terminal`, producing one handler.
    ///
    /// No interceptor is invoked here beyond its `apply`; nothing runs until
    /// the returned handler is called. An empty chain returns `terminal`
    /// itself.
    pub fn then(&self, terminal: impl IntoHandler) -> Handler {
        let composed = self
            .interceptors
            .iter()
            .rev()
            .fold(terminal.into_handler(), |next, interceptor| interceptor.apply(next));

        debug!(interceptors = self.interceptors.len(), "composed handler");
        composed
    }

    /// Shorthand for `then(Handler::from_fn(f))`.
    pub fn then_fn<F, Fut>(&self, f: F) -> Handler
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        self.then(Handler::from_fn(f))
    }

    /// Like [`then`](Chain::then), but accepts a missing terminal.
    ///
    /// `None` is replaced by the chain's fallback handler: whatever was given
    /// to [`with_fallback`](Chain::with_fallback), or [`Handler::not_found`].
    pub fn then_or_fallback(&self, terminal: Option<Handler>) -> Handler {
        let terminal = terminal.unwrap_or_else(|| {
            debug!("no terminal handler given, using fallback");
            self.fallback.clone()
        });
        self.then(terminal)
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl FromIterator<BoxedInterceptor> for Chain {
    fn from_iter<I: IntoIterator<Item = BoxedInterceptor>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("interceptors", &self.interceptors.len())
            .field("fallback", &self.fallback)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use http::StatusCode;

    use super::*;
    use crate::middleware::{self, Interceptor};
    use crate::{Error, Response};

    type Log = Arc<Mutex<Vec<String>>>;

    fn request() -> Request {
        http::Request::new(bytes::Bytes::new()).into()
    }

    /// Records `<name>-pre` and `<name>-post` around delegation.
    fn recorder(name: &'static str, log: &Log) -> BoxedInterceptor {
        let log = Arc::clone(log);
        middleware::boxed(middleware::from_fn(move |req: Request, next: Handler| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{name}-pre"));
                let res = next.call(req).await;
                log.lock().unwrap().push(format!("{name}-post"));
                res
            }
        }))
    }

    fn terminal(log: &Log) -> Handler {
        let log = Arc::clone(log);
        Handler::from_fn(move |_req: Request| {
            log.lock().unwrap().push("t".to_owned());
            async { StatusCode::OK }
        })
    }

    fn entries(log: &Log) -> Vec<String> {
        std::mem::take(&mut *log.lock().unwrap())
    }

    #[tokio::test]
    async fn pre_and_post_run_in_nested_order() {
        let log = Log::default();
        let app = Chain::new([recorder("i1", &log), recorder("i2", &log)]).then(terminal(&log));

        app.call(request()).await.unwrap();
        assert_eq!(entries(&log), ["i1-pre", "i2-pre", "t", "i2-post", "i1-post"]);
    }

    #[tokio::test]
    async fn matches_manual_nesting() {
        let log = Log::default();
        let (a, b, c) = (recorder("a", &log), recorder("b", &log), recorder("c", &log));

        let folded = Chain::new([a.clone(), b.clone(), c.clone()]).then(terminal(&log));
        let nested = a.apply(b.apply(c.apply(terminal(&log))));

        folded.call(request()).await.unwrap();
        let via_chain = entries(&log);
        nested.call(request()).await.unwrap();
        let via_nesting = entries(&log);

        assert_eq!(via_chain, via_nesting);
        assert_eq!(via_chain.first().map(String::as_str), Some("a-pre"));
    }

    #[test]
    fn empty_chain_returns_terminal_unchanged() {
        let t = Handler::not_found();
        assert!(Chain::default().then(t.clone()).ptr_eq(&t));
        assert!(Chain::new(Vec::new()).then(t.clone()).ptr_eq(&t));
    }

    #[tokio::test]
    async fn short_circuit_skips_the_rest() {
        let log = Log::default();
        let deny = middleware::boxed(middleware::from_fn(|_req: Request, _next: Handler| async {
            Response::status(StatusCode::UNAUTHORIZED)
        }));
        let app = Chain::new([recorder("outer", &log), deny, recorder("inner", &log)])
            .then(terminal(&log));

        let res = app.call(request()).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(entries(&log), ["outer-pre", "outer-post"]);
    }

    #[tokio::test]
    async fn composing_does_not_invoke_interceptors() {
        let applied = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let counting = {
            let (applied, calls) = (Arc::clone(&applied), Arc::clone(&calls));
            middleware::boxed(move |next: Handler| {
                applied.fetch_add(1, Ordering::SeqCst);
                let calls = Arc::clone(&calls);
                Handler::from_fn(move |req: Request| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    next.call(req)
                })
            })
        };

        let app = Chain::new([counting]).then(Handler::not_found());
        assert_eq!(applied.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        app.call(request()).await.unwrap();
        app.call(request()).await.unwrap();
        assert_eq!(applied.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_propagate_to_the_caller() {
        let log = Log::default();
        let failing = Handler::from_fn(|_req: Request| async {
            Err::<Response, _>(Error::msg("database unavailable"))
        });
        let app = Chain::new([recorder("outer", &log)]).then(failing);

        let err = app.call(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "handler: database unavailable");
        assert_eq!(entries(&log), ["outer-pre", "outer-post"]);
    }

    #[tokio::test]
    async fn append_leaves_the_original_untouched() {
        let log = Log::default();
        let base = Chain::new([recorder("a", &log)]);
        let longer = base.append([recorder("b", &log)]);

        assert_eq!(base.len(), 1);
        assert_eq!(longer.len(), 2);

        base.then(terminal(&log)).call(request()).await.unwrap();
        assert_eq!(entries(&log), ["a-pre", "t", "a-post"]);

        longer.then(terminal(&log)).call(request()).await.unwrap();
        assert_eq!(entries(&log), ["a-pre", "b-pre", "t", "b-post", "a-post"]);
    }

    #[tokio::test]
    async fn extend_runs_self_then_other() {
        let log = Log::default();
        let first = Chain::new([recorder("a", &log)]);
        let second = Chain::new([recorder("b", &log), recorder("c", &log)]);
        let joined = first.extend(&second);

        assert_eq!((first.len(), second.len(), joined.len()), (1, 2, 3));

        joined.then(terminal(&log)).call(request()).await.unwrap();
        assert_eq!(
            entries(&log),
            ["a-pre", "b-pre", "c-pre", "t", "c-post", "b-post", "a-post"]
        );
    }

    #[tokio::test]
    async fn missing_terminal_uses_not_found_by_default() {
        let res = Chain::default().then_or_fallback(None).call(request()).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_terminal_uses_configured_fallback() {
        let log = Log::default();
        let chain = Chain::new([recorder("a", &log)])
            .with_fallback(|_req: Request| async { StatusCode::SERVICE_UNAVAILABLE });

        let res = chain.then_or_fallback(None).call(request()).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(entries(&log), ["a-pre", "a-post"]);

        let res = chain.then_or_fallback(Some(terminal(&log))).call(request()).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(entries(&log), ["a-pre", "t", "a-post"]);
    }

    #[tokio::test]
    async fn then_fn_wraps_a_closure() {
        let res = Chain::default()
            .then_fn(|_req: Request| async { "hi" })
            .call(request())
            .await
            .unwrap();
        assert_eq!(res.body(), b"hi");
    }

    #[test]
    fn collects_from_iterator() {
        let chain: Chain = (0..3)
            .map(|_| middleware::boxed(|next: Handler| next))
            .collect();
        assert_eq!(chain.len(), 3);
        assert!(!chain.is_empty());
    }
}
