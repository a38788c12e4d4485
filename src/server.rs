//! HTTP server and graceful shutdown.
//!
//! The server is the boundary a composed pipeline is installed at: every
//! request on every connection goes to one [`Handler`], usually the result
//! of [`Chain::then`](crate::middleware::Chain::then).
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C (or when the future given to
//! [`Server::serve_with_shutdown`] resolves) the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns, which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::handler::{Handler, IntoHandler};
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    addr: String,
}

impl Server {
    /// Configures the server to bind to `addr` (`host:port`) when
    /// [`serve`](Server::serve) is called.
    ///
    /// ```rust,no_run
    /// use onion::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Serves `handler` until SIGTERM or Ctrl-C, then drains in-flight
    /// connections and returns.
    pub async fn serve(self, handler: impl IntoHandler) -> Result<(), Error> {
        self.serve_with_shutdown(handler, shutdown_signal()).await
    }

    /// Serves `handler` until `signal` resolves.
    pub async fn serve_with_shutdown(
        self,
        handler: impl IntoHandler,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let addr: SocketAddr = self.addr.parse().map_err(|source| Error::InvalidAddress {
            addr: self.addr.clone(),
            source,
        })?;
        let listener = TcpListener::bind(addr).await?;
        serve_listener(listener, handler.into_handler(), signal).await
    }
}

/// Accept loop over an already-bound listener.
pub(crate) async fn serve_listener(
    listener: TcpListener,
    handler: Handler,
    signal: impl Future<Output = ()>,
) -> Result<(), Error> {
    info!(addr = %listener.local_addr()?, "onion listening");

    // JoinSet tracks every spawned connection task so we can wait for them
    // all to finish during graceful shutdown.
    let mut tasks = tokio::task::JoinSet::new();

    tokio::pin!(signal);

    loop {
        tokio::select! {
            // Check shutdown first so a signal immediately stops accepting
            // new connections, even if more are queued.
            biased;

            () = &mut signal => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let handler = handler.clone();
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // Called once per request on the connection, not once
                    // per connection.
                    let svc = service_fn(move |req| dispatch(handler.clone(), req, remote_addr));

                    // HTTP/1.1 or HTTP/2, whatever the client negotiates.
                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(io, svc)
                        .await
                    {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}

    info!("onion stopped");
    Ok(())
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Runs one request through the pipeline.
///
/// All failures are answered here (400 for an unreadable body, 500 for a
/// handler error), so hyper never sees an error.
async fn dispatch(
    handler: Handler,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let method = parts.method.clone();
    let path = parts.uri.path().to_owned();

    let response = match handler.call(Request::from_parts(parts, body)).await {
        Ok(res) => res,
        Err(e) => {
            error!(peer = %remote_addr, %method, %path, "request failed: {e}");
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. If a signal handler cannot be
/// installed the failure is logged and that signal is ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;
    use crate::middleware::{self, Chain};

    async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn serves_composed_handler_and_shuts_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stamp = middleware::from_fn(|req: Request, next: Handler| async move {
            let mut res = next.call(req).await?;
            res.headers_mut().insert("x-served-by", "onion".parse().unwrap());
            Ok::<_, Error>(res)
        });
        let app = Chain::new([middleware::boxed(stamp)])
            .then(|req: Request| async move { Response::text(req.path().to_owned()) });

        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_listener(listener, app, async {
            let _ = rx.await;
        }));

        let reply = roundtrip(
            addr,
            "GET /hello HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n",
        )
        .await;
        assert!(reply.starts_with("HTTP/1.1 200 OK"), "{reply}");
        assert!(reply.contains("x-served-by: onion"), "{reply}");
        assert!(reply.ends_with("/hello"), "{reply}");

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn handler_error_becomes_500() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Handler::from_fn(|_req: Request| async {
            Err::<Response, _>(Error::msg("upstream timed out"))
        });

        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_listener(listener, app, async {
            let _ = rx.await;
        }));

        let reply = roundtrip(
            addr,
            "GET / HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n",
        )
        .await;
        assert!(reply.starts_with("HTTP/1.1 500 Internal Server Error"), "{reply}");

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn invalid_address_is_reported() {
        let err = Server::bind("not-an-address")
            .serve_with_shutdown(Handler::not_found(), async {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { .. }), "{err}");
    }
}
