//! # onion
//!
//! Order-preserving middleware chains for async HTTP handlers.
//!
//! ## The contract
//!
//! A [`Handler`] answers requests. An
//! [`Interceptor`](middleware::Interceptor) takes the handler downstream of it
//! and returns a new handler that may act before and after delegating, or not
//! delegate at all. A [`Chain`](middleware::Chain) is an immutable, ordered
//! list of interceptors; [`Chain::then`](middleware::Chain::then) folds it
//! around a terminal handler so that the first interceptor declared runs
//! first on the way in and last on the way out.
//!
//! What onion intentionally leaves out:
//!
//! - **Routing** — one composed handler serves every request
//! - **Built-in middleware** — interceptors are yours to write
//! - **Configuration files** — pipelines are assembled in code
//! - **Implicit error recovery** — an `Err` travels outward untouched until
//!   an interceptor handles it; the [`Server`] answers whatever is left with
//!   `500 Internal Server Error`
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use onion::middleware::{self, Chain};
//! use onion::{Handler, Request, Response, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let require_json = middleware::from_fn(|req: Request, next: Handler| async move {
//!         if req.header("content-type") != Some("application/json") {
//!             return Ok(Response::status(StatusCode::UNSUPPORTED_MEDIA_TYPE));
//!         }
//!         next.call(req).await
//!     });
//!
//!     let app = Chain::new([middleware::boxed(require_json)]).then(create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(r#"{"id":"99"}"#)
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod server;

pub mod middleware;

pub use error::{BoxError, Error};
pub use handler::{BoxFuture, Handler, IntoHandler, IntoHandlerResult};
pub use http::StatusCode;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use server::Server;
