//! Minimal onion example: a JSON endpoint behind three interceptors.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i -X POST http://localhost:3000/messages \
//!        -H 'content-type: application/json' \
//!        -d '{"text":"hi"}'
//!   curl -i -X POST http://localhost:3000/messages -d 'hi'   # 415, no cookie

use std::time::Instant;

use chrono::Utc;
use onion::middleware::{self, Chain};
use onion::{Error, Handler, Request, Response, Server, StatusCode};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Declaration order is execution order: `log_request` sees every request,
    // including the ones `filter_content_type` turns away.
    let chain = Chain::new([
        middleware::boxed(middleware::from_fn(log_request)),
        middleware::boxed(middleware::from_fn(filter_content_type)),
        middleware::boxed(middleware::from_fn(set_time_cookie)),
    ]);

    let app = chain.then(create_message);

    if let Err(e) = Server::bind("0.0.0.0:3000").serve(app).await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}

async fn log_request(req: Request, next: Handler) -> Result<Response, Error> {
    let (method, path) = (req.method().clone(), req.path().to_owned());
    let started = Instant::now();

    let res = next.call(req).await;

    let status = res.as_ref().map(|r| r.status_code().as_u16()).unwrap_or(500);
    info!(%method, %path, status, elapsed = ?started.elapsed(), "request");
    res
}

async fn filter_content_type(req: Request, next: Handler) -> Result<Response, Error> {
    if req.header("content-type") != Some("application/json") {
        return Ok(Response::builder()
            .status(StatusCode::UNSUPPORTED_MEDIA_TYPE)
            .text("expected application/json"));
    }
    next.call(req).await
}

async fn set_time_cookie(req: Request, next: Handler) -> Result<Response, Error> {
    let mut res = next.call(req).await?;
    let cookie = format!("time={}; Path=/", Utc::now().to_rfc3339());
    if let Ok(value) = cookie.parse() {
        res.headers_mut().append("set-cookie", value);
    }
    Ok(res)
}

// POST /messages (any path, really: onion does not route)
//
// req.body() is &[u8]; parse it with serde_json::from_slice or similar.
async fn create_message(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }
    Response::builder()
        .status(StatusCode::CREATED)
        .json(req.body().to_vec())
}
