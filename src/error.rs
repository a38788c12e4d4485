//! Unified error type.

use std::fmt;

/// A boxed error from user code, as carried by [`Error::Handler`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by onion's fallible operations.
///
/// Request-level refusals (404, 415, 422, etc.) are expressed as
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures (binding to a port, accepting a connection) and
/// request-time failures raised by an interceptor or terminal handler.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// A handler in the pipeline failed. The chain never catches this; it
    /// travels outward until an interceptor handles it or it reaches the
    /// server, which answers `500 Internal Server Error`.
    #[error("handler: {0}")]
    Handler(#[source] BoxError),
}

impl Error {
    /// Wraps any error raised while handling a request.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// Builds a handler error from a plain message.
    pub fn msg(msg: impl fmt::Display) -> Self {
        Self::Handler(msg.to_string().into())
    }
}
