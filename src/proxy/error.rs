//! Errors raised before the proxy has signaled success to the client.
//!
//! Anything that fails after the `200` of a tunnel or after a forwarded
//! response head has been written is not represented here: those failures
//! simply end the stream.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure while setting up a tunnel or forwarding a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The CONNECT target could not be reached (refused, unresolvable, ...).
    #[error("dial tcp {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: io::Error,
    },

    /// The CONNECT target did not answer within the connect timeout.
    #[error("dial tcp {target}: i/o timeout")]
    DialTimeout { target: String, timeout: Duration },

    /// The serving connection cannot hand over its raw byte stream.
    #[error("raw connection takeover not supported")]
    TakeoverUnsupported,

    /// hyper failed to hand over the connection after the `200`.
    #[error("connection takeover failed: {0}")]
    Upgrade(#[source] hyper::Error),

    /// The request carries no usable target authority.
    #[error("no target host in request: {0}")]
    InvalidTarget(String),

    /// The origin round trip failed before a response head arrived.
    #[error("{}", error_chain(.0))]
    Forward(#[from] hyper_util::client::legacy::Error),
}

impl ProxyError {
    /// HTTP status reported to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::TakeoverUnsupported | ProxyError::Upgrade(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::Dial { .. }
            | ProxyError::DialTimeout { .. }
            | ProxyError::InvalidTarget(_)
            | ProxyError::Forward(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Render an error with all of its sources, `outer: inner: root`.
fn error_chain(err: &dyn StdError) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
