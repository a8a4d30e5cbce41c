//! Plain HTTP forwarding.
//!
//! # Responsibilities
//! - Resolve the origin from an absolute URI or the `Host` header
//! - Send the request once through the default hyper client
//! - Reproduce the origin's status and header set, then stream its body
//!
//! # Design Decisions
//! - No timeout, retry or pool tuning: the client is built with defaults
//! - Headers are appended, never inserted, so repeated keys keep their order
//! - The origin body is handed to hyper as-is; a mid-body failure truncates
//!   the response and the status already sent stands

use axum::body::Body;
use axum::http::uri::{Scheme, Uri};
use axum::http::{header, HeaderMap, Request};
use axum::response::Response;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use super::ProxyError;

/// Client used to reach origins.
pub type HttpClient = Client<HttpConnector, Body>;

/// Build the origin client with default transport behavior.
pub fn build_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Append every entry of `src` to `dst`, keeping what `dst` already holds.
pub fn copy_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src {
        dst.append(name.clone(), value.clone());
    }
}

/// Absolute URI of the origin for `req`.
pub(crate) fn origin_uri<B>(req: &Request<B>) -> Result<Uri, ProxyError> {
    let uri = req.uri();
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Ok(uri.clone());
    }

    let authority = match uri.authority() {
        Some(authority) => authority.as_str(),
        None => req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ProxyError::InvalidTarget(uri.to_string()))?,
    };
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| ProxyError::InvalidTarget(e.to_string()))
}

/// Forward a non-CONNECT request and relay the origin's response.
pub(crate) async fn forward(client: &HttpClient, mut req: Request<Body>) -> Result<Response, ProxyError> {
    *req.uri_mut() = origin_uri(&req)?;

    let (parts, body) = client.request(req).await?.into_parts();

    let mut response = Response::new(Body::new(body));
    *response.status_mut() = parts.status;
    copy_headers(response.headers_mut(), &parts.headers);
    Ok(response)
}
