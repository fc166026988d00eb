use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use thiserror::Error;
use url::Url;

use crate::signing::ClientRequestLike;
use crate::verifying::ResponseLike;

/// Errors raised by a `Transport` while exchanging bytes with the peer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// No response arrived within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// The HTTP client failed to send the request or read the response.
    #[error("HTTP transport error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Sends a fully signed request and returns the raw response.
///
/// Implementations perform no retries and must not alter the body or any of
/// the signed headers.
pub trait Transport: Send + Sync {
    /// Send the request, blocking until the whole response body has been read.
    fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request)
    }
}

/// Returns the path and query of a URL, which is the form of the request URI that
/// gets signed.
pub(crate) fn request_uri(url: &Url) -> String {
    if let Some(query) = url.query() {
        format!("{}?{}", url.path(), query)
    } else {
        url.path().into()
    }
}

/// An outgoing request, as handed to a `Transport`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl TransportRequest {
    /// Constructs a new request without headers or body
    pub fn new(method: Method, url: Url) -> Self {
        TransportRequest {
            method,
            url,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
    /// Convenience method for setting a header
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
    /// Method for setting a request body
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }
    /// Returns the method used by this request
    pub fn method(&self) -> &Method {
        &self.method
    }
    /// Returns the full URL of this request
    pub fn url(&self) -> &Url {
        &self.url
    }
    /// Returns the path and query of this request
    pub fn request_uri(&self) -> String {
        request_uri(&self.url)
    }
    /// Returns the headers of this request
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
    /// Returns the body of this request
    pub fn body(&self) -> &[u8] {
        &self.body
    }
    /// Splits the request into method, URL, headers and body
    pub fn into_parts(self) -> (Method, Url, HeaderMap, Vec<u8>) {
        (self.method, self.url, self.headers, self.body)
    }
}

impl ClientRequestLike for TransportRequest {
    fn method(&self) -> Method {
        self.method.clone()
    }
    fn request_uri(&self) -> String {
        request_uri(&self.url)
    }
    fn body_bytes(&mut self) -> Option<&[u8]> {
        Some(self.body.as_slice())
    }
    fn set_header(&mut self, header: HeaderName, value: HeaderValue) {
        self.headers.insert(header, value);
    }
}

/// A response as returned by a `Transport`, with the body fully read.
///
/// Until it has been verified, nothing in it should be trusted.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl TransportResponse {
    /// Constructs a new response
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        TransportResponse {
            status,
            headers,
            body,
        }
    }
    /// Returns the HTTP status of this response
    pub fn status(&self) -> StatusCode {
        self.status
    }
    /// Returns the headers of this response
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
    /// Returns the body of this response
    pub fn body(&self) -> &[u8] {
        &self.body
    }
    /// Consumes the response, returning the body
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

impl ResponseLike for TransportResponse {
    fn header(&self, header: &HeaderName) -> Option<&HeaderValue> {
        self.headers.get(header)
    }
    fn body(&self) -> &[u8] {
        &self.body
    }
}
