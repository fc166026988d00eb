use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::Method;

use super::*;
use crate::transport::request_uri;

impl ClientRequestLike for reqwest::Request {
    fn method(&self) -> Method {
        reqwest::Request::method(self).clone()
    }
    fn request_uri(&self) -> String {
        request_uri(self.url())
    }
    fn body_bytes(&mut self) -> Option<&[u8]> {
        match self.body() {
            Some(body) => body.as_bytes(),
            None => Some(&[][..]),
        }
    }
    fn set_header(&mut self, header: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(header, value);
    }
}

impl ClientRequestLike for reqwest::blocking::Request {
    fn method(&self) -> Method {
        reqwest::blocking::Request::method(self).clone()
    }
    fn request_uri(&self) -> String {
        request_uri(self.url())
    }
    fn body_bytes(&mut self) -> Option<&[u8]> {
        match self.body_mut() {
            Some(body) => body.buffer().ok(),
            None => Some(&[][..]),
        }
    }
    fn set_header(&mut self, header: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(header, value);
    }
}

/// A `Transport` backed by a blocking reqwest client.
///
/// Each request is bounded by the configured timeout; a request which times out
/// does not affect any other request sharing the client. Must not be used from
/// within an async runtime.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Creates a transport with a new client and the default timeout.
    pub fn new() -> Self {
        Self::with_client(reqwest::blocking::Client::new())
    }
    /// Creates a transport sharing an existing client.
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        ReqwestTransport {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }
    /// Returns the per-request timeout.
    ///
    /// This is set to 30 seconds by default.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
    /// Controls the per-request timeout (in-place).
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }
    /// Controls the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.set_timeout(timeout);
        self
    }

    fn map_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Http(Box::new(e))
        }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let (method, url, headers, body) = request.into_parts();
        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .timeout(self.timeout)
            .send()
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().map_err(|e| self.map_error(e))?;

        Ok(TransportResponse::new(status, headers, body.to_vec()))
    }
}
