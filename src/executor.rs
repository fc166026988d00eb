use http::header::{HeaderValue, CONTENT_TYPE};
use http::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::keys::KeyError;
use crate::signing::{SigningConfig, SigningError, SigningExt};
use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::verifying::{VerifyingConfig, VerifyingError, VerifyingExt};

/// Every way a call through the `RequestExecutor` can fail. None of these are
/// retried internally; a caller retrying an idempotent call must go through
/// `execute` again so the request is re-signed with a fresh nonce and timestamp.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Key material could not be loaded.
    #[error(transparent)]
    Key(#[from] KeyError),
    /// The request could not be signed.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// The request could not be delivered, or no response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The response is missing its signature or the signature is invalid.
    #[error(transparent)]
    Verifying(#[from] VerifyingError),
    /// The request URI could not be joined onto the gateway URL.
    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),
    /// The request URI is not a path, or resolves outside the gateway.
    #[error("Request URI must be a path on the gateway, got {0:?}")]
    ForeignRequestUri(String),
    /// A request or verified response body was not the expected JSON.
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The gateway answered with a verified error response.
    #[error("Gateway returned error {code}: {message}")]
    Api {
        /// Error code reported by the gateway
        code: String,
        /// Human readable message reported by the gateway
        message: String,
    },
}

/// Signs outgoing requests, hands them to a transport and verifies the
/// responses before returning them.
#[derive(Debug, Clone)]
pub struct RequestExecutor<T> {
    transport: T,
    gateway: Url,
    signing: SigningConfig,
    verifying: VerifyingConfig,
}

impl<T: Transport> RequestExecutor<T> {
    /// Creates a new executor sending requests relative to `gateway`.
    pub fn new(
        transport: T,
        gateway: Url,
        signing: SigningConfig,
        verifying: VerifyingConfig,
    ) -> Self {
        RequestExecutor {
            transport,
            gateway,
            signing,
            verifying,
        }
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
    /// Returns the gateway base URL.
    pub fn gateway(&self) -> &Url {
        &self.gateway
    }
    /// Returns the signing configuration.
    pub fn signing_config(&self) -> &SigningConfig {
        &self.signing
    }
    /// Returns the verifying configuration.
    pub fn verifying_config(&self) -> &VerifyingConfig {
        &self.verifying
    }

    /// Sign and send a request, returning the response only once its signature
    /// has been verified.
    ///
    /// `request_uri` is the path and query of the endpoint, eg.
    /// `/v3/alipay/open/app/qrcode/create`. Anything carrying a scheme or host
    /// is rejected before signing.
    pub fn execute(
        &self,
        method: Method,
        request_uri: &str,
        body: Vec<u8>,
    ) -> Result<TransportResponse, Error> {
        let url = self.resolve(request_uri)?;
        let mut request = TransportRequest::new(method, url)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body);

        let authorization = request.sign(&self.signing)?;
        info!(
            "{} {} (request id {})",
            request.method(),
            request.url(),
            authorization.nonce()
        );

        let response = self.transport.send(request)?;
        info!(
            "Response {} for request id {}",
            response.status(),
            authorization.nonce()
        );

        Ok(response.verified(&self.verifying)?)
    }

    fn resolve(&self, request_uri: &str) -> Result<Url, Error> {
        let foreign = || Error::ForeignRequestUri(request_uri.into());
        if !request_uri.starts_with('/') || request_uri.starts_with("//") {
            return Err(foreign());
        }
        let url = self.gateway.join(request_uri)?;
        // `\` counts as `/` for http(s), so `/\host` escapes the check above
        if url.origin() != self.gateway.origin() {
            warn!("Refusing to send {} outside of {}", url, self.gateway);
            return Err(foreign());
        }
        Ok(url)
    }

    /// Send `body` as JSON with a `POST` and decode the verified JSON response.
    pub fn post_json<B, R>(&self, request_uri: &str, body: &B) -> Result<R, Error>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_vec(body)?;
        let response = self.execute(Method::POST, request_uri, body)?;
        parse_response(response.body())
    }

    /// Send a `GET` and decode the verified JSON response.
    pub fn get_json<R: DeserializeOwned>(&self, request_uri: &str) -> Result<R, Error> {
        let response = self.execute(Method::GET, request_uri, Vec::new())?;
        parse_response(response.body())
    }
}

#[derive(Deserialize)]
struct GatewayStatus {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Decode a verified response body, surfacing a non-empty `code` field as
/// `Error::Api`.
pub fn parse_response<R: DeserializeOwned>(body: &[u8]) -> Result<R, Error> {
    let status: GatewayStatus = serde_json::from_slice(body)?;
    if !status.code.is_empty() {
        return Err(Error::Api {
            code: status.code,
            message: status.message,
        });
    }
    Ok(serde_json::from_slice(body)?)
}
