use std::convert::TryFrom;
use std::sync::Arc;

use chrono::Local;
use http::header::{HeaderName, HeaderValue, InvalidHeaderValue, AUTHORIZATION};
use http::Method;
use openssl::error::ErrorStack;
use thiserror::Error;
use uuid::Uuid;

use crate::algorithm::HttpSignatureSign;
use crate::canonicalize::{AuthParams, CanonicalizeExt, SigningContext};
use crate::header::{AuthorizationHeader, ALIPAY_REQUEST_ID, DEFAULT_SIGN_TYPE};
use crate::TIMESTAMP_FORMAT;

/// This trait is to be implemented for types representing an outgoing
/// HTTP request. The signing extension methods are available on any type
/// implementing this trait.
pub trait ClientRequestLike {
    /// Returns the request method.
    fn method(&self) -> Method;
    /// Returns the path and query of the request, without scheme or host.
    fn request_uri(&self) -> String;
    /// Returns the request body, or an empty slice if there is none. Returns `None`
    /// if the body cannot be read without consuming it.
    fn body_bytes(&mut self) -> Option<&[u8]>;
    /// Add a header to the request, replacing any existing value.
    fn set_header(&mut self, header: HeaderName, value: HeaderValue);
}

/// The types of error which may occur whilst signing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SigningError {
    /// The cryptographic library failed to produce a signature.
    #[error("Failed to compute signature: {0}")]
    Crypto(#[from] ErrorStack),
    /// The request body is a stream, so it cannot be included in the signature.
    #[error("Request body cannot be read without consuming it")]
    UnbufferedBody,
    /// The configured app ID or sign type produced an invalid header.
    #[error("Signed header is not a valid header value: {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
}

/// The configuration used for signing outgoing requests.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    signature: Arc<dyn HttpSignatureSign>,
    app_id: String,
    app_cert_sn: Option<String>,
    sign_type: String,
    request_id_header: HeaderName,
}

impl SigningConfig {
    /// Creates a new signing configuration for the given application ID and
    /// signing key.
    pub fn new<SigAlg: HttpSignatureSign>(app_id: &str, signature: SigAlg) -> Self {
        SigningConfig {
            signature: Arc::new(signature),
            app_id: app_id.into(),
            app_cert_sn: None,
            sign_type: DEFAULT_SIGN_TYPE.into(),
            request_id_header: ALIPAY_REQUEST_ID,
        }
    }

    /// Returns the signing key.
    pub fn signature(&self) -> &dyn HttpSignatureSign {
        &*self.signature
    }
    /// Returns the application ID.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }
    /// Returns the application certificate serial number.
    ///
    /// This is unset by default.
    pub fn app_cert_sn(&self) -> Option<&str> {
        self.app_cert_sn.as_deref()
    }
    /// Controls the application certificate serial number (in-place). When set
    /// it becomes part of the signed content.
    pub fn set_app_cert_sn(&mut self, app_cert_sn: Option<String>) -> &mut Self {
        self.app_cert_sn = app_cert_sn.filter(|sn| !sn.is_empty());
        self
    }
    /// Controls the application certificate serial number. When set it becomes
    /// part of the signed content.
    pub fn with_app_cert_sn(mut self, app_cert_sn: &str) -> Self {
        self.set_app_cert_sn(Some(app_cert_sn.into()));
        self
    }
    /// Returns the label placed in front of the authorization parameters.
    ///
    /// This is `ALIPAY-SHA256withRSA` by default.
    pub fn sign_type(&self) -> &str {
        &self.sign_type
    }
    /// Controls the label placed in front of the authorization parameters (in-place).
    pub fn set_sign_type(&mut self, sign_type: &str) -> &mut Self {
        self.sign_type = sign_type.into();
        self
    }
    /// Controls the label placed in front of the authorization parameters.
    pub fn with_sign_type(mut self, sign_type: &str) -> Self {
        self.set_sign_type(sign_type);
        self
    }
    /// Returns the header which carries a copy of the nonce.
    ///
    /// This is `alipay-request-id` by default.
    pub fn request_id_header(&self) -> &HeaderName {
        &self.request_id_header
    }
    /// Controls the header which carries a copy of the nonce (in-place).
    pub fn set_request_id_header(&mut self, header: HeaderName) -> &mut Self {
        self.request_id_header = header;
        self
    }
    /// Controls the header which carries a copy of the nonce.
    pub fn with_request_id_header(mut self, header: HeaderName) -> Self {
        self.set_request_id_header(header);
        self
    }

    /// Build a signed authorization header for the given request using a fresh
    /// timestamp and nonce.
    pub fn authorize(
        &self,
        method: &Method,
        request_uri: &str,
        body: &[u8],
    ) -> Result<AuthorizationHeader, SigningError> {
        let timestamp = current_timestamp();
        let nonce = generate_nonce();
        info!(
            "Signing {} {} with nonce {} at {}",
            method, request_uri, nonce, timestamp
        );
        self.authorize_at(method, request_uri, body, &timestamp, &nonce)
    }

    /// Build a signed authorization header using the provided timestamp and nonce.
    ///
    /// The result depends only on the arguments and this configuration. A
    /// timestamp/nonce pair must never be used for more than one request.
    pub fn authorize_at(
        &self,
        method: &Method,
        request_uri: &str,
        body: &[u8],
        timestamp: &str,
        nonce: &str,
    ) -> Result<AuthorizationHeader, SigningError> {
        let params = AuthParams::new(&*self.app_id, self.app_cert_sn.clone(), nonce, timestamp);
        let content = SigningContext {
            params: &params,
            method,
            request_uri,
            body,
        }
        .canonicalize();
        let signature = self.signature.http_sign(content.as_bytes())?;
        Ok(AuthorizationHeader::new(&*self.sign_type, params, signature))
    }
}

/// Returns the current local time formatted as `YYYYMMDDHHmmss`.
pub fn current_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Returns a new nonce: 32 lowercase hex characters carrying 122 bits from the
/// operating system's secure random source. Safe to call concurrently.
pub fn generate_nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Import this trait to get access to the `sign` method on all types implementing
/// `ClientRequestLike`.
pub trait SigningExt: Sized {
    /// Consumes the request and returns it signed according to the provided configuration.
    fn signed(mut self, config: &SigningConfig) -> Result<Self, SigningError> {
        self.sign(config)?;
        Ok(self)
    }

    /// Signs the request in-place according to the provided configuration, setting
    /// the `Authorization` and request ID headers. Returns the header that was added.
    fn sign(&mut self, config: &SigningConfig) -> Result<AuthorizationHeader, SigningError>;
}

impl<R: ClientRequestLike> SigningExt for R {
    fn sign(&mut self, config: &SigningConfig) -> Result<AuthorizationHeader, SigningError> {
        let method = self.method();
        let request_uri = self.request_uri();
        let authorization = {
            let body = self.body_bytes().ok_or(SigningError::UnbufferedBody)?;
            config.authorize(&method, &request_uri, body)?
        };

        let auth_value = HeaderValue::try_from(&authorization)?;
        let request_id = HeaderValue::try_from(authorization.nonce())?;
        self.set_header(AUTHORIZATION, auth_value);
        self.set_header(config.request_id_header.clone(), request_id);

        Ok(authorization)
    }
}
