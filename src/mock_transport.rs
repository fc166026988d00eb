use std::convert::TryFrom;
use std::sync::{Mutex, PoisonError};

use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use http::StatusCode;
use serde_json::json;

use crate::canonicalize::{CanonicalizeExt, VerificationContext};
use crate::header::{AuthorizationHeader, SecurityHeaders};
use crate::signing::{current_timestamp, generate_nonce, SigningError};
use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::verifying::VerifyingError;
use crate::{HttpSignatureSign, RsaSha256Sign, RsaSha256Verify};

/// Sign a response body the way the gateway does, returning the three security
/// headers.
pub fn sign_response(
    key: &dyn HttpSignatureSign,
    names: &SecurityHeaders,
    timestamp: &str,
    nonce: &str,
    body: &[u8],
) -> Result<HeaderMap, SigningError> {
    let content = VerificationContext {
        timestamp: timestamp.as_bytes(),
        nonce: nonce.as_bytes(),
        body,
    }
    .canonicalize();
    let signature = key.http_sign(content.as_bytes())?;

    let mut headers = HeaderMap::new();
    headers.insert(names.timestamp().clone(), HeaderValue::try_from(timestamp)?);
    headers.insert(names.nonce().clone(), HeaderValue::try_from(nonce)?);
    headers.insert(names.signature().clone(), HeaderValue::try_from(signature)?);
    Ok(headers)
}

/// An in-process stand-in for the gateway.
///
/// Every request is recorded. When an application key is configured the
/// `Authorization` header is checked, and a failing request gets a signed
/// `401` error body with code `invalid-signature`. Responses are signed with the
/// platform key unless one of the tampering options says otherwise.
#[derive(Debug)]
pub struct MockGateway {
    platform_key: RsaSha256Sign,
    app_key: Option<RsaSha256Verify>,
    names: SecurityHeaders,
    response_body: Vec<u8>,
    omit_header: Option<HeaderName>,
    tamper_body: bool,
    signature: Option<String>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockGateway {
    /// Constructs a gateway which signs its responses with `platform_key` and
    /// answers every request with `{}`.
    pub fn new(platform_key: RsaSha256Sign) -> Self {
        MockGateway {
            platform_key,
            app_key: None,
            names: SecurityHeaders::default(),
            response_body: b"{}".to_vec(),
            omit_header: None,
            tamper_body: false,
            signature: None,
            requests: Mutex::new(Vec::new()),
        }
    }
    /// Check request signatures against this application public key
    pub fn with_app_key(mut self, app_key: RsaSha256Verify) -> Self {
        self.app_key = Some(app_key);
        self
    }
    /// Body returned for accepted requests
    pub fn with_response_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.response_body = body.into();
        self
    }
    /// Names of the response security headers
    pub fn with_security_headers(mut self, names: SecurityHeaders) -> Self {
        self.names = names;
        self
    }
    /// Leave one security header off every response
    pub fn without_header(mut self, header: HeaderName) -> Self {
        self.omit_header = Some(header);
        self
    }
    /// Alter the response body after it has been signed
    pub fn with_tampered_body(mut self) -> Self {
        self.tamper_body = true;
        self
    }
    /// Replace the response signature with a fixed value
    pub fn with_signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Returns a copy of every request received so far.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_request(&self, request: &TransportRequest) -> Result<(), VerifyingError> {
        let key = match &self.app_key {
            Some(key) => key,
            None => return Ok(()),
        };
        let authorization: AuthorizationHeader = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| VerifyingError::MissingHeaders(vec![AUTHORIZATION]))?
            .parse()?;
        authorization.verify(request.method(), &request.request_uri(), request.body(), key)
    }

    fn respond(
        &self,
        status: StatusCode,
        mut body: Vec<u8>,
    ) -> Result<TransportResponse, SigningError> {
        let mut headers = sign_response(
            &self.platform_key,
            &self.names,
            &current_timestamp(),
            &generate_nonce(),
            &body,
        )?;
        if let Some(signature) = &self.signature {
            headers.insert(
                self.names.signature().clone(),
                HeaderValue::try_from(signature.as_str())?,
            );
        }
        if let Some(header) = &self.omit_header {
            headers.remove(header);
        }
        if self.tamper_body {
            body.push(b' ');
        }
        Ok(TransportResponse::new(status, headers, body))
    }
}

impl Transport for MockGateway {
    fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let (status, body) = match self.check_request(&request) {
            Ok(()) => (StatusCode::OK, self.response_body.clone()),
            Err(e) => (
                StatusCode::UNAUTHORIZED,
                json!({"code": "invalid-signature", "message": e.to_string()})
                    .to_string()
                    .into_bytes(),
            ),
        };
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        self.respond(status, body)
            .map_err(|e| TransportError::Http(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use url::Url;

    use super::*;
    use crate::{SigningConfig, SigningExt, VerifyingConfig, VerifyingExt};

    fn platform_key() -> RsaSha256Sign {
        RsaSha256Sign::new_pem(include_bytes!("../test_data/platform_private.pem")).unwrap()
    }

    fn platform_public() -> VerifyingConfig {
        VerifyingConfig::new(
            RsaSha256Verify::new_pem(include_bytes!("../test_data/platform_public.pem")).unwrap(),
        )
    }

    fn request() -> TransportRequest {
        TransportRequest::new(
            Method::POST,
            Url::parse("https://openapi.alipay.com/v3/alipay/open/app/qrcode/create").unwrap(),
        )
        .with_body(b"{}".to_vec())
    }

    #[test]
    fn signed_response_matches_reference_vector() {
        let headers = sign_response(
            &platform_key(),
            &SecurityHeaders::default(),
            "20261019083001",
            "7d9e0f215f0c7e1a9b2d4c6e8f1a3b5c",
            br#"{"qr_code_url":"https://example.com/qr.png"}"#,
        )
        .unwrap();
        assert!(headers["alipay-signature"]
            .to_str()
            .unwrap()
            .starts_with("LHKgepJezPz0iU/1LBLqohpDjrttSO6nwZ+F4nHVA3meR9/FInTbTziZBsJyZXXF1hwej"));
    }

    #[test]
    fn responses_verify_with_platform_key() {
        let gateway = MockGateway::new(platform_key()).with_response_body("{\"ok\":true}");
        let response = gateway.send(request()).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.verify(&platform_public()).unwrap();
        assert_eq!(gateway.requests(), vec![request()]);
    }

    #[test]
    fn unsigned_request_is_refused_when_app_key_is_set() {
        let gateway = MockGateway::new(platform_key()).with_app_key(
            RsaSha256Verify::new_pem(include_bytes!("../test_data/app_public.pem")).unwrap(),
        );
        let response = gateway.send(request()).unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        // Error responses are signed too
        response.verify(&platform_public()).unwrap();

        let signed = request()
            .signed(&SigningConfig::new(
                "2021000000000000",
                RsaSha256Sign::new_pem(include_bytes!("../test_data/app_private.pem")).unwrap(),
            ))
            .unwrap();
        assert_eq!(gateway.send(signed).unwrap().status(), StatusCode::OK);
    }
}
