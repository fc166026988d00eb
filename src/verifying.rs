use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use http::Method;
use itertools::{Either, Itertools};
use thiserror::Error;

use crate::algorithm::HttpSignatureVerify;
use crate::canonicalize::{CanonicalizeExt, SigningContext, VerificationContext};
use crate::header::{AuthorizationHeader, ParseAuthorizationError, SecurityHeaders};

/// This error indicates that we failed to verify a message. As a result the
/// message must not be trusted, even partially.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VerifyingError {
    /// One or more of the headers carrying the signature was not present.
    #[error("Missing security headers: {}", .0.iter().join(", "))]
    MissingHeaders(Vec<HeaderName>),
    /// The signature was not valid base64.
    #[error("Signature is not valid base64: {0}")]
    SignatureDecode(#[from] base64::DecodeError),
    /// The signature does not match the content.
    #[error("Signature verification failed")]
    Mismatch,
    /// The `Authorization` header of a request could not be parsed.
    #[error("Malformed authorization header: {0}")]
    MalformedAuthorization(#[from] ParseAuthorizationError),
}

/// The configuration used for verifying responses.
#[derive(Debug, Clone)]
pub struct VerifyingConfig {
    key: Arc<dyn HttpSignatureVerify>,
    headers: SecurityHeaders,
}

impl VerifyingConfig {
    /// Creates a new verifying configuration using the peer's public key.
    pub fn new<K: HttpSignatureVerify>(key: K) -> Self {
        VerifyingConfig {
            key: Arc::new(key),
            headers: SecurityHeaders::default(),
        }
    }

    /// Returns the verification key.
    pub fn key(&self) -> &dyn HttpSignatureVerify {
        &*self.key
    }
    /// Returns the names of the headers carrying the signature.
    ///
    /// These are `Alipay-Timestamp`, `Alipay-Nonce` and `Alipay-Signature` by default.
    pub fn headers(&self) -> &SecurityHeaders {
        &self.headers
    }
    /// Controls the names of the headers carrying the signature (in-place).
    pub fn set_headers(&mut self, headers: SecurityHeaders) -> &mut Self {
        self.headers = headers;
        self
    }
    /// Controls the names of the headers carrying the signature.
    pub fn with_headers(mut self, headers: SecurityHeaders) -> Self {
        self.set_headers(headers);
        self
    }
}

/// This trait is to be implemented for types representing a received HTTP
/// response whose body has been fully read.
pub trait ResponseLike {
    /// Return the value for the given header, or `None` if it's not set.
    fn header(&self, header: &HeaderName) -> Option<&HeaderValue>;
    /// Return the raw response body.
    fn body(&self) -> &[u8];
}

impl<T: ResponseLike> ResponseLike for &T {
    fn header(&self, header: &HeaderName) -> Option<&HeaderValue> {
        (**self).header(header)
    }
    fn body(&self) -> &[u8] {
        (**self).body()
    }
}

/// Import this trait to get access to the `verify` method on all types implementing
/// `ResponseLike`.
pub trait VerifyingExt: Sized {
    /// Verify the response using the given verification configuration.
    fn verify(&self, config: &VerifyingConfig) -> Result<(), VerifyingError>;

    /// Consumes the response, returning it only if it verifies. A response which
    /// fails verification is dropped.
    fn verified(self, config: &VerifyingConfig) -> Result<Self, VerifyingError> {
        self.verify(config)?;
        Ok(self)
    }
}

impl<R: ResponseLike> VerifyingExt for R {
    fn verify(&self, config: &VerifyingConfig) -> Result<(), VerifyingError> {
        let names = config.headers();

        // Find value of each header
        let expected = [names.timestamp(), names.nonce(), names.signature()];
        let (values, missing): (Vec<_>, Vec<_>) =
            expected.into_iter().partition_map(|name| match self.header(name) {
                Some(value) => Either::Left(value),
                None => Either::Right(name.clone()),
            });

        if !missing.is_empty() {
            warn!("Response is missing security headers: {:?}", missing);
            return Err(VerifyingError::MissingHeaders(missing));
        }

        let content = VerificationContext {
            timestamp: values[0].as_bytes(),
            nonce: values[1].as_bytes(),
            body: self.body(),
        }
        .canonicalize();

        config
            .key
            .http_verify(content.as_bytes(), values[2].as_bytes())
            .map_err(|e| {
                warn!("Response signature rejected: {}", e);
                e
            })
    }
}

impl AuthorizationHeader {
    /// Verify this header against the request it was sent with. This is the check
    /// a gateway performs on incoming requests.
    pub fn verify(
        &self,
        method: &Method,
        request_uri: &str,
        body: &[u8],
        key: &dyn HttpSignatureVerify,
    ) -> Result<(), VerifyingError> {
        let content = SigningContext {
            params: self.params(),
            method,
            request_uri,
            body,
        }
        .canonicalize();
        key.http_verify(content.as_bytes(), self.signature().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use http::header::HeaderMap;
    use http::StatusCode;

    use super::*;
    use crate::canonicalize::AuthParams;
    use crate::header::{ALIPAY_NONCE, ALIPAY_SIGNATURE, ALIPAY_TIMESTAMP};
    use crate::transport::TransportResponse;
    use crate::{RsaSha256Sign, RsaSha256Verify, SigningConfig};

    const RESPONSE_BODY: &[u8] = br#"{"qr_code_url":"https://example.com/qr.png"}"#;

    /// Produced with `openssl dgst -sha256 -sign test_data/platform_private.pem`
    /// over `20261019083001\n7d9e0f215f0c7e1a9b2d4c6e8f1a3b5c\n<body>\n`.
    const RESPONSE_SIGNATURE: &str = "LHKgepJezPz0iU/1LBLqohpDjrttSO6nwZ+F4nHVA3meR9/FInTbTziZBsJyZXXF1hwejs+B54DwRaQTImpQ1JG9wCCzRMrv/TWBcdlOck+wAhxSRxZZbeMmC6U+UDjgSAYeFtKjvXe+l7wDvZrSm+CoMghWdJlVYeafbFzhvxuG0a+YxxRDMYPab7VP0z8L1Nv7SgnbejrxkIZEf/Vxwn7K+XHpGev3rD/4MBmaTBcckjLPHfyMNGWzGwDUcAq+xWTonA0hvr9D8VkHryXXi1GtqJ163IL32NoN0zD7600rOOTNMFZTFDkf0izhk2Bl0gP7U3+I8tooJ6DTD4o1Dg==";

    fn test_config() -> VerifyingConfig {
        VerifyingConfig::new(
            RsaSha256Verify::new_pem(include_bytes!("../test_data/platform_public.pem")).unwrap(),
        )
    }

    fn test_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ALIPAY_TIMESTAMP, HeaderValue::from_static("20261019083001"));
        headers.insert(
            ALIPAY_NONCE,
            HeaderValue::from_static("7d9e0f215f0c7e1a9b2d4c6e8f1a3b5c"),
        );
        headers.insert(ALIPAY_SIGNATURE, HeaderValue::from_static(RESPONSE_SIGNATURE));
        headers
    }

    fn test_response(headers: HeaderMap, body: &[u8]) -> TransportResponse {
        TransportResponse::new(StatusCode::OK, headers, body.to_vec())
    }

    #[test]
    fn verifies_reference_response() {
        let response = test_response(test_headers(), RESPONSE_BODY)
            .verified(&test_config())
            .expect("Signature to be verified correctly");
        assert_eq!(response.body(), RESPONSE_BODY);
    }

    #[test]
    fn tampered_response_fails() {
        let config = test_config();

        let body = br#"{"qr_code_url":"https://example.com/qr.pnG"}"#;
        let err = test_response(test_headers(), body).verify(&config).unwrap_err();
        assert!(matches!(err, VerifyingError::Mismatch));

        let mut headers = test_headers();
        headers.insert(ALIPAY_TIMESTAMP, HeaderValue::from_static("20261019083002"));
        let err = test_response(headers, RESPONSE_BODY).verify(&config).unwrap_err();
        assert!(matches!(err, VerifyingError::Mismatch));

        let mut headers = test_headers();
        headers.insert(
            ALIPAY_NONCE,
            HeaderValue::from_static("7d9e0f215f0c7e1a9b2d4c6e8f1a3b5d"),
        );
        let err = test_response(headers, RESPONSE_BODY).verify(&config).unwrap_err();
        assert!(matches!(err, VerifyingError::Mismatch));
    }

    #[test]
    fn wrong_key_fails() {
        let config = VerifyingConfig::new(
            RsaSha256Verify::new_pem(include_bytes!("../test_data/app_public.pem")).unwrap(),
        );
        let err = test_response(test_headers(), RESPONSE_BODY)
            .verified(&config)
            .unwrap_err();
        assert!(matches!(err, VerifyingError::Mismatch));
    }

    #[test]
    fn each_missing_header_is_reported() {
        let config = test_config();
        for name in &[ALIPAY_TIMESTAMP, ALIPAY_NONCE, ALIPAY_SIGNATURE] {
            let mut headers = test_headers();
            headers.remove(name);
            match test_response(headers, RESPONSE_BODY).verify(&config) {
                Err(VerifyingError::MissingHeaders(missing)) => {
                    assert_eq!(&missing, &[name.clone()])
                }
                other => panic!("expected missing {}, got {:?}", name, other),
            }
        }

        match test_response(HeaderMap::new(), RESPONSE_BODY).verify(&config) {
            Err(VerifyingError::MissingHeaders(missing)) => assert_eq!(
                missing,
                vec![ALIPAY_TIMESTAMP, ALIPAY_NONCE, ALIPAY_SIGNATURE]
            ),
            other => panic!("expected missing headers, got {:?}", other),
        }
    }

    #[test]
    fn malformed_signature_header_is_a_decode_error() {
        let mut headers = test_headers();
        headers.insert(ALIPAY_SIGNATURE, HeaderValue::from_static("%%%not-base64%%%"));
        let err = test_response(headers, RESPONSE_BODY)
            .verify(&test_config())
            .unwrap_err();
        assert!(matches!(err, VerifyingError::SignatureDecode(_)));
    }

    #[test]
    fn custom_header_names() {
        let names = SecurityHeaders::new(
            HeaderName::from_static("x-ts"),
            HeaderName::from_static("x-nonce"),
            HeaderName::from_static("x-sig"),
        );
        let config = test_config().with_headers(names);

        let defaults = test_headers();
        let mut headers = HeaderMap::new();
        headers.insert("x-ts", defaults[ALIPAY_TIMESTAMP].clone());
        headers.insert("x-nonce", defaults[ALIPAY_NONCE].clone());
        headers.insert("x-sig", defaults[ALIPAY_SIGNATURE].clone());

        test_response(headers, RESPONSE_BODY)
            .verify(&config)
            .expect("Signature to be verified correctly");

        let err = test_response(defaults, RESPONSE_BODY)
            .verify(&config)
            .unwrap_err();
        assert!(matches!(err, VerifyingError::MissingHeaders(ref m) if m.len() == 3));
    }

    fn app_signing() -> SigningConfig {
        SigningConfig::new(
            "2021000000000000",
            RsaSha256Sign::new_pem(include_bytes!("../test_data/app_private.pem")).unwrap(),
        )
    }

    fn app_public() -> RsaSha256Verify {
        RsaSha256Verify::new_pem(include_bytes!("../test_data/app_public.pem")).unwrap()
    }

    #[test]
    fn qrcode_scenario_round_trip() {
        let uri = "/v3/alipay/open/app/qrcode/create";
        let body = br#"{"url_param":"pages/index"}"#;
        let header = app_signing().authorize(&Method::POST, uri, body).unwrap();

        header
            .verify(&Method::POST, uri, body, &app_public())
            .expect("Signature to be verified correctly");

        let err = header
            .verify(&Method::POST, uri, br#"{"url_param":"pages/indeX"}"#, &app_public())
            .unwrap_err();
        assert!(matches!(err, VerifyingError::Mismatch));
    }

    #[test]
    fn any_changed_field_breaks_request_signature() {
        let uri = "/v3/alipay/open/app/qrcode/create?scene=1";
        let body = br#"{"url_param":"pages/index","query_param":"a=1"}"#;
        let key = app_public();
        let header = app_signing()
            .authorize_at(&Method::POST, uri, body, "20261019083000", "0123456789abcdef")
            .unwrap();
        header.verify(&Method::POST, uri, body, &key).unwrap();

        // Every single-byte change to the body
        for i in 0..body.len() {
            let mut tampered = body.to_vec();
            tampered[i] ^= 0x01;
            assert!(header.verify(&Method::POST, uri, &tampered, &key).is_err());
        }
        // Method and URI
        assert!(header.verify(&Method::GET, uri, body, &key).is_err());
        assert!(header
            .verify(&Method::POST, "/v3/alipay/open/app/qrcode/create?scene=2", body, &key)
            .is_err());

        // Timestamp and nonce
        let retimed = AuthorizationHeader::new(
            header.sign_type(),
            AuthParams::new("2021000000000000", None, "0123456789abcdef", "20261019083001"),
            header.signature().into(),
        );
        assert!(retimed.verify(&Method::POST, uri, body, &key).is_err());
        let renonced = AuthorizationHeader::new(
            header.sign_type(),
            AuthParams::new("2021000000000000", None, "0123456789abcdee", "20261019083000"),
            header.signature().into(),
        );
        assert!(renonced.verify(&Method::POST, uri, body, &key).is_err());
    }

    #[test]
    fn cert_serial_is_part_of_the_signature() {
        let uri = "/v3/alipay/open/app/qrcode/create";
        let body = br#"{"url_param":"pages/index"}"#;
        let with_sn = app_signing()
            .with_app_cert_sn("a1b2c3d4e5f6")
            .authorize_at(&Method::POST, uri, body, "20261019083000", "n1")
            .unwrap();
        with_sn.verify(&Method::POST, uri, body, &app_public()).unwrap();

        let stripped = AuthorizationHeader::new(
            with_sn.sign_type(),
            AuthParams::new("2021000000000000", None, "n1", "20261019083000"),
            with_sn.signature().into(),
        );
        let err = stripped
            .verify(&Method::POST, uri, body, &app_public())
            .unwrap_err();
        assert!(matches!(err, VerifyingError::Mismatch));
    }

    #[test]
    fn parsed_header_verifies() {
        let uri = "/v3/alipay/open/app/qrcode/create";
        let body = br#"{"url_param":"pages/index"}"#;
        let header = app_signing().authorize(&Method::POST, uri, body).unwrap();
        let parsed: AuthorizationHeader = header.to_string().parse().unwrap();
        assert_eq!(parsed, header);
        parsed.verify(&Method::POST, uri, body, &app_public()).unwrap();
    }
}
