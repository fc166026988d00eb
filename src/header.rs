use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use http::header::{HeaderName, HeaderValue, InvalidHeaderValue};
use thiserror::Error;

use crate::canonicalize::AuthParams;

/// Default label placed in front of the authorization parameters.
pub const DEFAULT_SIGN_TYPE: &str = "ALIPAY-SHA256withRSA";

/// Response header carrying the gateway's signing timestamp.
pub const ALIPAY_TIMESTAMP: HeaderName = HeaderName::from_static("alipay-timestamp");
/// Response header carrying the gateway's nonce.
pub const ALIPAY_NONCE: HeaderName = HeaderName::from_static("alipay-nonce");
/// Response header carrying the gateway's base64 signature.
pub const ALIPAY_SIGNATURE: HeaderName = HeaderName::from_static("alipay-signature");
/// Request header echoing the request nonce.
pub const ALIPAY_REQUEST_ID: HeaderName = HeaderName::from_static("alipay-request-id");

/// Names of the response headers which carry the peer's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityHeaders {
    timestamp: HeaderName,
    nonce: HeaderName,
    signature: HeaderName,
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        SecurityHeaders::new(ALIPAY_TIMESTAMP, ALIPAY_NONCE, ALIPAY_SIGNATURE)
    }
}

impl SecurityHeaders {
    /// Use custom header names, for gateways other than the default one.
    pub fn new(timestamp: HeaderName, nonce: HeaderName, signature: HeaderName) -> Self {
        SecurityHeaders {
            timestamp,
            nonce,
            signature,
        }
    }
    /// Timestamp header name
    pub fn timestamp(&self) -> &HeaderName {
        &self.timestamp
    }
    /// Nonce header name
    pub fn nonce(&self) -> &HeaderName {
        &self.nonce
    }
    /// Signature header name
    pub fn signature(&self) -> &HeaderName {
        &self.signature
    }
}

/// Errors which may occur when parsing an `Authorization` header value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseAuthorizationError {
    /// There was no space separating the sign type from the parameters.
    #[error("Missing sign type")]
    MissingSignType,
    /// A comma separated part was not of the form `key=value`.
    #[error("Malformed authorization parameter: {0:?}")]
    MalformedParameter(String),
    /// A required parameter was not present.
    #[error("Missing authorization parameter: {0}")]
    MissingParameter(&'static str),
}

/// A parsed or freshly built `Authorization` header.
///
/// Formats as `<sign type> <auth params>,sign=<base64 signature>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationHeader {
    sign_type: String,
    params: AuthParams,
    signature: String,
}

impl AuthorizationHeader {
    /// Assemble a header from its parts.
    pub fn new(sign_type: impl Into<String>, params: AuthParams, signature: String) -> Self {
        AuthorizationHeader {
            sign_type: sign_type.into(),
            params,
            signature,
        }
    }
    /// The sign type label, eg. `ALIPAY-SHA256withRSA`
    pub fn sign_type(&self) -> &str {
        &self.sign_type
    }
    /// The signed authorization parameters
    pub fn params(&self) -> &AuthParams {
        &self.params
    }
    /// The request nonce, also used as the request ID
    pub fn nonce(&self) -> &str {
        self.params.nonce()
    }
    /// The base64 encoded signature
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl fmt::Display for AuthorizationHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {},sign={}", self.sign_type, self.params, self.signature)
    }
}

impl TryFrom<&AuthorizationHeader> for HeaderValue {
    type Error = InvalidHeaderValue;
    fn try_from(header: &AuthorizationHeader) -> Result<Self, Self::Error> {
        HeaderValue::try_from(header.to_string())
    }
}

impl FromStr for AuthorizationHeader {
    type Err = ParseAuthorizationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sign_type, args) = s
            .trim()
            .split_once(' ')
            .ok_or(ParseAuthorizationError::MissingSignType)?;

        let args = args
            .split(',')
            .map(|part| {
                part.split_once('=')
                    .map(|(k, v)| (k.trim(), v.trim()))
                    .ok_or_else(|| ParseAuthorizationError::MalformedParameter(part.into()))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let required = |name: &'static str| {
            args.get(name)
                .copied()
                .ok_or(ParseAuthorizationError::MissingParameter(name))
        };

        let params = AuthParams::new(
            required("app_id")?,
            args.get("app_cert_sn").map(|sn| sn.to_string()),
            required("nonce")?,
            required("timestamp")?,
        );
        Ok(AuthorizationHeader::new(
            sign_type,
            params,
            required("sign")?.into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "ALIPAY-SHA256withRSA app_id=2021000000000000,app_cert_sn=a1b2c3d4e5f6,\
        nonce=5f0c7e1a9b2d4c6e8f1a3b5c7d9e0f21,timestamp=20261019083000,sign=c2lnbmF0dXJl+/==";

    #[test]
    fn parses_and_formats_header() {
        let header: AuthorizationHeader = HEADER.parse().unwrap();
        assert_eq!(header.sign_type(), DEFAULT_SIGN_TYPE);
        assert_eq!(header.params().app_id(), "2021000000000000");
        assert_eq!(header.params().app_cert_sn(), Some("a1b2c3d4e5f6"));
        assert_eq!(header.nonce(), "5f0c7e1a9b2d4c6e8f1a3b5c7d9e0f21");
        assert_eq!(header.params().timestamp(), "20261019083000");
        assert_eq!(header.signature(), "c2lnbmF0dXJl+/==");
        assert_eq!(header.to_string(), HEADER);
    }

    #[test]
    fn cert_serial_is_optional() {
        let header: AuthorizationHeader =
            "ALIPAY-SHA256withRSA app_id=1,nonce=n,timestamp=t,sign=s".parse().unwrap();
        assert_eq!(header.params().app_cert_sn(), None);
        assert_eq!(
            header.to_string(),
            "ALIPAY-SHA256withRSA app_id=1,nonce=n,timestamp=t,sign=s"
        );
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!(
            "ALIPAY-SHA256withRSA".parse::<AuthorizationHeader>(),
            Err(ParseAuthorizationError::MissingSignType)
        );
        assert_eq!(
            "ALIPAY-SHA256withRSA app_id=1,nonce,timestamp=t,sign=s".parse::<AuthorizationHeader>(),
            Err(ParseAuthorizationError::MalformedParameter("nonce".into()))
        );
        assert_eq!(
            "ALIPAY-SHA256withRSA app_id=1,nonce=n,timestamp=t".parse::<AuthorizationHeader>(),
            Err(ParseAuthorizationError::MissingParameter("sign"))
        );
    }

    #[test]
    fn converts_to_header_value() {
        let header: AuthorizationHeader = HEADER.parse().unwrap();
        assert_eq!(HeaderValue::try_from(&header).unwrap(), HEADER);
    }

    #[test]
    fn default_security_headers() {
        let headers = SecurityHeaders::default();
        assert_eq!(headers.timestamp(), "alipay-timestamp");
        assert_eq!(headers.nonce(), "alipay-nonce");
        assert_eq!(headers.signature(), "alipay-signature");
    }
}
