use std::fmt;

use http::Method;

/// The authorization parameters which are both signed and sent in the
/// `Authorization` header.
///
/// Formats as `app_id=<id>[,app_cert_sn=<sn>],nonce=<nonce>,timestamp=<ts>`. The
/// certificate serial number is only written when one is configured, and its
/// presence changes the signed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthParams {
    app_id: String,
    app_cert_sn: Option<String>,
    nonce: String,
    timestamp: String,
}

impl AuthParams {
    /// Construct a new set of authorization parameters.
    pub fn new(
        app_id: impl Into<String>,
        app_cert_sn: Option<String>,
        nonce: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        AuthParams {
            app_id: app_id.into(),
            app_cert_sn: app_cert_sn.filter(|sn| !sn.is_empty()),
            nonce: nonce.into(),
            timestamp: timestamp.into(),
        }
    }
    /// Application ID
    pub fn app_id(&self) -> &str {
        &self.app_id
    }
    /// Application certificate serial number, if configured
    pub fn app_cert_sn(&self) -> Option<&str> {
        self.app_cert_sn.as_deref()
    }
    /// Per-request nonce
    pub fn nonce(&self) -> &str {
        &self.nonce
    }
    /// Request timestamp, `YYYYMMDDHHmmss`
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

impl fmt::Display for AuthParams {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "app_id={}", self.app_id)?;
        if let Some(sn) = &self.app_cert_sn {
            write!(f, ",app_cert_sn={}", sn)?;
        }
        write!(f, ",nonce={},timestamp={}", self.nonce, self.timestamp)
    }
}

/// Everything which goes into the signature of an outgoing request.
#[derive(Debug, Clone, Copy)]
pub struct SigningContext<'a> {
    /// Authorization parameters
    pub params: &'a AuthParams,
    /// Request method
    pub method: &'a Method,
    /// Path and query of the request, without scheme or host
    pub request_uri: &'a str,
    /// Serialized request body, empty for requests without one
    pub body: &'a [u8],
}

/// Everything which goes into the signature of an incoming response.
#[derive(Debug, Clone, Copy)]
pub struct VerificationContext<'a> {
    /// Value of the timestamp header
    pub timestamp: &'a [u8],
    /// Value of the nonce header
    pub nonce: &'a [u8],
    /// Raw response body
    pub body: &'a [u8],
}

/// Opaque struct storing a computed signature string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureString {
    content: Vec<u8>,
}

impl SignatureString {
    /// Obtain a view of this signature string as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    fn from_lines(lines: &[&[u8]]) -> Self {
        let mut content = Vec::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines {
            content.extend_from_slice(line);
            content.push(b'\n');
        }
        SignatureString { content }
    }
}

impl From<SignatureString> for Vec<u8> {
    fn from(other: SignatureString) -> Self {
        other.content
    }
}

/// Computes the canonical signature string for a signing or verification context.
///
/// Fields are joined verbatim, each followed by `\n`. Nothing is escaped: a
/// body containing newlines is signed as-is.
pub trait CanonicalizeExt {
    /// Compute the canonical representation of this context
    fn canonicalize(&self) -> SignatureString;
}

impl CanonicalizeExt for SigningContext<'_> {
    fn canonicalize(&self) -> SignatureString {
        let params = self.params.to_string();
        SignatureString::from_lines(&[
            params.as_bytes(),
            self.method.as_str().as_bytes(),
            self.request_uri.as_bytes(),
            self.body,
        ])
    }
}

impl CanonicalizeExt for VerificationContext<'_> {
    fn canonicalize(&self) -> SignatureString {
        SignatureString::from_lines(&[self.timestamp, self.nonce, self.body])
    }
}
