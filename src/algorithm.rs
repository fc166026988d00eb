use std::fmt::Debug;

use crate::signing::SigningError;
use crate::verifying::VerifyingError;

mod openssl;
pub use self::openssl::*;

/// Common half of a signature scheme. Implementations are expected to be
/// immutable once constructed, so they can be shared across threads.
pub trait HttpSignature: Debug + Send + Sync + 'static {
    /// Name of the underlying algorithm, eg. `SHA256withRSA`.
    fn name(&self) -> &str;
}

/// Signing half of a signature scheme.
pub trait HttpSignatureSign: HttpSignature {
    /// Returns the base64 encoded signature over `bytes_to_sign`.
    fn http_sign(&self, bytes_to_sign: &[u8]) -> Result<String, SigningError>;
}

/// Verification half of a signature scheme.
pub trait HttpSignatureVerify: HttpSignature {
    /// Checks a base64 encoded `signature` over `bytes_to_verify`.
    ///
    /// Only malformed encoding is reported separately; every other failure,
    /// whatever its cause, is reported as `VerifyingError::Mismatch`.
    fn http_verify(&self, bytes_to_verify: &[u8], signature: &[u8]) -> Result<(), VerifyingError>;
}
