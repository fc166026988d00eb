use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private, Public};
use openssl::rsa::Padding;
use openssl::sign::{Signer, Verifier};

use crate::keys::{self, KeyError};
use crate::signing::SigningError;
use crate::verifying::VerifyingError;
use crate::{HttpSignature, HttpSignatureSign, HttpSignatureVerify};

const RSA_SHA256: &str = "SHA256withRSA";

/// Implementation of the signing half of the `SHA256withRSA` scheme
/// (RSASSA-PKCS1-v1_5 over a SHA-256 digest).
#[derive(Clone)]
pub struct RsaSha256Sign(PKey<Private>);

impl fmt::Debug for RsaSha256Sign {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("RsaSha256Sign")
    }
}

/// Implementation of the verification half of the `SHA256withRSA` scheme.
#[derive(Clone)]
pub struct RsaSha256Verify(PKey<Public>);

impl fmt::Debug for RsaSha256Verify {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("RsaSha256Verify")
    }
}

impl RsaSha256Sign {
    /// Create a new instance of the signature scheme using the
    /// provided PKCS#8 DER private key.
    pub fn new_pkcs8(private_key: &[u8]) -> Result<Self, KeyError> {
        Ok(Self(keys::private_key_from_pkcs8_der(private_key)?))
    }
    /// Create a new instance of the signature scheme using the
    /// provided PKCS#1 DER private key.
    pub fn new_der(private_key: &[u8]) -> Result<Self, KeyError> {
        Ok(Self(keys::private_key_from_pkcs1_der(private_key)?))
    }
    /// Create a new instance of the signature scheme using the
    /// provided PEM private key (PKCS#1 or PKCS#8).
    pub fn new_pem(private_key: &[u8]) -> Result<Self, KeyError> {
        Ok(Self(keys::private_key_from_pem(private_key)?))
    }
    /// Create a new instance of the signature scheme from a PEM file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KeyError> {
        keys::load_private_key(path)
    }
}

impl RsaSha256Verify {
    /// Create a new instance of the signature scheme using the
    /// provided PKIX DER public key.
    pub fn new_der(public_key: &[u8]) -> Result<Self, KeyError> {
        Ok(Self(keys::public_key_from_der(public_key)?))
    }
    /// Create a new instance of the signature scheme using the
    /// provided PEM public key.
    pub fn new_pem(public_key: &[u8]) -> Result<Self, KeyError> {
        Ok(Self(keys::public_key_from_pem(public_key)?))
    }
    /// Create a new instance of the signature scheme from a PEM file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KeyError> {
        keys::load_public_key(path)
    }
}

impl HttpSignature for RsaSha256Sign {
    fn name(&self) -> &str {
        RSA_SHA256
    }
}

impl HttpSignature for RsaSha256Verify {
    fn name(&self) -> &str {
        RSA_SHA256
    }
}

impl HttpSignatureSign for RsaSha256Sign {
    fn http_sign(&self, bytes_to_sign: &[u8]) -> Result<String, SigningError> {
        let mut signer = Signer::new(MessageDigest::sha256(), &self.0)?;
        signer.set_rsa_padding(Padding::PKCS1)?;
        let tag = signer.sign_oneshot_to_vec(bytes_to_sign)?;
        Ok(STANDARD.encode(tag))
    }
}

impl HttpSignatureVerify for RsaSha256Verify {
    fn http_verify(&self, bytes_to_verify: &[u8], signature: &[u8]) -> Result<(), VerifyingError> {
        let tag = STANDARD.decode(signature)?;
        let verified = Verifier::new(MessageDigest::sha256(), &self.0)
            .and_then(|mut verifier| {
                verifier.set_rsa_padding(Padding::PKCS1)?;
                verifier.verify_oneshot(&tag, bytes_to_verify)
            })
            .unwrap_or_else(|e| {
                warn!("RSA verification error: {}", e);
                false
            });
        if verified {
            Ok(())
        } else {
            Err(VerifyingError::Mismatch)
        }
    }
}
