use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use openssl::error::ErrorStack;
use openssl::pkey::{Id, PKey, Private, Public};
use openssl::rsa::Rsa;
use rustls_pemfile::Item;
use thiserror::Error;

use crate::algorithm::{RsaSha256Sign, RsaSha256Verify};

/// The kind of PEM section found where a key was expected.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PemKind {
    /// `RSA PRIVATE KEY` (PKCS#1)
    Pkcs1PrivateKey,
    /// `PRIVATE KEY` (PKCS#8)
    Pkcs8PrivateKey,
    /// `PUBLIC KEY` (PKIX SubjectPublicKeyInfo)
    PublicKey,
    /// `CERTIFICATE`
    Certificate,
    /// Any other section, including ones the PEM reader does not recognise.
    Other,
}

impl PemKind {
    fn of(item: &Item) -> Self {
        match item {
            Item::Pkcs1Key(_) => PemKind::Pkcs1PrivateKey,
            Item::Pkcs8Key(_) => PemKind::Pkcs8PrivateKey,
            Item::SubjectPublicKeyInfo(_) => PemKind::PublicKey,
            Item::X509Certificate(_) => PemKind::Certificate,
            _ => PemKind::Other,
        }
    }
}

impl fmt::Display for PemKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            PemKind::Pkcs1PrivateKey => "RSA PRIVATE KEY",
            PemKind::Pkcs8PrivateKey => "PRIVATE KEY",
            PemKind::PublicKey => "PUBLIC KEY",
            PemKind::Certificate => "CERTIFICATE",
            PemKind::Other => "unsupported section",
        })
    }
}

/// The types of error which may occur whilst loading key material.
///
/// `Read` means the key could not be obtained at all; every other variant means
/// the bytes were obtained but do not hold a usable RSA key.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyError {
    /// The key file could not be read.
    #[error("Failed to read key from {}: {source}", .path.display())]
    Read {
        /// Path that was being read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },
    /// The data contains no PEM block at all.
    #[error("No PEM block found in key data")]
    MissingPem,
    /// A PEM block was found but its framing or base64 body is broken.
    #[error("Malformed PEM block: {0}")]
    MalformedPem(#[source] io::Error),
    /// The first PEM block is not the kind of key that was asked for.
    #[error("Expected a PEM {expected} block, found {found}")]
    UnexpectedPem {
        /// Label of the expected PEM section
        expected: &'static str,
        /// Kind of section actually found
        found: PemKind,
    },
    /// The DER content of the key could not be decoded.
    #[error("Malformed {expected} key: {source}")]
    Malformed {
        /// Description of the expected key structure
        expected: &'static str,
        /// Underlying OpenSSL error
        #[source]
        source: ErrorStack,
    },
    /// The key decoded correctly but is not an RSA key.
    #[error("Expected an RSA key, found algorithm {0:?}")]
    NotRsa(Id),
}

impl KeyError {
    /// True if the key bytes could not be obtained.
    pub fn is_read_error(&self) -> bool {
        matches!(self, KeyError::Read { .. })
    }
    /// True if the key bytes were obtained but could not be parsed into an RSA key.
    pub fn is_parse_error(&self) -> bool {
        !self.is_read_error()
    }
}

/// Loads a PEM encoded RSA private key (PKCS#1 or PKCS#8) from the given path.
pub fn load_private_key<P: AsRef<Path>>(path: P) -> Result<RsaSha256Sign, KeyError> {
    RsaSha256Sign::new_pem(&read_key_file(path.as_ref())?)
}

/// Loads a PEM encoded RSA public key (PKIX) from the given path.
pub fn load_public_key<P: AsRef<Path>>(path: P) -> Result<RsaSha256Verify, KeyError> {
    RsaSha256Verify::new_pem(&read_key_file(path.as_ref())?)
}

fn read_key_file(path: &Path) -> Result<Vec<u8>, KeyError> {
    fs::read(path).map_err(|source| KeyError::Read {
        path: path.to_owned(),
        source,
    })
}

const PEM_BEGIN: &[u8] = b"-----BEGIN ";

fn read_pem(bytes: &[u8], expected: &'static str) -> Result<Item, KeyError> {
    let mut reader = bytes;
    match rustls_pemfile::read_one(&mut reader) {
        Ok(Some(item)) => Ok(item),
        // Sections the reader does not know are skipped rather than returned
        Ok(None) if bytes.windows(PEM_BEGIN.len()).any(|w| w == PEM_BEGIN) => {
            Err(KeyError::UnexpectedPem {
                expected,
                found: PemKind::Other,
            })
        }
        Ok(None) => Err(KeyError::MissingPem),
        Err(e) => Err(KeyError::MalformedPem(e)),
    }
}

fn ensure_rsa<T>(key: PKey<T>) -> Result<PKey<T>, KeyError> {
    match key.id() {
        Id::RSA => Ok(key),
        other => Err(KeyError::NotRsa(other)),
    }
}

pub(crate) fn private_key_from_pem(bytes: &[u8]) -> Result<PKey<Private>, KeyError> {
    const EXPECTED: &str = "RSA PRIVATE KEY";
    match read_pem(bytes, EXPECTED)? {
        Item::Pkcs1Key(der) => private_key_from_pkcs1_der(der.secret_pkcs1_der()),
        Item::Pkcs8Key(der) => private_key_from_pkcs8_der(der.secret_pkcs8_der()),
        other => Err(KeyError::UnexpectedPem {
            expected: EXPECTED,
            found: PemKind::of(&other),
        }),
    }
}

pub(crate) fn private_key_from_pkcs1_der(der: &[u8]) -> Result<PKey<Private>, KeyError> {
    let malformed = |source| KeyError::Malformed {
        expected: "PKCS#1 private",
        source,
    };
    PKey::from_rsa(Rsa::private_key_from_der(der).map_err(malformed)?).map_err(malformed)
}

pub(crate) fn private_key_from_pkcs8_der(der: &[u8]) -> Result<PKey<Private>, KeyError> {
    let key = PKey::private_key_from_pkcs8(der).map_err(|source| KeyError::Malformed {
        expected: "PKCS#8 private",
        source,
    })?;
    ensure_rsa(key)
}

pub(crate) fn public_key_from_pem(bytes: &[u8]) -> Result<PKey<Public>, KeyError> {
    const EXPECTED: &str = "PUBLIC KEY";
    match read_pem(bytes, EXPECTED)? {
        Item::SubjectPublicKeyInfo(der) => public_key_from_der(der.as_ref()),
        other => Err(KeyError::UnexpectedPem {
            expected: EXPECTED,
            found: PemKind::of(&other),
        }),
    }
}

pub(crate) fn public_key_from_der(der: &[u8]) -> Result<PKey<Public>, KeyError> {
    let key = PKey::public_key_from_der(der).map_err(|source| KeyError::Malformed {
        expected: "PKIX public",
        source,
    })?;
    ensure_rsa(key)
}
