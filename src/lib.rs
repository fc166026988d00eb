#![deny(missing_docs)]
//! Request signing and response verification for the Alipay open platform v3 API.
//!
//! Every outgoing request carries an `Authorization` header holding an RSA
//! signature (`SHA256withRSA`) over the application ID, a fresh nonce, a
//! timestamp, the method, the request URI and the body. Every response carries
//! `alipay-timestamp`, `alipay-nonce` and `alipay-signature` headers, and is only
//! handed back to the caller once that signature has been checked against the
//! platform public key.
//!
//! ## Features
//!
//! Signing and verification work with any HTTP client through the
//! `ClientRequestLike`, `ResponseLike` and `Transport` traits. Client-specific
//! implementations are gated by correspondingly named features.
//!
//! ### Supported crates:
//!
//! | Crate / Feature name                              | Notes                                                         |
//! | ------------------------------------------------- | ------------------------------------------------------------- |
//! | [reqwest](https://crates.io/crates/reqwest)       | Signs blocking and non-blocking requests.<sup>1</sup> Provides `ReqwestTransport`. |
//!
//! 1. Due to limitations of the reqwest API, streaming bodies cannot be signed.
//!    Signing such a request fails with `SigningError::UnbufferedBody`.
//!
//! ### Supported signature algorithms:
//!
//! - `SHA256withRSA`, with PKCS#1 or PKCS#8 private keys and X.509
//!   `SubjectPublicKeyInfo` public keys, in PEM or DER form.
//!
//! ## Example usage
//!
//! ```rust,no_run
//! use alipay_sig::*;
//! use url::Url;
//!
//! let signing = SigningConfig::new(
//!     "2021000000000000",
//!     load_private_key("app_private.pem").unwrap(),
//! );
//! let verifying = VerifyingConfig::new(load_public_key("alipay_public.pem").unwrap());
//!
//! let executor = RequestExecutor::new(
//!     ReqwestTransport::new(),
//!     Url::parse(DEFAULT_GATEWAY_URL).unwrap(),
//!     signing,
//!     verifying,
//! );
//!
//! let response: serde_json::Value = executor
//!     .post_json(
//!         "/v3/alipay/open/app/qrcode/create",
//!         &serde_json::json!({ "url_param": "pages/index" }),
//!     )
//!     .unwrap();
//! ```

use std::time::Duration;

/// Format of the `timestamp` field of the `Authorization` header.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
/// Timeout applied to a request when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Base URL of the production gateway.
pub const DEFAULT_GATEWAY_URL: &str = "https://openapi.alipay.com";

#[macro_use]
mod macros;

mod algorithm;
pub use algorithm::*;

mod keys;
pub use keys::*;

mod header;
pub use header::*;

mod canonicalize;
pub use canonicalize::*;

mod signing;
pub use signing::*;

mod verifying;
pub use verifying::*;

mod transport;
pub use transport::*;

mod executor;
pub use executor::*;

mod settings;
pub use settings::*;

/// Module containing an in-process gateway which implements `Transport` for
/// testing.
pub mod mock_transport;

#[cfg(feature = "reqwest")]
mod reqwest_impls;
#[cfg(feature = "reqwest")]
pub use reqwest_impls::*;
