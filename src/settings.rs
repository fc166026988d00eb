use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::keys::{load_private_key, load_public_key, KeyError};
use crate::signing::SigningConfig;
use crate::verifying::VerifyingConfig;
use crate::{DEFAULT_GATEWAY_URL, DEFAULT_TIMEOUT};

fn default_gateway_url() -> Url {
    Url::parse(DEFAULT_GATEWAY_URL).expect("default gateway URL to be valid")
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// Deserializable client settings, eg. from a TOML or JSON file.
///
/// Key files are only read when a configuration is built from these settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSettings {
    /// Application ID issued by the platform
    pub app_id: String,
    /// Serial number of the application public key certificate, if one is used
    #[serde(default)]
    pub app_cert_sn: Option<String>,
    /// PEM file holding the application private key
    pub private_key_path: PathBuf,
    /// PEM file holding the platform public key
    pub public_key_path: PathBuf,
    /// Base URL of the gateway
    #[serde(default = "default_gateway_url")]
    pub gateway_url: Url,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Overrides the sign type label
    #[serde(default)]
    pub sign_type: Option<String>,
}

impl ClientSettings {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Loads the private key and builds the signing configuration.
    pub fn signing_config(&self) -> Result<SigningConfig, KeyError> {
        let key = load_private_key(&self.private_key_path)?;
        let mut config = SigningConfig::new(&self.app_id, key);
        config.set_app_cert_sn(self.app_cert_sn.clone());
        if let Some(sign_type) = &self.sign_type {
            config.set_sign_type(sign_type);
        }
        Ok(config)
    }

    /// Loads the public key and builds the verifying configuration.
    pub fn verifying_config(&self) -> Result<VerifyingConfig, KeyError> {
        Ok(VerifyingConfig::new(load_public_key(&self.public_key_path)?))
    }

    /// Loads both keys and builds an executor using a blocking reqwest transport.
    #[cfg(feature = "reqwest")]
    pub fn build_executor(
        &self,
    ) -> Result<crate::RequestExecutor<crate::ReqwestTransport>, crate::Error> {
        let transport = crate::ReqwestTransport::new().with_timeout(self.timeout());
        Ok(crate::RequestExecutor::new(
            transport,
            self.gateway_url.clone(),
            self.signing_config()?,
            self.verifying_config()?,
        ))
    }
}
