//! Client configuration.
//!
//! Configuration is loaded from a YAML file with environment variable overrides:
//!
//! 1. **YAML config file** - base values (e.g. `merchant-gateway.yaml`)
//! 2. **Environment variables** - `MERCHANT_GATEWAY_` prefixed variables override YAML values
//!
//! ```yaml
//! terminal_key: TinkoffBankTest
//! secret_key: TinkoffBankTest
//! api_url: https://securepay.tinkoff.ru/rest
//! request_timeout: 5s
//! notification_ip_prefix: "91.194.226."
//! ```
//!
//! ```bash
//! MERCHANT_GATEWAY_SECRET_KEY=...
//! MERCHANT_GATEWAY_REQUEST_TIMEOUT=10s
//! ```
//!
//! Values are only checked for presence; the gateway is the judge of whether a terminal key
//! or secret is actually valid.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::DEFAULT_API_URL;
use crate::errors::Error;
use crate::notification::DEFAULT_NOTIFICATION_IP_PREFIX;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "MERCHANT_GATEWAY_";

#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Terminal identifier issued by the gateway
    pub terminal_key: String,
    /// Terminal password, used only as hashing input
    pub secret_key: String,
    /// API root; method names are appended as path segments
    pub api_url: Url,
    /// Upper bound on every outbound request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Accept gzip-compressed responses
    pub accept_compressed: bool,
    /// Notifications are only accepted from addresses starting with this prefix
    pub notification_ip_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            terminal_key: String::new(),
            secret_key: String::new(),
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            request_timeout: Duration::from_secs(5),
            accept_compressed: true,
            notification_ip_prefix: DEFAULT_NOTIFICATION_IP_PREFIX.to_string(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("terminal_key", &self.terminal_key)
            .field("secret_key", &"<redacted>")
            .field("api_url", &self.api_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("accept_compressed", &self.accept_compressed)
            .field("notification_ip_prefix", &self.notification_ip_prefix)
            .finish()
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(path).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Check that every required value is present.
    pub fn validate(&self) -> Result<(), Error> {
        if self.terminal_key.is_empty() {
            return Err(Error::Config {
                message: format!("terminal_key is not set. Add it to the config file or set {}TERMINAL_KEY.", ENV_PREFIX),
            });
        }

        if self.secret_key.is_empty() {
            return Err(Error::Config {
                message: format!("secret_key is not set. Add it to the config file or set {}SECRET_KEY.", ENV_PREFIX),
            });
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config {
                message: "request_timeout must be greater than zero".to_string(),
            });
        }

        if self.notification_ip_prefix.is_empty() {
            return Err(Error::Config {
                message: "notification_ip_prefix must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
