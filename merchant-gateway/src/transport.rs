//! HTTP transport abstraction.
//!
//! The client never opens sockets itself: every remote call goes through a [`Transport`],
//! which posts a form-encoded body and hands back the decoded JSON response. The default
//! [`ReqwestTransport`] is used unless another implementation is injected with
//! [`GatewayClient::with_transport`](crate::GatewayClient::with_transport).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING};

use crate::errors::TransportError;

/// Per-request transport settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Upper bound on the whole request, enforced by the transport
    pub timeout: Duration,
    /// Advertise gzip support and transparently decompress the response
    pub accept_compressed: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            accept_compressed: true,
        }
    }
}

/// Posts a form to a URL and returns the JSON response body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_form(&self, url: &str, form: &[(String, String)], options: &RequestOptions) -> Result<serde_json::Value, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        // reqwest is built without a bundled crypto provider; install aws-lc-rs unless the
        // process already did
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Use an already configured client (proxies, custom roots, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_form(&self, url: &str, form: &[(String, String)], options: &RequestOptions) -> Result<serde_json::Value, TransportError> {
        let mut request = self
            .client
            .post(url)
            .timeout(options.timeout)
            .header(ACCEPT, "application/json")
            .form(form);

        if !options.accept_compressed {
            request = request.header(ACCEPT_ENCODING, "identity");
        }

        let response = request.send().await.map_err(|e| http_error(url, e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| http_error(url, e))?;

        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(json) => {
                if !status.is_success() {
                    tracing::warn!(url = %url, status = %status, "Gateway returned a JSON body with a non-success status");
                }
                Ok(json)
            }
            Err(_) if !status.is_success() => {
                tracing::warn!(url = %url, status = %status, "Gateway request failed: {}", text);
                Err(TransportError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                })
            }
            Err(source) => Err(TransportError::Decode {
                url: url.to_string(),
                source,
            }),
        }
    }
}

fn http_error(url: &str, source: reqwest::Error) -> TransportError {
    if source.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
            source,
        }
    } else {
        TransportError::Http {
            url: url.to_string(),
            source,
        }
    }
}
