//! Merchant API client.
//!
//! | Operation | Endpoint | Description |
//! |-----------|----------|-------------|
//! | [`init`](GatewayClient::init) | `POST /rest/Init` | Create a payment, returns the payment form URL |
//! | [`confirm`](GatewayClient::confirm) | `POST /rest/Confirm` | Capture a two-stage payment |
//! | [`cancel`](GatewayClient::cancel) | `POST /rest/Cancel` | Cancel or refund a payment |
//! | [`get_state`](GatewayClient::get_state) | `POST /rest/GetState` | Current payment status |
//! | [`resend`](GatewayClient::resend) | `POST /rest/Resend` | Redeliver undelivered notifications |
//!
//! Every request carries `TerminalKey` and a `Token` computed by [`compute_token`]. Responses
//! are returned as decoded JSON without interpretation: a gateway-level failure
//! (`"Success": false, "ErrorCode": "..."`) is an `Ok` value for the caller to inspect.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::Config;
use crate::credential::Credential;
use crate::errors::TransportError;
use crate::notification::{DEFAULT_NOTIFICATION_IP_PREFIX, NotificationRequest, NotificationVerdict, RejectReason, normalize_ip};
use crate::params::{ParamValue, ParameterSet, TERMINAL_KEY, TOKEN, flatten_data, to_form};
use crate::signing::{compute_token, tokens_match};
use crate::transport::{ReqwestTransport, RequestOptions, Transport};

/// Production API root.
pub const DEFAULT_API_URL: &str = "https://securepay.tinkoff.ru/rest";

/// Remote methods exposed by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteMethod {
    Init,
    Confirm,
    Cancel,
    GetState,
    Resend,
}

impl RemoteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteMethod::Init => "Init",
            RemoteMethod::Confirm => "Confirm",
            RemoteMethod::Cancel => "Cancel",
            RemoteMethod::GetState => "GetState",
            RemoteMethod::Resend => "Resend",
        }
    }
}

impl fmt::Display for RemoteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed client for one merchant terminal.
///
/// Holds no mutable state: clones share the transport, and concurrent calls each work on
/// their own copy of the parameters.
#[derive(Clone)]
pub struct GatewayClient {
    credential: Credential,
    api_url: String,
    options: RequestOptions,
    notification_ip_prefix: String,
    transport: Arc<dyn Transport>,
}

impl GatewayClient {
    /// Create a client for the production API with default options.
    ///
    /// Performs no validation and no network access.
    pub fn new(terminal_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            credential: Credential::new(terminal_key, secret_key),
            api_url: DEFAULT_API_URL.to_string(),
            options: RequestOptions::default(),
            notification_ip_prefix: DEFAULT_NOTIFICATION_IP_PREFIX.to_string(),
            transport: Arc::new(ReqwestTransport::new()),
        }
    }

    /// Create a client from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.terminal_key.clone(), config.secret_key.clone())
            .with_api_url(config.api_url.clone())
            .with_timeout(config.request_timeout)
            .with_accept_compressed(config.accept_compressed)
            .with_notification_ip_prefix(config.notification_ip_prefix.clone())
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_api_url(mut self, api_url: Url) -> Self {
        self.api_url = api_url.as_str().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn with_accept_compressed(mut self, accept_compressed: bool) -> Self {
        self.options.accept_compressed = accept_compressed;
        self
    }

    pub fn with_notification_ip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.notification_ip_prefix = prefix.into();
        self
    }

    pub fn terminal_key(&self) -> &str {
        self.credential.terminal_key()
    }

    /// URL of a remote method under the configured API root.
    pub fn method_url(&self, method_name: &str) -> String {
        format!("{}/{}", self.api_url, method_name)
    }

    /// Copy `params`, inject our `TerminalKey` and sign the result.
    ///
    /// Caller-supplied `TerminalKey` and `Token` values are overwritten. The token covers
    /// exactly the fields that will be transmitted, minus `Token` itself.
    pub fn sign_params(&self, params: &ParameterSet) -> ParameterSet {
        let mut signed = params.clone();
        signed.remove(TOKEN);
        signed.insert(TERMINAL_KEY.to_string(), ParamValue::from(self.credential.terminal_key()));

        let token = compute_token(&signed, self.credential.secret_key());
        signed.insert(TOKEN.to_string(), ParamValue::String(token));
        signed
    }

    /// Sign `params` and POST them to `{api_url}/{method_name}`.
    ///
    /// Resolves to the decoded response body verbatim. Transport failures are returned as
    /// is and never retried.
    pub async fn call_remote_method(&self, method_name: &str, params: &ParameterSet) -> Result<serde_json::Value, TransportError> {
        let url = self.method_url(method_name);
        let form = to_form(&self.sign_params(params));

        tracing::debug!(method = %method_name, url = %url, fields = form.len(), "Calling gateway method");

        let response = self.transport.post_form(&url, &form, &self.options).await;
        if let Err(e) = &response {
            tracing::warn!(method = %method_name, error = %e, "Gateway call failed");
        }
        response
    }

    /// Create a payment. A nested `DATA` field is flattened to `k=v|k=v` first.
    pub async fn init(&self, params: &ParameterSet) -> Result<serde_json::Value, TransportError> {
        let mut params = params.clone();
        flatten_data(&mut params);
        self.call_remote_method(RemoteMethod::Init.as_str(), &params).await
    }

    /// Capture a previously authorized two-stage payment.
    pub async fn confirm(&self, params: &ParameterSet) -> Result<serde_json::Value, TransportError> {
        self.call_remote_method(RemoteMethod::Confirm.as_str(), params).await
    }

    /// Cancel a payment, or refund it once confirmed.
    pub async fn cancel(&self, params: &ParameterSet) -> Result<serde_json::Value, TransportError> {
        self.call_remote_method(RemoteMethod::Cancel.as_str(), params).await
    }

    pub async fn get_state(&self, params: &ParameterSet) -> Result<serde_json::Value, TransportError> {
        self.call_remote_method(RemoteMethod::GetState.as_str(), params).await
    }

    /// Ask the gateway to redeliver notifications it failed to deliver.
    pub async fn resend(&self, params: &ParameterSet) -> Result<serde_json::Value, TransportError> {
        self.call_remote_method(RemoteMethod::Resend.as_str(), params).await
    }

    /// Check that a notification comes from the gateway, targets our terminal and is signed
    /// with our secret.
    ///
    /// Checks run in that order and stop at the first failure. The received token is never
    /// echoed back in the rejection reason.
    pub fn verify_notification(&self, source_ip: &str, body: &ParameterSet) -> NotificationVerdict {
        let ip = normalize_ip(source_ip);
        if !ip.starts_with(&self.notification_ip_prefix) {
            return NotificationVerdict::reject(
                RejectReason::SourceIp,
                format!("Notification from unexpected address {}", source_ip),
            );
        }

        match body.get(TERMINAL_KEY) {
            Some(ParamValue::String(key)) if key == self.credential.terminal_key() => {}
            Some(other) => {
                return NotificationVerdict::reject(RejectReason::TerminalKey, format!("Notification for unknown terminal {}", other));
            }
            None => {
                return NotificationVerdict::reject(RejectReason::TerminalKey, "Notification without TerminalKey");
            }
        }

        let mut token_params = body.clone();
        let received = token_params.remove(TOKEN);
        let expected = compute_token(&token_params, self.credential.secret_key());

        match received {
            Some(ParamValue::String(received)) if tokens_match(&expected, &received) => NotificationVerdict::accept(),
            _ => NotificationVerdict::reject(RejectReason::Token, "Notification token does not match"),
        }
    }

    /// [`verify_notification`](Self::verify_notification) over a framework-neutral request.
    pub fn verify_request(&self, request: &NotificationRequest) -> NotificationVerdict {
        self.verify_notification(&request.source_ip, &request.body)
    }
}

impl fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayClient")
            .field("credential", &self.credential)
            .field("api_url", &self.api_url)
            .field("options", &self.options)
            .field("notification_ip_prefix", &self.notification_ip_prefix)
            .finish_non_exhaustive()
    }
}
