//! # merchant-gateway: signed client for the acquiring Merchant API
//!
//! The gateway authenticates every call in both directions with a token: a SHA-256 digest
//! of the request's field values, concatenated in key order together with the terminal
//! password. This crate builds and signs outbound calls, and verifies the notifications the
//! gateway posts back.
//!
//! ## Outbound calls
//!
//! [`GatewayClient`] exposes one method per remote operation (`Init`, `Confirm`, `Cancel`,
//! `GetState`, `Resend`) plus the generic [`GatewayClient::call_remote_method`]. Each call
//! copies the caller's parameters, injects `TerminalKey`, computes `Token` over exactly what
//! will be sent, and posts a form-encoded body through the configured [`Transport`]. The
//! decoded JSON response is returned as is; gateway-level error codes are the caller's to
//! interpret.
//!
//! ```no_run
//! use merchant_gateway::{GatewayClient, ParamValue, parameter_set};
//!
//! # async fn run() -> Result<(), merchant_gateway::TransportError> {
//! let client = GatewayClient::new("TinkoffBankTest", "TinkoffBankTest");
//! let response = client
//!     .init(&parameter_set([
//!         ("Amount", ParamValue::from(140000)),
//!         ("OrderId", ParamValue::from("21090")),
//!         ("Description", ParamValue::from("Gift card")),
//!     ]))
//!     .await?;
//! println!("pay at {}", response["PaymentURL"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Inbound notifications
//!
//! [`GatewayClient::verify_notification`] checks, in order, that a notification comes from
//! the gateway's address range, names our terminal, and carries a valid token. The result is
//! a [`NotificationVerdict`] rather than an error, so handlers can always answer with a
//! deterministic status. [`webhook::router`] wires this into an axum route.
//!
//! ## Configuration
//!
//! [`Config`] loads terminal credentials, the API root, request timeout and notification
//! address prefix from YAML with `MERCHANT_GATEWAY_` environment overrides.

pub mod client;
pub mod config;
pub mod credential;
pub mod errors;
pub mod notification;
pub mod params;
pub mod signing;
pub mod transport;
pub mod webhook;

pub use client::{DEFAULT_API_URL, GatewayClient, RemoteMethod};
pub use config::Config;
pub use credential::Credential;
pub use errors::{Error, TransportError};
pub use notification::{NotificationRequest, NotificationVerdict, RejectReason};
pub use params::{NestedData, ParamValue, ParameterSet, parameter_set};
pub use signing::compute_token;
pub use transport::{ReqwestTransport, RequestOptions, Transport};
