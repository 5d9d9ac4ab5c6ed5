//! Inbound payment notifications.
//!
//! The gateway reports payment state changes by POSTing a signed field set to the merchant.
//! A notification is only trusted when it comes from the gateway's published address range,
//! names our terminal, and carries a token that matches the one we recompute.

use serde::Serialize;

use crate::params::ParameterSet;

/// Address prefix the gateway sends notifications from.
pub const DEFAULT_NOTIFICATION_IP_PREFIX: &str = "91.194.226.";

/// A notification as delivered by whatever web framework received it.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    /// Peer address, as text (`91.194.226.10`, `::ffff:91.194.226.10`)
    pub source_ip: String,
    /// Decoded notification fields, including `Token`
    pub body: ParameterSet,
}

/// Which check rejected a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    SourceIp,
    TerminalKey,
    Token,
}

/// Outcome of verifying a notification.
///
/// Rejection is an expected outcome, so it is a value rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationVerdict {
    pub accepted: bool,
    /// Human-readable explanation, present exactly when rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<RejectReason>,
}

impl NotificationVerdict {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            reason: None,
            rejected_by: None,
        }
    }

    pub fn reject(rejected_by: RejectReason, reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
            rejected_by: Some(rejected_by),
        }
    }
}

/// Strip an IPv4-mapped IPv6 prefix (`::ffff:1.2.3.4` -> `1.2.3.4`).
///
/// Takes whatever follows the last `:`, so plain IPv4 addresses pass through unchanged.
pub fn normalize_ip(ip: &str) -> &str {
    ip.rsplit(':').next().unwrap_or(ip)
}
