//! Request and notification token computation.
//!
//! The gateway authenticates both directions with the same scheme:
//! - the shared secret is added to the field set under [`PASSWORD`]
//! - fields are sorted by key (byte order, case-sensitive)
//! - the values alone are concatenated with no separator
//! - the result is hashed with SHA-256 and hex-encoded in lowercase
//!
//! Any [`TOKEN`] field already in the set is left out of the computation.
//!
//! For `{Amount: 100, OrderId: "21090"}` on terminal `TestTerminal` with secret `secret`
//! the hashed string is `"100" + "21090" + "secret" + "TestTerminal"`.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::params::{PASSWORD, ParameterSet, TOKEN};

/// Compute the token for a field set and secret.
///
/// Total over any flat field set: an empty set yields the hash of the secret alone.
pub fn compute_token(params: &ParameterSet, secret: &str) -> String {
    let mut token_params: BTreeMap<&str, String> = params
        .iter()
        .filter(|(key, _)| key.as_str() != TOKEN)
        .map(|(key, value)| (key.as_str(), value.to_string()))
        .collect();
    token_params.insert(PASSWORD, secret.to_string());

    let concatenated: String = token_params.into_values().collect();

    let mut hasher = Sha256::new();
    hasher.update(concatenated.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compare a received token with the expected one without short-circuiting on content.
pub fn tokens_match(expected: &str, received: &str) -> bool {
    constant_time_eq(expected.as_bytes(), received.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
