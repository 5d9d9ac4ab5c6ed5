use std::fmt;

/// Terminal identifier and shared secret issued by the gateway.
///
/// Immutable once built. The secret is only ever used as hashing input and is redacted from
/// `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    terminal_key: String,
    secret_key: String,
}

impl Credential {
    pub fn new(terminal_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            terminal_key: terminal_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn terminal_key(&self) -> &str {
        &self.terminal_key
    }

    pub(crate) fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("terminal_key", &self.terminal_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
