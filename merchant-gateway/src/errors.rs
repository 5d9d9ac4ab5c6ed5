use thiserror::Error as ThisError;

/// Failure while talking to the gateway over HTTP.
///
/// Business-level failures reported by the gateway (`Success: false`, `ErrorCode`) are not
/// transport errors; they come back inside the decoded response body.
#[derive(ThisError, Debug)]
pub enum TransportError {
    /// The request did not complete within the configured timeout
    #[error("Request to {url} timed out")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Connection, TLS or protocol failure
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status with a body that is not a gateway JSON response
    #[error("Gateway answered {url} with HTTP {status}")]
    Status { url: String, status: u16 },

    /// Successful HTTP status but the body is not valid JSON
    #[error("Response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Failure raised by a custom transport
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(ThisError, Debug)]
pub enum Error {
    /// Missing or unusable configuration value
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}
