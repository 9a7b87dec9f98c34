use thiserror::Error;

/// Failure kinds surfaced by [`super::RpcClient`].
///
/// Callers treat every variant the same way (status collapses to
/// disconnected, intents abort), but the kinds stay distinct for logging.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Connection refused, DNS failure, reset mid-response and similar.
    #[error("network error: {0}")]
    Network(String),
    /// No response within the client's request timeout.
    #[error("request timeout - Transmission server did not respond")]
    Timeout,
    /// Any non-2xx status other than a well-formed session handshake.
    #[error("unexpected HTTP status {status}")]
    Protocol { status: u16 },
    /// The server rejected the session credential again after a handshake.
    #[error("failed to obtain session token from Transmission server")]
    Session,
    /// The response body was not the JSON shape we expected.
    #[error("invalid response format: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RpcError::Timeout
        } else if e.is_decode() {
            RpcError::Decode(e.to_string())
        } else {
            RpcError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        RpcError::Decode(e.to_string())
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
