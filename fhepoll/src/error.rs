use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("fhepoll: session not initialized")]
    NotInitialized,

    #[error("fhepoll: wallet unavailable: {0}")]
    WalletUnavailable(String),

    #[error("fhepoll: wallet rejected the request: {0}")]
    WalletRejected(String),

    #[error("fhepoll: encryption failed: {0}")]
    EncryptionFailure(String),

    #[error("fhepoll: transaction failed: {0}")]
    TransactionFailure(String),

    #[error("fhepoll: expected {0} event not found in confirmed logs")]
    EventNotFound(&'static str),

    #[error("fhepoll: network error: {0}")]
    NetworkError(String),

    #[error("fhepoll: invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Classify a provider or middleware error message.
    ///
    /// JSON-RPC surfaces causes as strings, not structured values: a declined
    /// signing request carries code 4001 ("user rejected"), transport
    /// failures mention the connection, everything else is treated as a
    /// transaction-level failure.
    pub fn from_provider(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("user rejected") || lower.contains("user denied") || lower.contains("4001")
        {
            Error::WalletRejected(message)
        } else if lower.contains("connect") || lower.contains("timed out") || lower.contains("network")
        {
            Error::NetworkError(message)
        } else {
            Error::TransactionFailure(message)
        }
    }
}
