use cipherbatch_engine::OperationError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoApiError {
    #[error("Crypto service unreachable: {0}")]
    Unreachable(String),

    #[error("Crypto service request timed out")]
    Timeout,

    #[error("Crypto service returned error (status {status}): {message}")]
    Service { status: StatusCode, message: String },

    #[error("Invalid response from crypto service: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CryptoApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CryptoApiError::Timeout
        } else if err.is_decode() {
            CryptoApiError::InvalidResponse(err.to_string())
        } else {
            CryptoApiError::Unreachable(err.to_string())
        }
    }
}

impl From<CryptoApiError> for OperationError {
    fn from(err: CryptoApiError) -> Self {
        match err {
            CryptoApiError::Unreachable(message) => OperationError::Unreachable(message),
            CryptoApiError::Timeout => OperationError::Timeout,
            CryptoApiError::Service { status, message } => OperationError::Remote {
                status: status.as_u16(),
                message,
            },
            CryptoApiError::InvalidResponse(message) => OperationError::InvalidResponse(message),
        }
    }
}
