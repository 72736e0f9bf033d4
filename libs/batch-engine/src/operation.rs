use std::fmt;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Field-exclusion settings forwarded to the remote service as-is.
///
/// The engine never inspects the contents; matching happens server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionOptions(pub Value);

impl ExclusionOptions {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Which remote operation an item processor drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Encrypt => "encrypt",
            Direction::Decrypt => "decrypt",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "encrypt" => Ok(Direction::Encrypt),
            "decrypt" => Ok(Direction::Decrypt),
            other => Err(format!("unsupported migration direction: {other}")),
        }
    }
}

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("crypto service unreachable: {0}")]
    Unreachable(String),

    #[error("crypto service request timed out")]
    Timeout,

    #[error("crypto service returned error (status {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("invalid response from crypto service: {0}")]
    InvalidResponse(String),
}

impl OperationError {
    /// Network failures, timeouts, 5xx and 429 responses.
    pub fn is_transient(&self) -> bool {
        match self {
            OperationError::Unreachable(_) | OperationError::Timeout => true,
            OperationError::Remote { status, .. } => *status >= 500 || *status == 429,
            OperationError::InvalidResponse(_) => false,
        }
    }
}

/// The remote encrypt/decrypt capability the engine drives.
///
/// Implementations must be safe to call concurrently; a batch issues up to
/// `batch_size` calls at once.
pub trait CryptoService: Send + Sync {
    fn encrypt<'a>(
        &'a self,
        item: &'a Value,
        exclusions: Option<&'a ExclusionOptions>,
    ) -> BoxFuture<'a, Result<Value, OperationError>>;

    fn decrypt<'a>(
        &'a self,
        item: &'a Value,
        exclusions: Option<&'a ExclusionOptions>,
    ) -> BoxFuture<'a, Result<Value, OperationError>>;

    fn call<'a>(
        &'a self,
        direction: Direction,
        item: &'a Value,
        exclusions: Option<&'a ExclusionOptions>,
    ) -> BoxFuture<'a, Result<Value, OperationError>> {
        match direction {
            Direction::Encrypt => self.encrypt(item, exclusions),
            Direction::Decrypt => self.decrypt(item, exclusions),
        }
    }
}

impl<T: CryptoService + ?Sized> CryptoService for std::sync::Arc<T> {
    fn encrypt<'a>(
        &'a self,
        item: &'a Value,
        exclusions: Option<&'a ExclusionOptions>,
    ) -> BoxFuture<'a, Result<Value, OperationError>> {
        (**self).encrypt(item, exclusions)
    }

    fn decrypt<'a>(
        &'a self,
        item: &'a Value,
        exclusions: Option<&'a ExclusionOptions>,
    ) -> BoxFuture<'a, Result<Value, OperationError>> {
        (**self).decrypt(item, exclusions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_str() {
        assert_eq!("encrypt".parse::<Direction>().unwrap(), Direction::Encrypt);
        assert_eq!(" Decrypt ".parse::<Direction>().unwrap(), Direction::Decrypt);
        assert!("rotate".parse::<Direction>().is_err());
    }

    #[test]
    fn test_transient_classification() {
        assert!(OperationError::Timeout.is_transient());
        assert!(OperationError::Unreachable("refused".into()).is_transient());
        assert!(OperationError::Remote {
            status: 503,
            message: "busy".into()
        }
        .is_transient());
        assert!(OperationError::Remote {
            status: 429,
            message: "slow down".into()
        }
        .is_transient());
        assert!(!OperationError::Remote {
            status: 400,
            message: "bad payload".into()
        }
        .is_transient());
        assert!(!OperationError::InvalidResponse("not json".into()).is_transient());
    }
}
