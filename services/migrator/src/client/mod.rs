mod error;
mod http;
mod types;

pub use error::CryptoApiError;
pub use http::CryptoApiClient;
pub use types::{CryptoRequest, CryptoResponse, Endpoint};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8200";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POOL_IDLE_PER_HOST: usize = 100;
