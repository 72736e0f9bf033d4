use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct CryptoRequest<'a> {
    pub data: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusions: Option<&'a Value>,
    /// Ask the service to keep undecryptable fields instead of failing the call.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub graceful: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoResponse {
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(alias = "message")]
    pub error: String,
}

/// Remote endpoint for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Encrypt,
    Decrypt,
    DeepEncrypt,
    DeepDecrypt,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Encrypt => "/v1/encrypt",
            Endpoint::Decrypt => "/v1/decrypt",
            Endpoint::DeepEncrypt => "/v1/deep-encrypt",
            Endpoint::DeepDecrypt => "/v1/deep-decrypt",
        }
    }

    pub fn is_decrypt(&self) -> bool {
        matches!(self, Endpoint::Decrypt | Endpoint::DeepDecrypt)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_omits_unset_fields() {
        let data = json!({"ssn": "123"});
        let request = CryptoRequest {
            data: &data,
            exclusions: None,
            graceful: false,
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"data": {"ssn": "123"}}));

        let exclusions = json!({"fields": ["id"]});
        let request = CryptoRequest {
            data: &data,
            exclusions: Some(&exclusions),
            graceful: true,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"data": {"ssn": "123"}, "exclusions": {"fields": ["id"]}, "graceful": true})
        );
    }
}
