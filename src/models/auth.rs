//! Authentication DTOs

use serde::{Deserialize, Serialize};

/// Challenge request. Accepts both REST and action field names.
#[derive(Debug, Deserialize)]
pub struct ChallengeRequest {
    #[serde(alias = "Address", alias = "wallet_address")]
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub address: String,
    pub nonce: u32,
    /// Exact text to pass to `personal_sign`
    pub message: String,
}

/// Nonce as wallets send it, either a number or a decimal string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NonceParam {
    Number(serde_json::Number),
    Text(String),
}

impl NonceParam {
    pub fn as_text(&self) -> String {
        match self {
            NonceParam::Number(n) => n.to_string(),
            NonceParam::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(alias = "Address", alias = "wallet_address")]
    pub address: String,

    #[serde(alias = "Signature")]
    pub signature: String,

    #[serde(alias = "Nonce")]
    pub nonce: NonceParam,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub address: String,
    pub token: String,
    pub profile_exists: bool,
}

/// `ConnectWallet` action data
#[derive(Debug, Serialize)]
pub struct NonceResponse {
    pub nonce: u32,
}

/// `VerifySignature` action data
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub profile_exists: bool,
}
