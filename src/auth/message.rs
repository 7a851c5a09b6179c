//! Challenge message canonicalization
//!
//! Signer and verifier must hash identical bytes. The wallet signs the text
//! rendered here after prefixing it with the EIP-191 personal-message header,
//! and the verifier rebuilds exactly the same buffer before hashing.

use sha3::{Digest, Keccak256};

use super::address::WalletAddress;

/// EIP-191 `personal_sign` header. Followed by the decimal byte length.
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Login template shown in the wallet's signing prompt.
///
/// Changing this text invalidates every outstanding challenge, since clients
/// sign the rendered bytes.
pub const LOGIN_TEMPLATE: &str =
    "连接Beast Royale游戏\n\n点击签名以验证您的身份。\n\nNonce: {nonce}";

/// A message template with `{address}` and `{nonce}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    template: String,
}

impl MessageTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Render the message for an address and nonce.
    pub fn render(&self, address: &WalletAddress, nonce: u32) -> String {
        self.template
            .replace("{address}", address.as_str())
            .replace("{nonce}", &nonce.to_string())
    }
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self::new(LOGIN_TEMPLATE)
    }
}

/// Build the exact byte buffer a wallet hashes for `personal_sign`.
pub fn personal_message_bytes(message: &[u8]) -> Vec<u8> {
    let header = format!("{}{}", PERSONAL_MESSAGE_PREFIX, message.len());
    let mut buf = Vec::with_capacity(header.len() + message.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(message);
    buf
}

/// Keccak-256 digest of a prefixed personal message.
pub fn personal_message_digest(message: &[u8]) -> [u8; 32] {
    keccak256(&personal_message_bytes(message))
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}
