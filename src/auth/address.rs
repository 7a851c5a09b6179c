//! Ethereum-style wallet addresses
//!
//! Addresses arrive from wallets in whatever case the wallet renders them.
//! They are validated and normalized once at the boundary so that every store
//! key and every comparison downstream sees the same lower-case form.

use std::fmt;

use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Number of hex characters in an address body (20 bytes).
const ADDRESS_HEX_LEN: usize = 40;

/// Address parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address must be 40 hex characters with an optional 0x prefix, got {0} characters")]
    InvalidLength(usize),

    #[error("Address contains non-hex characters")]
    InvalidCharacters,
}

/// A validated wallet address, stored lower-cased with a `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Parse and normalize a client-supplied address.
    ///
    /// Accepts an optional `0x`/`0X` prefix followed by exactly 40 hex
    /// characters in any case.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let body = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);

        if body.len() != ADDRESS_HEX_LEN {
            return Err(AddressError::InvalidLength(body.len()));
        }

        if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidCharacters);
        }

        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    /// Build an address from the last 20 bytes of a public key hash.
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// Lower-case `0x`-prefixed form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mixed-case EIP-55 checksum rendering.
    pub fn to_checksum(&self) -> String {
        let body = &self.0[2..];
        let hash = Keccak256::digest(body.as_bytes());

        let mut out = String::with_capacity(ADDRESS_HEX_LEN + 2);
        out.push_str("0x");
        for (i, c) in body.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Case-insensitive comparison against another rendering.
    pub fn matches(&self, other: &str) -> bool {
        let other = other
            .strip_prefix("0x")
            .or_else(|| other.strip_prefix("0X"))
            .unwrap_or(other);
        self.0[2..].eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WalletAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
