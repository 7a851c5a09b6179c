//! Wallet authentication
//!
//! - Address parsing and EIP-55 rendering
//! - personal_sign message digests and secp256k1 signer recovery
//! - Single-use challenge nonces
//! - Session tokens and the per-action authorization gate

mod address;
mod crypto;
mod jwt;
mod message;
mod nonce;
mod policy;
mod service;

pub use address::{AddressError, WalletAddress};
pub use crypto::{
    address_from_key, recover_address, verify_personal_signature, RecoverableSignature,
    SignatureError, SIGNATURE_LEN,
};
pub use jwt::{generate_session_token, verify_session_token, JwtError, SessionClaims};
pub use message::{
    keccak256, personal_message_bytes, personal_message_digest, MessageTemplate, LOGIN_TEMPLATE,
};
pub use nonce::{NonceError, NonceManager, NONCE_RANGE};
pub use policy::{Action, AuthClass, UnknownAction};
pub use service::{
    AuthError, AuthService, Challenge, Grant, LoginOutcome, SessionIdentity, SessionSettings,
};
