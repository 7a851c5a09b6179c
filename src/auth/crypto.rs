//! Ethereum personal-message signature verification
//!
//! Recovers the signer of an EIP-191 `personal_sign` signature over secp256k1
//! and compares the derived address to the one the caller claims.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use thiserror::Error;

use super::address::WalletAddress;
use super::message::{keccak256, personal_message_digest};

/// Length of an `r || s || v` signature.
pub const SIGNATURE_LEN: usize = 65;

/// Errors that can occur during signature verification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signature: {0}")]
    Malformed(String),

    #[error("Invalid recovery id: {0}, expected 27 or 28")]
    InvalidRecoveryId(u8),

    #[error("Public key recovery failed: {0}")]
    RecoveryFailed(String),
}

/// A decoded 65-byte signature with its recovery byte already normalized.
#[derive(Debug, Clone)]
pub struct RecoverableSignature {
    rs: [u8; 64],
    recovery_id: u8,
}

impl RecoverableSignature {
    /// Decode a hex signature (optional `0x`) and check its recovery byte.
    ///
    /// No curve arithmetic happens here; shape errors are reported before any
    /// key recovery is attempted.
    pub fn from_hex(signature: &str) -> Result<Self, SignatureError> {
        let body = signature
            .strip_prefix("0x")
            .or_else(|| signature.strip_prefix("0X"))
            .unwrap_or(signature);

        let bytes = hex::decode(body).map_err(|e| SignatureError::Malformed(e.to_string()))?;

        if bytes.len() != SIGNATURE_LEN {
            return Err(SignatureError::Malformed(format!(
                "expected {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            )));
        }

        let v = bytes[64];
        if v != 27 && v != 28 {
            return Err(SignatureError::InvalidRecoveryId(v));
        }

        let mut rs = [0u8; 64];
        rs.copy_from_slice(&bytes[..64]);

        Ok(Self {
            rs,
            recovery_id: v - 27,
        })
    }

    /// Recover the signing key from a 32-byte message digest.
    pub fn recover_key(&self, digest: &[u8; 32]) -> Result<VerifyingKey, SignatureError> {
        let mut signature = Signature::from_slice(&self.rs)
            .map_err(|e| SignatureError::RecoveryFailed(e.to_string()))?;
        let mut recovery_id = RecoveryId::from_byte(self.recovery_id)
            .ok_or_else(|| SignatureError::RecoveryFailed("recovery id out of range".into()))?;

        // k256 only accepts low-s signatures; negating s flips the parity of R.y
        if let Some(normalized) = signature.normalize_s() {
            signature = normalized;
            recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
        }

        VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
            .map_err(|e| SignatureError::RecoveryFailed(e.to_string()))
    }
}

/// Derive the address owning a public key: last 20 bytes of Keccak-256(X || Y).
pub fn address_from_key(key: &VerifyingKey) -> WalletAddress {
    let point = key.to_encoded_point(false);
    // Uncompressed SEC1 encoding is 0x04 || X || Y
    let hash = keccak256(&point.as_bytes()[1..]);

    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    WalletAddress::from_bytes(&bytes)
}

/// Recover the address that produced `signature` over `message`.
pub fn recover_address(message: &str, signature: &str) -> Result<WalletAddress, SignatureError> {
    let signature = RecoverableSignature::from_hex(signature)?;
    let digest = personal_message_digest(message.as_bytes());
    let key = signature.recover_key(&digest)?;
    Ok(address_from_key(&key))
}

/// Verify that `claimed` signed `message`.
///
/// # Returns
/// * `Ok(true)` if the recovered signer is `claimed`
/// * `Ok(false)` if a different key produced the signature
/// * `Err(SignatureError)` if the signature could not be decoded or recovered
pub fn verify_personal_signature(
    claimed: &WalletAddress,
    message: &str,
    signature: &str,
) -> Result<bool, SignatureError> {
    let recovered = recover_address(message, signature)?;

    tracing::debug!(
        claimed = %claimed,
        recovered = %recovered.to_checksum(),
        "Recovered signer address"
    );

    Ok(recovered.matches(claimed.as_str()))
}


#[cfg(test)]
mod tests {
    use k256::ecdsa::SigningKey;

    use super::test_support::*;
    use super::*;

    #[test]
    fn test_address_from_known_key() {
        // Private key 0x...01 owns this well-known address
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let key = SigningKey::from_slice(&secret).unwrap();

        assert_eq!(
            address_from_key(key.verifying_key()).to_checksum(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn test_verify_valid_signature() {
        let key = key_from_byte(7);
        let address = address_of(&key);
        let signature = sign_personal(&key, "Nonce: 482913");

        assert_eq!(
            verify_personal_signature(&address, "Nonce: 482913", &signature),
            Ok(true)
        );
    }

    #[test]
    fn test_verify_accepts_unprefixed_hex() {
        let key = key_from_byte(7);
        let address = address_of(&key);
        let signature = sign_personal(&key, "hello");

        assert_eq!(
            verify_personal_signature(&address, "hello", signature.trim_start_matches("0x")),
            Ok(true)
        );
    }

    #[test]
    fn test_verify_is_repeatable() {
        let key = key_from_byte(9);
        let address = address_of(&key);
        let signature = sign_personal(&key, "hello");

        let first = verify_personal_signature(&address, "hello", &signature);
        let second = verify_personal_signature(&address, "hello", &signature);
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_key_does_not_match() {
        let signer = key_from_byte(7);
        let claimed = address_of(&key_from_byte(8));
        let signature = sign_personal(&signer, "Nonce: 482913");

        assert_eq!(
            verify_personal_signature(&claimed, "Nonce: 482913", &signature),
            Ok(false)
        );
    }

    #[test]
    fn test_different_message_does_not_match() {
        let key = key_from_byte(7);
        let address = address_of(&key);
        let signature = sign_personal(&key, "Nonce: 482913");

        assert_eq!(
            verify_personal_signature(&address, "Nonce: 482914", &signature),
            Ok(false)
        );
    }

    #[test]
    fn test_rejects_bad_hex() {
        let address = address_of(&key_from_byte(7));
        assert!(matches!(
            verify_personal_signature(&address, "m", "0xnothex"),
            Err(SignatureError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_padded_signature() {
        let key = key_from_byte(7);
        let address = address_of(&key);
        let signature = sign_personal(&key, "m");

        assert!(matches!(
            verify_personal_signature(&address, "m", &format!(" {}", signature)),
            Err(SignatureError::Malformed(_))
        ));
        assert!(matches!(
            verify_personal_signature(&address, "m", &format!("{}\n", signature)),
            Err(SignatureError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_length() {
        let address = address_of(&key_from_byte(7));
        let short = format!("0x{}", "11".repeat(64));
        assert!(matches!(
            verify_personal_signature(&address, "m", &short),
            Err(SignatureError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_recovery_id_outside_27_28() {
        let key = key_from_byte(7);
        let address = address_of(&key);
        let signature = sign_personal(&key, "m");
        let body = &signature[2..signature.len() - 2];

        for v in [0u8, 1, 26, 29, 35, 255] {
            let tampered = format!("0x{}{:02x}", body, v);
            assert_eq!(
                verify_personal_signature(&address, "m", &tampered),
                Err(SignatureError::InvalidRecoveryId(v))
            );
        }
    }

    #[test]
    fn test_zero_signature_fails_recovery() {
        let address = address_of(&key_from_byte(7));
        let zeros = format!("0x{}1b", "00".repeat(64));
        assert!(matches!(
            verify_personal_signature(&address, "m", &zeros),
            Err(SignatureError::RecoveryFailed(_))
        ));
    }

    #[test]
    fn test_high_s_signature_still_recovers() {
        let key = key_from_byte(7);
        let address = address_of(&key);
        let digest = personal_message_digest(b"m");
        let (signature, recovery_id) = key.sign_prehash_recoverable(&digest).unwrap();

        // Build the malleable twin (r, n - s, v ^ 1)
        let (r, s) = signature.split_scalars();
        let s_high = -*s.as_ref();
        let high = Signature::from_scalars(r.to_bytes(), s_high.to_bytes()).unwrap();
        let mut bytes = high.to_bytes().to_vec();
        bytes.push(27 + (recovery_id.to_byte() ^ 1));
        let hex_sig = hex::encode(bytes);

        assert_eq!(
            verify_personal_signature(&address, "m", &hex_sig),
            Ok(true)
        );
    }
}
