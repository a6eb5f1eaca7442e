//! Key derivation.
//!
//! The SRP handshake yields a 32-byte shared secret `K` on both sides.
//! That secret is never used directly as an encryption key: each side
//! expands it through HKDF-SHA256, salted with the server's room salt,
//! to obtain the AES-256-GCM session key. Nothing key-shaped ever
//! crosses the wire.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::crypto::{AeadKey, KEY_SIZE};

/// Domain-separation label for chat session keys.
const SESSION_KEY_INFO: &[u8] = b"chat-v1";

/// Derive the AEAD session key from the SRP shared secret.
///
/// # Arguments
///
/// * `shared_secret` - The SRP-derived `K = H(S)` (32 bytes)
/// * `room_salt` - The server's room salt from the challenge
pub fn derive_session_key(shared_secret: &[u8], room_salt: &[u8]) -> AeadKey {
    let hk = Hkdf::<Sha256>::new(Some(room_salt), shared_secret);

    let mut okm = [0u8; KEY_SIZE];
    // 32 bytes is always a valid HKDF-SHA256 output length
    hk.expand(SESSION_KEY_INFO, &mut okm)
        .expect("HKDF expansion of one key block cannot fail");

    AeadKey::from_bytes(okm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecureRandom;

    #[test]
    fn test_derivation_is_deterministic() {
        let secret = [0x0bu8; 32];
        let salt = [0x5au8; 16];

        let a = derive_session_key(&secret, &salt);
        let b = derive_session_key(&secret, &salt);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_salt_and_secret_both_matter() {
        let secret = SecureRandom::bytes::<32>();
        let salt = SecureRandom::bytes::<16>();

        let base = derive_session_key(&secret, &salt);

        let other_secret = SecureRandom::bytes::<32>();
        assert_ne!(
            base.as_bytes(),
            derive_session_key(&other_secret, &salt).as_bytes()
        );

        let other_salt = SecureRandom::bytes::<16>();
        assert_ne!(
            base.as_bytes(),
            derive_session_key(&secret, &other_salt).as_bytes()
        );
    }

    #[test]
    fn test_key_is_not_the_secret() {
        let secret = [0x42u8; 32];
        let salt = [0x00u8; 16];
        assert_ne!(derive_session_key(&secret, &salt).as_bytes(), &secret);
    }
}
