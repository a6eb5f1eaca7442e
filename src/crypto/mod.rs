//! Cryptographic primitives for the chat protocol.
//!
//! This module provides:
//! - AES-256-GCM AEAD encryption (the session envelope)
//! - HKDF session-key derivation from the SRP shared secret
//! - Secure random number generation
//! - Constant-time byte comparison
//!
//! Secret key material is zeroized on drop to prevent memory leakage.
//! The SRP-6a group math itself lives in [`crate::srp`].

mod aead;
mod kdf;
mod random;

pub use aead::{Aead, AeadKey};
pub use kdf::derive_session_key;
pub use random::SecureRandom;

use subtle::ConstantTimeEq;

/// Size of symmetric keys in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the AEAD IV in bytes (96 bits for AES-GCM)
pub const NONCE_SIZE: usize = 12;

/// Size of the AEAD authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of credential and room salts in bytes (128 bits)
pub const SALT_SIZE: usize = 16;

/// Constant-time equality over byte slices.
///
/// The comparison never short-circuits: every byte pair is XORed and the
/// results ORed together, so the running time does not depend on where the
/// operands first differ. Operand lengths are public.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ct_eq() {
        assert!(ct_eq(b"same bytes", b"same bytes"));
        assert!(!ct_eq(b"same bytes", b"diff bytes"));
        assert!(!ct_eq(b"short", b"longer slice"));
        assert!(ct_eq(b"", b""));
    }

    #[test]
    fn test_session_key_agreement() {
        // Both sides expand the same SRP secret to the same AEAD key.
        let shared = [0x42u8; 32];
        let room_salt = SecureRandom::bytes::<SALT_SIZE>();

        let client_key = derive_session_key(&shared, &room_salt);
        let server_key = derive_session_key(&shared, &room_salt);
        assert_eq!(client_key.as_bytes(), server_key.as_bytes());

        let plaintext = b"Hello, secure world!";
        let sealed = Aead::new(&client_key).encrypt(plaintext, b"").unwrap();
        let opened = Aead::new(&server_key).decrypt(&sealed, b"").unwrap();
        assert_eq!(opened.as_slice(), plaintext);
    }
}
