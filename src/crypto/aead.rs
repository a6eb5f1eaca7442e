//! Authenticated Encryption with Associated Data (AEAD).
//!
//! Uses AES-256-GCM for symmetric encryption with authentication.
//! Every encryption draws a fresh random 96-bit IV, and the envelope
//! carries it alongside the ciphertext:
//!
//! ```text
//! [ IV (12) ][ ciphertext ][ tag (16) ]
//! ```
//!
//! Decryption verifies the tag before returning any plaintext; all
//! failures collapse into one opaque authentication error.

use aes_gcm::{
    aead::{Aead as AeadTrait, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{SecureRandom, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use crate::error::{Error, Result};

/// A symmetric key for AEAD operations.
///
/// Automatically zeroized when dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AeadKey([u8; KEY_SIZE]);

impl std::fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AeadKey(REDACTED)")
    }
}

impl AeadKey {
    /// Create a new AEAD key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw key bytes.
    ///
    /// # Security
    ///
    /// Handle with care - this is secret key material.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl AsRef<[u8]> for AeadKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// AES-256-GCM AEAD cipher bound to one session key.
pub struct Aead {
    cipher: Aes256Gcm,
}

impl Aead {
    /// Create a new AEAD instance with the given key.
    pub fn new(key: &AeadKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.as_bytes().into()),
        }
    }

    /// Encrypt plaintext with associated authenticated data.
    ///
    /// Returns the full envelope `IV || ciphertext || tag`. The IV is
    /// drawn fresh from the CSPRNG on every call, so the same plaintext
    /// never produces the same envelope twice.
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let iv = SecureRandom::bytes::<NONCE_SIZE>();
        let payload = Payload {
            msg: plaintext,
            aad,
        };

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), payload)
            .map_err(|_| Error::crypto("encryption failed"))?;

        let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        envelope.extend_from_slice(&iv);
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    /// Decrypt an envelope produced by [`Aead::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns an opaque error if the envelope is too short or the tag
    /// does not verify (wrong key, wrong AAD, tampered data).
    pub fn decrypt(&self, envelope: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if envelope.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::crypto("envelope too short"));
        }

        let (iv, ciphertext) = envelope.split_at(NONCE_SIZE);
        let payload = Payload {
            msg: ciphertext,
            aad,
        };

        self.cipher
            .decrypt(Nonce::from_slice(iv), payload)
            .map_err(|_| Error::crypto("decryption/authentication failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> AeadKey {
        AeadKey::from_bytes([
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
            0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
            0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17,
            0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f,
        ])
    }

    #[test]
    fn test_encrypt_decrypt() {
        let aead = Aead::new(&test_key());

        let plaintext = b"Hello, World!";
        let aad = b"context";

        let envelope = aead.encrypt(plaintext, aad).unwrap();
        assert_eq!(envelope.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);

        let decrypted = aead.decrypt(&envelope, aad).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_empty_plaintext_roundtrips() {
        let aead = Aead::new(&test_key());

        let envelope = aead.encrypt(b"", b"").unwrap();
        assert_eq!(envelope.len(), NONCE_SIZE + TAG_SIZE);

        let decrypted = aead.decrypt(&envelope, b"").unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_fresh_iv_per_encryption() {
        let aead = Aead::new(&test_key());

        let a = aead.encrypt(b"same message", b"").unwrap();
        let b = aead.encrypt(b"same message", b"").unwrap();
        assert_ne!(a, b);
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
    }

    #[test]
    fn test_wrong_key_fails() {
        let aead1 = Aead::new(&test_key());
        let aead2 = Aead::new(&AeadKey::from_bytes([0x42u8; KEY_SIZE]));

        let envelope = aead1.encrypt(b"secret data", b"").unwrap();
        assert!(aead2.decrypt(&envelope, b"").is_err());
    }

    #[test]
    fn test_wrong_aad_fails() {
        let aead = Aead::new(&test_key());

        let envelope = aead.encrypt(b"secret data", b"context1").unwrap();
        assert!(aead.decrypt(&envelope, b"context2").is_err());
    }

    #[test]
    fn test_any_bit_flip_fails() {
        let aead = Aead::new(&test_key());
        let envelope = aead.encrypt(b"secret data", b"aad").unwrap();

        // Flip one bit in each region: IV, ciphertext, tag.
        for index in [0, NONCE_SIZE, envelope.len() - 1] {
            let mut tampered = envelope.clone();
            tampered[index] ^= 0x01;
            assert!(
                aead.decrypt(&tampered, b"aad").is_err(),
                "bit flip at byte {} was not detected",
                index
            );
        }
    }

    #[test]
    fn test_truncated_envelope_rejected() {
        let aead = Aead::new(&test_key());
        assert!(aead.decrypt(&[0u8; NONCE_SIZE + TAG_SIZE - 1], b"").is_err());
        assert!(aead.decrypt(b"", b"").is_err());
    }
}
