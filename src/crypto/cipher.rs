//! ChaCha20-Poly1305 AEAD Encryption
//!
//! Symmetric layer shared by the sealed box and the key store.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use super::error::{CryptoError, CryptoResult};

/// Size of the encryption key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Symmetric cipher for encryption/decryption
pub struct Cipher;

impl Cipher {
    /// Encrypt data with authentication
    ///
    /// Returns: nonce || ciphertext || tag
    pub fn encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        Self::encrypt_with_aad(key, plaintext, &[])
    }

    /// Encrypt data with associated data (AAD)
    ///
    /// AAD is authenticated but not encrypted.
    /// Returns: nonce || ciphertext || tag
    pub fn encrypt_with_aad(
        key: &[u8; KEY_SIZE],
        plaintext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(key.into());

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt data
    ///
    /// Input: nonce || ciphertext || tag
    pub fn decrypt(key: &[u8; KEY_SIZE], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        Self::decrypt_with_aad(key, ciphertext, &[])
    }

    /// Decrypt data with associated data (AAD)
    ///
    /// The AAD must match what was used during encryption
    pub fn decrypt_with_aad(
        key: &[u8; KEY_SIZE],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }

        let cipher = ChaCha20Poly1305::new(key.into());
        let (nonce, encrypted) = ciphertext.split_at(NONCE_SIZE);

        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: encrypted,
                    aad,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = [42u8; KEY_SIZE];
        let plaintext = b"content block";

        let ciphertext = Cipher::encrypt(&key, plaintext).unwrap();
        let decrypted = Cipher::decrypt(&key, &ciphertext).unwrap();

        assert_eq!(plaintext, decrypted.as_slice());
        assert_eq!(ciphertext.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_ciphertext_different_each_time() {
        let key = [42u8; KEY_SIZE];

        let ct1 = Cipher::encrypt(&key, b"Hello").unwrap();
        let ct2 = Cipher::encrypt(&key, b"Hello").unwrap();

        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_wrong_key_fails() {
        let ciphertext = Cipher::encrypt(&[1u8; KEY_SIZE], b"Secret").unwrap();
        assert_eq!(
            Cipher::decrypt(&[2u8; KEY_SIZE], &ciphertext),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [42u8; KEY_SIZE];
        let mut ciphertext = Cipher::encrypt(&key, b"Hello").unwrap();

        if let Some(byte) = ciphertext.get_mut(NONCE_SIZE + 1) {
            *byte ^= 0xFF;
        }

        assert!(Cipher::decrypt(&key, &ciphertext).is_err());
    }

    #[test]
    fn test_truncated_input_fails() {
        let key = [42u8; KEY_SIZE];
        assert!(Cipher::decrypt(&key, &[0u8; NONCE_SIZE + TAG_SIZE - 1]).is_err());
    }

    #[test]
    fn test_aad_must_match() {
        let key = [42u8; KEY_SIZE];
        let ciphertext = Cipher::encrypt_with_aad(&key, b"Secret data", b"header").unwrap();

        assert!(Cipher::decrypt_with_aad(&key, &ciphertext, b"header").is_ok());
        assert!(Cipher::decrypt_with_aad(&key, &ciphertext, b"wrong").is_err());
        assert!(Cipher::decrypt(&key, &ciphertext).is_err());
    }

    #[test]
    fn test_empty_plaintext() {
        let key = [42u8; KEY_SIZE];
        let ciphertext = Cipher::encrypt(&key, b"").unwrap();
        assert!(Cipher::decrypt(&key, &ciphertext).unwrap().is_empty());
    }
}
