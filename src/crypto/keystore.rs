//! Password-protected storage form of a [`KeyPair`]
//!
//! The secret is sealed with ChaCha20-Poly1305 under an Argon2id key.
//! The public key travels in the clear and is bound as associated data,
//! so swapping it invalidates the record.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::cipher::Cipher;
use super::error::{CryptoError, CryptoResult};
use super::identity::{KeyPair, PublicKey, SECRET_KEY_SIZE};
use super::kdf::{derive_key, KdfParams};
use crate::config::CoreConfig;

/// Salt length used for new records
pub const SALT_SIZE: usize = 16;

/// Key pair encrypted under a password, safe to write to disk
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeyPair {
    /// Public half, in hex
    pub public_key: String,
    /// KDF parameters used for this record
    pub kdf: KdfParams,
    /// Argon2id salt, in hex
    pub salt: String,
    /// `nonce ‖ ciphertext ‖ tag` of the secret key, in hex
    pub ciphertext: String,
}

impl EncryptedKeyPair {
    /// Encrypt `keypair` under `password`
    pub fn seal(keypair: &KeyPair, password: &[u8], params: &KdfParams) -> CryptoResult<Self> {
        let mut salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);

        let key = derive_key(password, &salt, params)?;
        let ciphertext = Cipher::encrypt_with_aad(
            key.as_bytes(),
            keypair.secret_key_bytes(),
            keypair.public_key().as_bytes(),
        )?;

        Ok(EncryptedKeyPair {
            public_key: keypair.public_key().to_hex(),
            kdf: *params,
            salt: hex::encode(salt),
            ciphertext: hex::encode(ciphertext),
        })
    }

    /// Encrypt `keypair` under `password` with the configured KDF costs
    pub fn seal_with_config(
        keypair: &KeyPair,
        password: &[u8],
        config: &CoreConfig,
    ) -> CryptoResult<Self> {
        Self::seal(keypair, password, &config.kdf)
    }

    /// Public key of the stored pair, without decrypting
    pub fn public_key(&self) -> CryptoResult<PublicKey> {
        PublicKey::from_hex(&self.public_key)
    }

    /// Decrypt with `password`.
    ///
    /// A wrong password and a tampered record both yield
    /// [`CryptoError::DecryptionFailed`].
    pub fn open(&self, password: &[u8]) -> CryptoResult<KeyPair> {
        let public_key = self.public_key()?;
        let salt = hex::decode(&self.salt).map_err(|_| CryptoError::DecryptionFailed)?;
        let ciphertext =
            hex::decode(&self.ciphertext).map_err(|_| CryptoError::DecryptionFailed)?;

        let key = derive_key(password, &salt, &self.kdf)?;
        let secret = Zeroizing::new(Cipher::decrypt_with_aad(
            key.as_bytes(),
            &ciphertext,
            public_key.as_bytes(),
        )?);
        if secret.len() != SECRET_KEY_SIZE {
            return Err(CryptoError::InvalidSecretKey);
        }

        let mut joined = Zeroizing::new(Vec::with_capacity(SECRET_KEY_SIZE + 32));
        joined.extend_from_slice(&secret);
        joined.extend_from_slice(public_key.as_bytes());
        KeyPair::from_bytes(&joined)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> CryptoResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> CryptoResult<Self> {
        serde_json::from_str(json).map_err(|e| CryptoError::MalformedRecord(e.to_string()))
    }
}
