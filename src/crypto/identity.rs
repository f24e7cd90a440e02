//! Ed25519 key material for participants
//!
//! A [`KeyPair`] is the full identity of a local participant. Remote
//! participants are known only by their [`PublicKey`]. The same Ed25519
//! key is converted to X25519 form when a message is sealed to it.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::StaticSecret;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{CryptoError, CryptoResult};

/// Size of a public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of a secret key in bytes
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of a signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// A participant's public key, in its 32-byte wire encoding
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Create from raw bytes.
    ///
    /// Rejects both a wrong length and bytes that are not a valid
    /// Ed25519 point encoding.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; PUBLIC_KEY_SIZE];
        arr.copy_from_slice(bytes);
        VerifyingKey::from_bytes(&arr).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(PublicKey(arr))
    }

    /// Whether `bytes` decode to a key of the expected curve
    pub fn is_valid_encoding(bytes: &[u8]) -> bool {
        Self::from_bytes(bytes).is_ok()
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Convert to hex string for display
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create from hex string
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidPublicKey)?;
        Self::from_bytes(&bytes)
    }

    /// Verify a signature against this public key
    pub fn verify(&self, message: &[u8], signature: &SignatureBytes) -> CryptoResult<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig = Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }

    /// Montgomery (X25519) form of this key, used as a sealing target
    pub fn to_exchange_bytes(&self) -> CryptoResult<[u8; 32]> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(verifying_key.to_montgomery().to_bytes())
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({}...)", &self.to_hex()[..16])
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A detached Ed25519 signature
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SignatureBytes(pub [u8; SIGNATURE_SIZE]);

impl SignatureBytes {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(CryptoError::InvalidSignatureLength {
                expected: SIGNATURE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; SIGNATURE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(SignatureBytes(arr))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    /// Copy into an owned buffer for a content field
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl std::fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}...)", &hex::encode(self.0)[..16])
    }
}

/// A full Ed25519 key pair
///
/// The secret key is automatically zeroized when dropped.
#[derive(ZeroizeOnDrop)]
pub struct KeyPair {
    #[zeroize(skip)]
    public_key: PublicKey,
    secret_key: [u8; SECRET_KEY_SIZE],
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(&signing_key)
    }

    /// Create from a seed (deterministic generation)
    pub fn from_seed(seed: &[u8; SECRET_KEY_SIZE]) -> Self {
        Self::from_signing_key(&SigningKey::from_bytes(seed))
    }

    fn from_signing_key(signing_key: &SigningKey) -> Self {
        KeyPair {
            public_key: PublicKey(signing_key.verifying_key().to_bytes()),
            secret_key: signing_key.to_bytes(),
        }
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Get the secret key bytes
    ///
    /// # Security Warning
    /// Handle with extreme care! The secret key should never be logged,
    /// stored unencrypted, or transmitted over a network.
    pub fn secret_key_bytes(&self) -> &[u8; SECRET_KEY_SIZE] {
        &self.secret_key
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        let signing_key = SigningKey::from_bytes(&self.secret_key);
        SignatureBytes(signing_key.sign(message).to_bytes())
    }

    /// Verify a signature (convenience method)
    pub fn verify(&self, message: &[u8], signature: &SignatureBytes) -> CryptoResult<()> {
        self.public_key.verify(message, signature)
    }

    /// X25519 secret matching [`PublicKey::to_exchange_bytes`]
    pub(crate) fn exchange_secret(&self) -> StaticSecret {
        let signing_key = SigningKey::from_bytes(&self.secret_key);
        let mut scalar = signing_key.to_scalar_bytes();
        let secret = StaticSecret::from(scalar);
        scalar.zeroize();
        secret
    }

    /// Export key pair to bytes (`secret ‖ public`)
    ///
    /// WARNING: This exposes the secret key. Prefer
    /// [`EncryptedKeyPair`](super::keystore::EncryptedKeyPair) for storage.
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE + PUBLIC_KEY_SIZE] {
        let mut bytes = [0u8; SECRET_KEY_SIZE + PUBLIC_KEY_SIZE];
        bytes[..SECRET_KEY_SIZE].copy_from_slice(&self.secret_key);
        bytes[SECRET_KEY_SIZE..].copy_from_slice(&self.public_key.0);
        bytes
    }

    /// Import key pair from bytes (`secret ‖ public`)
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SECRET_KEY_SIZE + PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: SECRET_KEY_SIZE + PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }

        let mut secret_key = [0u8; SECRET_KEY_SIZE];
        secret_key.copy_from_slice(&bytes[..SECRET_KEY_SIZE]);

        let signing_key = SigningKey::from_bytes(&secret_key);
        let derived_public = signing_key.verifying_key().to_bytes();
        secret_key.zeroize();

        if derived_public[..] != bytes[SECRET_KEY_SIZE..] {
            return Err(CryptoError::InvalidSecretKey);
        }

        Ok(Self::from_signing_key(&signing_key))
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        KeyPair {
            public_key: self.public_key,
            secret_key: self.secret_key,
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pair_generation() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();

        assert_ne!(kp1.public_key().0, kp2.public_key().0);
    }

    #[test]
    fn test_deterministic_generation() {
        let seed = [42u8; 32];
        let kp1 = KeyPair::from_seed(&seed);
        let kp2 = KeyPair::from_seed(&seed);

        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_sign_verify() {
        let kp = KeyPair::generate();
        let message = b"challenge digest";

        let signature = kp.sign(message);
        assert!(kp.verify(message, &signature).is_ok());
        assert!(kp.verify(b"other digest", &signature).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();

        let signature = kp1.sign(b"digest");
        assert_eq!(
            kp2.verify(b"digest", &signature),
            Err(CryptoError::SignatureVerificationFailed)
        );
    }

    #[test]
    fn test_export_import() {
        let kp = KeyPair::generate();
        let restored = KeyPair::from_bytes(&kp.to_bytes()).unwrap();

        assert_eq!(kp.public_key(), restored.public_key());
        assert_eq!(kp.secret_key_bytes(), restored.secret_key_bytes());
    }

    #[test]
    fn test_import_rejects_mismatched_halves() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let mut bytes = kp.to_bytes();
        bytes[SECRET_KEY_SIZE..].copy_from_slice(other.public_key().as_bytes());

        assert_eq!(
            KeyPair::from_bytes(&bytes).unwrap_err(),
            CryptoError::InvalidSecretKey
        );
    }

    #[test]
    fn test_public_key_rejects_wrong_length() {
        assert_eq!(
            PublicKey::from_bytes(&[1u8; 31]),
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 31
            })
        );
        assert!(!PublicKey::is_valid_encoding(&[]));
    }

    #[test]
    fn test_public_key_hex() {
        let kp = KeyPair::generate();
        let restored = PublicKey::from_hex(&kp.public_key().to_hex()).unwrap();

        assert_eq!(kp.public_key(), &restored);
    }

    #[test]
    fn test_exchange_secret_matches_public_conversion() {
        let kp = KeyPair::generate();
        let secret = kp.exchange_secret();
        let derived = x25519_dalek::PublicKey::from(&secret).to_bytes();

        assert_eq!(derived, kp.public_key().to_exchange_bytes().unwrap());
    }

    #[test]
    fn test_debug_hides_secret() {
        let kp = KeyPair::from_seed(&[7u8; 32]);
        let rendered = format!("{kp:?}");

        assert!(!rendered.contains(&hex::encode(kp.secret_key_bytes())));
    }
}
