//! Cryptographic primitives
//!
//! - `identity`: Ed25519 key pairs, public keys and signatures
//! - `hash`: SHA-256 protocol digest and BLAKE3 key derivation
//! - `exchange`: X25519 ephemeral key agreement
//! - `cipher`: ChaCha20-Poly1305 AEAD encryption
//! - `sealed`: hybrid encryption to a participant's public key
//! - `kdf` / `keystore`: Argon2id and password-protected key storage

pub mod cipher;
pub mod error;
pub mod exchange;
pub mod hash;
pub mod identity;
pub mod kdf;
pub mod keystore;
pub mod sealed;

pub use cipher::Cipher;
pub use error::{CryptoError, CryptoResult};
pub use hash::{constant_time_eq, DigestOutput, Hash, DIGEST_SIZE};
pub use identity::{KeyPair, PublicKey, SignatureBytes, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
pub use kdf::{DerivedKey, KdfParams};
pub use keystore::EncryptedKeyPair;

/// Generate cryptographically secure random bytes
pub fn random_bytes<const N: usize>() -> [u8; N] {
    use rand::RngCore;
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
