//! X25519 Key Exchange
//!
//! Ephemeral Diffie-Hellman used by the sealed box. A fresh key pair is
//! generated per sealed message and its secret half never leaves this
//! module.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::ZeroizeOnDrop;

use super::error::{CryptoError, CryptoResult};
use super::hash::Hash;

/// Size of an X25519 public key in bytes
pub const EXCHANGE_KEY_SIZE: usize = 32;

/// Size of a shared secret in bytes
pub const SHARED_SECRET_SIZE: usize = 32;

/// Shared secret derived from key exchange
#[derive(ZeroizeOnDrop)]
pub struct SharedSecret {
    secret: [u8; SHARED_SECRET_SIZE],
}

impl SharedSecret {
    /// Get the raw bytes (be careful with this!)
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.secret
    }

    /// Derive a key for `context`, binding the exchange transcript.
    ///
    /// Input keying material is `secret ‖ transcript`.
    pub fn derive_key(&self, context: &str, transcript: &[u8]) -> [u8; 32] {
        let mut material = zeroize::Zeroizing::new(Vec::with_capacity(
            SHARED_SECRET_SIZE + transcript.len(),
        ));
        material.extend_from_slice(&self.secret);
        material.extend_from_slice(transcript);
        Hash::derive_key(context, &material)
    }
}

/// Run X25519 and reject a non-contributory (low-order) result
pub(crate) fn agree(
    secret: &StaticSecret,
    peer_public: &[u8; EXCHANGE_KEY_SIZE],
) -> CryptoResult<SharedSecret> {
    let shared = secret.diffie_hellman(&X25519Public::from(*peer_public));
    if !shared.was_contributory() {
        return Err(CryptoError::NonContributory);
    }
    Ok(SharedSecret {
        secret: shared.to_bytes(),
    })
}

/// An ephemeral keypair for key exchange
///
/// Used once and then discarded.
pub struct EphemeralKeypair {
    public_key: [u8; EXCHANGE_KEY_SIZE],
    secret: StaticSecret,
}

impl EphemeralKeypair {
    /// Generate a new ephemeral keypair
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519Public::from(&secret);

        EphemeralKeypair {
            public_key: public.to_bytes(),
            secret,
        }
    }

    /// Get the public key to share with the peer
    pub fn public_key(&self) -> &[u8; EXCHANGE_KEY_SIZE] {
        &self.public_key
    }

    /// Compute the shared secret with a peer's X25519 public key.
    ///
    /// Consumes the key pair so the secret is used at most once.
    pub fn diffie_hellman(
        self,
        peer_public: &[u8; EXCHANGE_KEY_SIZE],
    ) -> CryptoResult<SharedSecret> {
        agree(&self.secret, peer_public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_key_exchange() {
        let alice = EphemeralKeypair::generate();
        let bob_secret = StaticSecret::random_from_rng(OsRng);
        let bob_public = X25519Public::from(&bob_secret).to_bytes();
        let alice_public = *alice.public_key();

        let alice_shared = alice.diffie_hellman(&bob_public).unwrap();
        let bob_shared = agree(&bob_secret, &alice_public).unwrap();

        assert_eq!(alice_shared.as_bytes(), bob_shared.as_bytes());
    }

    #[test]
    fn test_low_order_point_rejected() {
        let alice = EphemeralKeypair::generate();
        let result = alice.diffie_hellman(&[0u8; EXCHANGE_KEY_SIZE]);

        assert!(matches!(result, Err(CryptoError::NonContributory)));
    }

    #[test]
    fn test_derive_key_binds_context_and_transcript() {
        let alice = EphemeralKeypair::generate();
        let bob = EphemeralKeypair::generate();
        let shared = alice.diffie_hellman(bob.public_key()).unwrap();

        let k1 = shared.derive_key("parley test context-a", b"t");
        let k2 = shared.derive_key("parley test context-b", b"t");
        let k3 = shared.derive_key("parley test context-a", b"u");

        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
    }
}
