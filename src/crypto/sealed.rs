//! Asymmetric hybrid encryption to a participant's public key
//!
//! ```text
//! eph        ← X25519.generate()
//! target     ← montgomery(recipient Ed25519 key)
//! shared     ← X25519(eph.secret, target)
//! key        ← BLAKE3-derive-key(CONTEXT, shared ‖ eph.public ‖ target)
//! output     ← eph.public ‖ ChaCha20-Poly1305(key, plaintext, aad = eph.public)
//! ```
//!
//! Only the holder of the recipient's private key can open the box. The
//! sender is anonymous at this layer; authentication is the handshake's job.

use super::cipher::{Cipher, NONCE_SIZE, TAG_SIZE};
use super::error::{CryptoError, CryptoResult};
use super::exchange::{agree, EphemeralKeypair, EXCHANGE_KEY_SIZE};
use super::identity::{KeyPair, PublicKey};

const CONTEXT: &str = "parley 2024 sealed-box v1";

/// Smallest possible sealed output (empty plaintext)
pub const SEALED_OVERHEAD: usize = EXCHANGE_KEY_SIZE + NONCE_SIZE + TAG_SIZE;

fn transcript(ephemeral: &[u8; EXCHANGE_KEY_SIZE], target: &[u8; EXCHANGE_KEY_SIZE]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(ephemeral);
    out[32..].copy_from_slice(target);
    out
}

/// Encrypt `plaintext` so that only `recipient` can read it
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let target = recipient.to_exchange_bytes()?;
    let ephemeral = EphemeralKeypair::generate();
    let ephemeral_public = *ephemeral.public_key();

    let shared = ephemeral.diffie_hellman(&target)?;
    let key = zeroize::Zeroizing::new(
        shared.derive_key(CONTEXT, &transcript(&ephemeral_public, &target)),
    );

    let body = Cipher::encrypt_with_aad(&key, plaintext, &ephemeral_public)?;

    let mut out = Vec::with_capacity(EXCHANGE_KEY_SIZE + body.len());
    out.extend_from_slice(&ephemeral_public);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decrypt a box produced by [`seal`] for `keypair`'s public key
pub fn open(keypair: &KeyPair, sealed: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < SEALED_OVERHEAD {
        return Err(CryptoError::DecryptionFailed);
    }

    let (ephemeral, body) = sealed.split_at(EXCHANGE_KEY_SIZE);
    let mut ephemeral_public = [0u8; EXCHANGE_KEY_SIZE];
    ephemeral_public.copy_from_slice(ephemeral);

    let target = keypair.public_key().to_exchange_bytes()?;
    // A low-order ephemeral key is indistinguishable from tampering to the caller.
    let shared = agree(&keypair.exchange_secret(), &ephemeral_public)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    let key = zeroize::Zeroizing::new(
        shared.derive_key(CONTEXT, &transcript(&ephemeral_public, &target)),
    );

    Cipher::decrypt_with_aad(&key, body, &ephemeral_public)
}
