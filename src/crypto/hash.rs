//! Digests and key derivation
//!
//! SHA-256 is the protocol digest: handshake transcripts and the session
//! key are SHA-256 outputs. BLAKE3 in derive-key mode is used internally
//! to turn Diffie-Hellman output into cipher keys.

use sha2::{Digest, Sha256};

/// Size of a digest output in bytes
pub const DIGEST_SIZE: usize = 32;

/// A SHA-256 output
pub type DigestOutput = [u8; DIGEST_SIZE];

/// Hashing and key derivation operations
pub struct Hash;

impl Hash {
    /// SHA-256 of `data`
    pub fn digest(data: &[u8]) -> DigestOutput {
        Sha256::digest(data).into()
    }

    /// SHA-256 over the concatenation of `parts`, in order
    pub fn digest_parts(parts: &[&[u8]]) -> DigestOutput {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().into()
    }

    /// Derive a 32-byte key from input keying material.
    ///
    /// The context must be a hardcoded, globally unique string naming
    /// the purpose of the derived key.
    pub fn derive_key(context: &str, material: &[u8]) -> [u8; 32] {
        blake3::derive_key(context, material)
    }

    /// Compute digest and return as hex string
    pub fn digest_hex(data: &[u8]) -> String {
        hex::encode(Self::digest(data))
    }
}

/// Constant-time comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
