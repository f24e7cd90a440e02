//! Argon2id password-based key derivation
//!
//! Turns a passphrase into a 256-bit cipher key for the key store.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{CryptoError, CryptoResult};

/// Minimum accepted salt length in bytes
pub const MIN_SALT_LEN: usize = 8;

/// Tuning parameters for Argon2id.
///
/// | Parameter | Default | Meaning |
/// |-----------|---------|---------|
/// | `m_cost`  | 65 536  | Memory in KiB (64 MiB) |
/// | `t_cost`  | 3       | Passes |
/// | `p_cost`  | 1       | Lanes |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB. Must be ≥ 8 × `p_cost`.
    pub m_cost: u32,
    /// Time cost (number of passes). Must be ≥ 1.
    pub t_cost: u32,
    /// Parallelism degree. Must be ≥ 1.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65_536,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

/// 256-bit key derived from a password, zeroized on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; 32]);

impl DerivedKey {
    /// Fixed byte length of the derived key
    pub const LEN: usize = 32;

    /// Returns the raw key material
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Derive a key from `password` and `salt` with Argon2id.
///
/// # Errors
///
/// [`CryptoError::KeyDerivationFailed`] if the salt is shorter than
/// [`MIN_SALT_LEN`], the parameters are out of range, or Argon2 fails.
pub fn derive_key(password: &[u8], salt: &[u8], params: &KdfParams) -> CryptoResult<DerivedKey> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::KeyDerivationFailed(format!(
            "salt must be at least {MIN_SALT_LEN} bytes, got {}",
            salt.len()
        )));
    }

    let argon2_params = argon2::Params::new(
        params.m_cost,
        params.t_cost,
        params.p_cost,
        Some(DerivedKey::LEN),
    )
    .map_err(|e| CryptoError::KeyDerivationFailed(format!("invalid Argon2 parameters: {e}")))?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let mut output = [0u8; DerivedKey::LEN];
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    Ok(DerivedKey(output))
}

#[cfg(test)]
pub(crate) fn fast_params() -> KdfParams {
    KdfParams {
        m_cost: 256,
        t_cost: 1,
        p_cost: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        let a = derive_key(b"hunter2", b"0123456789abcdef", &fast_params()).unwrap();
        let b = derive_key(b"hunter2", b"0123456789abcdef", &fast_params()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_salt_and_password_change_output() {
        let base = derive_key(b"hunter2", b"0123456789abcdef", &fast_params()).unwrap();
        let other_salt = derive_key(b"hunter2", b"fedcba9876543210", &fast_params()).unwrap();
        let other_pw = derive_key(b"hunter3", b"0123456789abcdef", &fast_params()).unwrap();

        assert_ne!(base.as_bytes(), other_salt.as_bytes());
        assert_ne!(base.as_bytes(), other_pw.as_bytes());
    }

    #[test]
    fn test_short_salt_rejected() {
        let result = derive_key(b"pw", b"short", &fast_params());
        assert!(matches!(result, Err(CryptoError::KeyDerivationFailed(_))));
    }

    #[test]
    fn test_zero_time_cost_rejected() {
        let params = KdfParams {
            t_cost: 0,
            ..fast_params()
        };
        assert!(derive_key(b"pw", b"0123456789abcdef", &params).is_err());
    }
}
