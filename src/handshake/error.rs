//! Handshake error types

use thiserror::Error;

/// Why an incoming handshake message was not accepted.
///
/// Shape failures and cryptographic failures share this one type so the
/// caller sees a single rejection class. Variants name the failing check
/// only; they never carry nonce, signature or key bytes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A shape validator rejected the message
    #[error("failed {0} check")]
    Shape(&'static str),

    /// The message is addressed to someone else
    #[error("not addressed to the local participant")]
    WrongRecipient,

    /// `PUBLIC_KEY` is not the key of the participant this handshake is with
    #[error("public key does not belong to the expected participant")]
    UnexpectedPublicKey,

    /// The signature did not verify against the locally recomputed digest
    #[error("signature verification failed")]
    BadSignature,
}

/// Errors that can occur while running a handshake
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The peer's message was rejected; the attempt is over
    #[error("handshake message rejected: {0}")]
    Rejected(#[from] Rejection),

    /// An operation was called out of order or twice
    #[error("illegal handshake state: {operation} is not allowed in state {state}")]
    IllegalState {
        /// Operation that was attempted
        operation: &'static str,
        /// State the handshake was in
        state: &'static str,
    },

    /// The local participant was created without a private key
    #[error("local participant has no private key")]
    MissingPrivateKey,
}

impl HandshakeError {
    /// Protocol failure caused by the peer's message
    pub fn is_rejection(&self) -> bool {
        matches!(self, HandshakeError::Rejected(_))
    }

    /// Integration defect: wrong call order or setup
    pub fn is_sequencing(&self) -> bool {
        matches!(
            self,
            HandshakeError::IllegalState { .. } | HandshakeError::MissingPrivateKey
        )
    }
}

/// Result type for handshake operations
pub type HandshakeResult<T> = Result<T, HandshakeError>;
