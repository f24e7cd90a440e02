//! Three-round mutual authentication and session-key agreement
//!
//! ```text
//!  Challenger                                   Responder
//!  produce_challenge ── PUBLIC_KEY, NONCE ────► consume_challenge
//!  consume_response  ◄─ PUBLIC_KEY, NONCE, SIG ─ produce_response
//!  produce_success   ── PUBLIC_KEY, SIG ──────► consume_success
//! ```
//!
//! Each side signs `SHA256(own_public_key ‖ own_nonce ‖ other_nonce)` and
//! checks the peer's signature against the same digest recomputed
//! locally. The session key is `SHA256(challenger_nonce ‖ responder_nonce)`.
//!
//! [`Challenger`] and [`Responder`] are single-use: each operation runs at
//! most once, in order. Calling out of order is a
//! [`HandshakeError::IllegalState`]; a bad peer message is a
//! [`HandshakeError::Rejected`] and ends the attempt.

mod challenger;
mod error;
mod responder;

pub use challenger::{Challenger, ChallengerState};
pub use error::{HandshakeError, HandshakeResult, Rejection};
pub use responder::{Responder, ResponderState};

use crate::crypto::{
    random_bytes, DigestOutput, Hash, KeyPair, PublicKey, SignatureBytes, SIGNATURE_SIZE,
};
use crate::message::validators::{first_failure_boxed, validators_for};
use crate::message::{ContentField, Message, TypeValue};
use crate::participant::Participant;
use crate::session::SessionKey;

/// Length of every handshake nonce in bytes
pub const NONCE_LENGTH: usize = 128;

/// Shortest accepted `SIGNATURE` field (Ed25519 encodings are fixed-size)
pub const SIGNATURE_MIN_LENGTH: usize = SIGNATURE_SIZE;

/// Longest accepted `SIGNATURE` field
pub const SIGNATURE_MAX_LENGTH: usize = SIGNATURE_SIZE;

/// A handshake nonce
pub type Nonce = [u8; NONCE_LENGTH];

/// Fresh random nonce for one handshake attempt
pub fn generate_nonce() -> Nonce {
    random_bytes::<NONCE_LENGTH>()
}

/// `SHA256(signer_key ‖ own_nonce ‖ other_nonce)`
pub fn transcript_digest(signer: &PublicKey, own_nonce: &[u8], other_nonce: &[u8]) -> DigestOutput {
    Hash::digest_parts(&[&signer.as_bytes()[..], own_nonce, other_nonce])
}

/// Sign the transcript digest for `signer`'s own nonce
pub fn sign_transcript(signer: &KeyPair, own_nonce: &[u8], other_nonce: &[u8]) -> SignatureBytes {
    signer.sign(&transcript_digest(signer.public_key(), own_nonce, other_nonce))
}

/// Verify `signature` over the digest `signer` should have signed
pub fn verify_transcript(
    signer: &PublicKey,
    signer_nonce: &[u8],
    other_nonce: &[u8],
    signature: &[u8],
) -> Result<(), Rejection> {
    let signature = SignatureBytes::from_bytes(signature).map_err(|_| Rejection::BadSignature)?;
    signer
        .verify(&transcript_digest(signer, signer_nonce, other_nonce), &signature)
        .map_err(|_| Rejection::BadSignature)
}

/// `SHA256(challenger_nonce ‖ responder_nonce)`
pub fn derive_session_key(challenger_nonce: &[u8], responder_nonce: &[u8]) -> SessionKey {
    SessionKey::new(Hash::digest_parts(&[challenger_nonce, responder_nonce]))
}

/// Build a `HANDSHAKE_INVALIDATE` message asking `remote` to drop the
/// session identified by `session_key`.
pub fn invalidate_message(remote: Participant, session_key: &SessionKey) -> Message {
    Message::new(remote, TypeValue::HandshakeInvalidate)
        .with_field(ContentField::SessionKey, session_key.as_bytes().to_vec())
}

/// Standard chain for `expected` plus the recipient check shared by every
/// consume step
fn check_incoming(
    expected: TypeValue,
    message: &Message,
    local: &PublicKey,
) -> Result<(), Rejection> {
    if let Some(name) = first_failure_boxed(&validators_for(expected), message) {
        return Err(Rejection::Shape(name));
    }
    match message.recipient() {
        Some(r) if r.public_key() == local => Ok(()),
        _ => Err(Rejection::WrongRecipient),
    }
}

/// Nonce field as a fixed array; callers validate the length first
fn nonce_field(message: &Message) -> Result<Nonce, Rejection> {
    message
        .field(ContentField::Nonce)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(Rejection::Shape("nonce"))
}

/// `PUBLIC_KEY` field decoded
fn public_key_field(message: &Message) -> Result<PublicKey, Rejection> {
    message
        .field(ContentField::PublicKey)
        .and_then(|bytes| PublicKey::from_bytes(bytes).ok())
        .ok_or(Rejection::Shape("public-key"))
}

/// `SIGNATURE` field bytes
fn signature_field(message: &Message) -> Result<&[u8], Rejection> {
    message
        .field(ContentField::Signature)
        .ok_or(Rejection::Shape("signature"))
}
