//! Initiating side of the handshake

use tracing::{debug, warn};

use super::{
    check_incoming, derive_session_key, generate_nonce, nonce_field, public_key_field,
    sign_transcript, signature_field, verify_transcript, HandshakeError, HandshakeResult, Nonce,
    Rejection,
};
use crate::crypto::KeyPair;
use crate::message::{ContentField, Message, TypeValue};
use crate::participant::Participant;
use crate::session::{Session, SessionKey};

/// Progress of a [`Challenger`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengerState {
    /// Nothing sent yet
    Created,
    /// Challenge produced, waiting for the response
    ChallengeSent,
    /// Response verified, success not yet produced
    ResponseConsumed,
    /// Success produced, session key available
    Complete,
    /// A response was rejected; the object is spent
    Failed,
}

impl ChallengerState {
    fn as_str(self) -> &'static str {
        match self {
            ChallengerState::Created => "Created",
            ChallengerState::ChallengeSent => "ChallengeSent",
            ChallengerState::ResponseConsumed => "ResponseConsumed",
            ChallengerState::Complete => "Complete",
            ChallengerState::Failed => "Failed",
        }
    }
}

enum Stage {
    Created,
    ChallengeSent {
        remote: Participant,
        local_nonce: Nonce,
    },
    ResponseConsumed {
        remote: Participant,
        local_nonce: Nonce,
        remote_nonce: Nonce,
    },
    Complete {
        remote: Participant,
        session_key: SessionKey,
    },
    Failed,
}

impl Stage {
    fn state(&self) -> ChallengerState {
        match self {
            Stage::Created => ChallengerState::Created,
            Stage::ChallengeSent { .. } => ChallengerState::ChallengeSent,
            Stage::ResponseConsumed { .. } => ChallengerState::ResponseConsumed,
            Stage::Complete { .. } => ChallengerState::Complete,
            Stage::Failed => ChallengerState::Failed,
        }
    }
}

/// The participant that opens a handshake.
///
/// Single-use: create one per attempt and drop it afterwards.
pub struct Challenger {
    local: Participant,
    keys: KeyPair,
    stage: Stage,
}

impl Challenger {
    /// Start an attempt as `local`, which must hold its private key
    pub fn new(local: Participant) -> HandshakeResult<Self> {
        let keys = local
            .key_pair()
            .cloned()
            .ok_or(HandshakeError::MissingPrivateKey)?;
        Ok(Challenger {
            local,
            keys,
            stage: Stage::Created,
        })
    }

    /// Current state
    pub fn state(&self) -> ChallengerState {
        self.stage.state()
    }

    /// The local participant
    pub fn local_participant(&self) -> &Participant {
        &self.local
    }

    /// The participant being challenged, once known
    pub fn remote_participant(&self) -> Option<&Participant> {
        match &self.stage {
            Stage::ChallengeSent { remote, .. }
            | Stage::ResponseConsumed { remote, .. }
            | Stage::Complete { remote, .. } => Some(remote),
            Stage::Created | Stage::Failed => None,
        }
    }

    fn illegal(&self, operation: &'static str) -> HandshakeError {
        HandshakeError::IllegalState {
            operation,
            state: self.state().as_str(),
        }
    }

    /// Round 1: challenge `remote` with a fresh nonce
    pub fn produce_challenge(&mut self, remote: Participant) -> HandshakeResult<Message> {
        if !matches!(self.stage, Stage::Created) {
            return Err(self.illegal("produce_challenge"));
        }

        let remote = remote.to_remote();
        let local_nonce = generate_nonce();
        let message = Message::new(remote.clone(), TypeValue::HandshakeChallenge)
            .with_field(
                ContentField::PublicKey,
                self.keys.public_key().as_bytes().to_vec(),
            )
            .with_field(ContentField::Nonce, local_nonce.to_vec());

        debug!(remote = %remote, "handshake challenge produced");
        self.stage = Stage::ChallengeSent {
            remote,
            local_nonce,
        };
        Ok(message)
    }

    /// Round 2: check the responder's nonce and signature.
    ///
    /// Any failure is terminal: the challenger moves to
    /// [`ChallengerState::Failed`] and no key is ever derived.
    pub fn consume_response(&mut self, message: &Message) -> HandshakeResult<()> {
        let (remote, local_nonce) =
            match std::mem::replace(&mut self.stage, Stage::Failed) {
                Stage::ChallengeSent {
                    remote,
                    local_nonce,
                } => (remote, local_nonce),
                other => {
                    self.stage = other;
                    return Err(self.illegal("consume_response"));
                }
            };

        match self.verify_response(message, &remote, &local_nonce) {
            Ok(remote_nonce) => {
                debug!(remote = %remote, "handshake response verified");
                self.stage = Stage::ResponseConsumed {
                    remote,
                    local_nonce,
                    remote_nonce,
                };
                Ok(())
            }
            Err(rejection) => {
                warn!(remote = %remote, reason = %rejection, "handshake response rejected");
                Err(rejection.into())
            }
        }
    }

    fn verify_response(
        &self,
        message: &Message,
        remote: &Participant,
        local_nonce: &Nonce,
    ) -> Result<Nonce, Rejection> {
        check_incoming(TypeValue::HandshakeResponse, message, self.keys.public_key())?;

        if public_key_field(message)? != *remote.public_key() {
            return Err(Rejection::UnexpectedPublicKey);
        }

        let remote_nonce = nonce_field(message)?;
        verify_transcript(
            remote.public_key(),
            &remote_nonce,
            local_nonce,
            signature_field(message)?,
        )?;
        Ok(remote_nonce)
    }

    /// Round 3: prove possession of the local key and derive the session key
    pub fn produce_success(&mut self) -> HandshakeResult<Message> {
        let (remote, local_nonce, remote_nonce) =
            match std::mem::replace(&mut self.stage, Stage::Failed) {
                Stage::ResponseConsumed {
                    remote,
                    local_nonce,
                    remote_nonce,
                } => (remote, local_nonce, remote_nonce),
                other => {
                    self.stage = other;
                    return Err(self.illegal("produce_success"));
                }
            };

        let signature = sign_transcript(&self.keys, &local_nonce, &remote_nonce);
        let message = Message::new(remote.clone(), TypeValue::HandshakeSuccess)
            .with_field(
                ContentField::PublicKey,
                self.keys.public_key().as_bytes().to_vec(),
            )
            .with_field(ContentField::Signature, signature.to_vec());

        let session_key = derive_session_key(&local_nonce, &remote_nonce);
        debug!(remote = %remote, "handshake complete (challenger)");
        self.stage = Stage::Complete {
            remote,
            session_key,
        };
        Ok(message)
    }

    /// Negotiated key; an error until the handshake is complete
    pub fn session_key(&self) -> HandshakeResult<&SessionKey> {
        match &self.stage {
            Stage::Complete { session_key, .. } => Ok(session_key),
            _ => Err(self.illegal("session_key")),
        }
    }

    /// Hand the completed handshake over as a [`Session`]
    pub fn into_session(self) -> HandshakeResult<Session> {
        match self.stage {
            Stage::Complete {
                remote,
                session_key,
            } => Ok(Session::new(remote, session_key)),
            other => Err(HandshakeError::IllegalState {
                operation: "into_session",
                state: other.state().as_str(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::{Responder, NONCE_LENGTH, SIGNATURE_MAX_LENGTH, SIGNATURE_MIN_LENGTH};

    fn pair() -> (Challenger, Responder, Participant, Participant) {
        let c = Participant::local_server(KeyPair::generate());
        let r = Participant::local_server(KeyPair::generate());
        (
            Challenger::new(c.clone()).unwrap(),
            Responder::new(r.clone()).unwrap(),
            c,
            r,
        )
    }

    /// Challenger after round 1 plus the response the responder sent
    fn up_to_response() -> (Challenger, Message) {
        let (mut challenger, mut responder, _, r) = pair();
        let challenge = challenger.produce_challenge(r.to_remote()).unwrap();
        responder.consume_challenge(&challenge).unwrap();
        let response = responder.produce_response().unwrap();
        (challenger, response)
    }

    #[test]
    fn challenge_shape() {
        let (mut challenger, _, c, r) = pair();
        let msg = challenger.produce_challenge(r.to_remote()).unwrap();

        assert_eq!(msg.message_type(), Some(TypeValue::HandshakeChallenge));
        assert_eq!(msg.recipient(), Some(&r));
        assert_eq!(msg.field(ContentField::PublicKey), Some(&c.public_key().0[..]));
        assert_eq!(msg.field(ContentField::Nonce).map(<[u8]>::len), Some(NONCE_LENGTH));
        assert_eq!(msg.fields().count(), 3);
        assert_eq!(challenger.state(), ChallengerState::ChallengeSent);
    }

    #[test]
    fn produce_challenge_twice_is_sequencing_error() {
        let (mut challenger, _, _, r) = pair();
        challenger.produce_challenge(r.to_remote()).unwrap();

        let err = challenger.produce_challenge(r.to_remote()).unwrap_err();
        assert!(err.is_sequencing());
        assert_eq!(challenger.state(), ChallengerState::ChallengeSent);
    }

    #[test]
    fn consume_response_before_challenge_is_sequencing_error() {
        let (_, response) = up_to_response();
        let (mut fresh, _, _, _) = pair();

        let err = fresh.consume_response(&response).unwrap_err();
        assert_eq!(
            err,
            HandshakeError::IllegalState {
                operation: "consume_response",
                state: "Created"
            }
        );
    }

    #[test]
    fn produce_success_requires_verified_response() {
        let (mut challenger, _, _, r) = pair();
        assert!(challenger.produce_success().unwrap_err().is_sequencing());
        challenger.produce_challenge(r.to_remote()).unwrap();
        assert!(challenger.produce_success().unwrap_err().is_sequencing());
    }

    #[test]
    fn session_key_unreadable_before_completion() {
        let (mut challenger, response) = up_to_response();
        assert!(challenger.session_key().unwrap_err().is_sequencing());

        challenger.consume_response(&response).unwrap();
        assert!(challenger.session_key().is_err());

        challenger.produce_success().unwrap();
        assert!(challenger.session_key().is_ok());
    }

    #[test]
    fn tampered_nonce_rejected() {
        let (mut challenger, mut response) = up_to_response();
        let mut nonce = response.field(ContentField::Nonce).unwrap().to_vec();
        nonce[17] ^= 0x01;
        response.set_field(ContentField::Nonce, nonce);

        let err = challenger.consume_response(&response).unwrap_err();
        assert_eq!(err, HandshakeError::Rejected(Rejection::BadSignature));
        assert_eq!(challenger.state(), ChallengerState::Failed);
        assert!(challenger.session_key().is_err());
    }

    #[test]
    fn tampered_signature_rejected() {
        let (mut challenger, mut response) = up_to_response();
        let mut sig = response.field(ContentField::Signature).unwrap().to_vec();
        sig[0] ^= 0x80;
        response.set_field(ContentField::Signature, sig);

        assert!(challenger.consume_response(&response).unwrap_err().is_rejection());
        assert!(challenger.session_key().is_err());
    }

    #[test]
    fn failed_challenger_stays_failed() {
        let (mut challenger, mut response) = up_to_response();
        let good = response.clone();
        response.remove_field(ContentField::Signature);

        assert_eq!(
            challenger.consume_response(&response).unwrap_err(),
            HandshakeError::Rejected(Rejection::Shape("exact-field-set"))
        );
        assert!(challenger.consume_response(&good).unwrap_err().is_sequencing());
        assert!(challenger.produce_success().unwrap_err().is_sequencing());
    }

    #[test]
    fn signature_length_outside_window_rejected_by_shape() {
        for len in [SIGNATURE_MIN_LENGTH - 1, SIGNATURE_MAX_LENGTH + 1] {
            let (mut challenger, mut response) = up_to_response();
            response.set_field(ContentField::Signature, vec![1u8; len]);

            assert_eq!(
                challenger.consume_response(&response).unwrap_err(),
                HandshakeError::Rejected(Rejection::Shape("signature"))
            );
        }
    }

    #[test]
    fn signature_length_inside_window_reaches_verification() {
        let (mut challenger, mut response) = up_to_response();
        response.set_field(ContentField::Signature, vec![1u8; SIGNATURE_MIN_LENGTH]);

        assert_eq!(
            challenger.consume_response(&response).unwrap_err(),
            HandshakeError::Rejected(Rejection::BadSignature)
        );
    }

    #[test]
    fn wrong_version_rejected() {
        let (mut challenger, response) = up_to_response();
        let response = response.with_version("0.9");

        assert_eq!(
            challenger.consume_response(&response).unwrap_err(),
            HandshakeError::Rejected(Rejection::Shape("version"))
        );
    }

    #[test]
    fn response_from_impostor_rejected() {
        let (mut challenger, mut response) = up_to_response();
        let impostor = KeyPair::generate();
        response.set_field(
            ContentField::PublicKey,
            impostor.public_key().as_bytes().to_vec(),
        );

        assert_eq!(
            challenger.consume_response(&response).unwrap_err(),
            HandshakeError::Rejected(Rejection::UnexpectedPublicKey)
        );
    }

    #[test]
    fn challenger_needs_private_key() {
        let remote_only = Participant::server(*KeyPair::generate().public_key());
        assert!(matches!(
            Challenger::new(remote_only),
            Err(HandshakeError::MissingPrivateKey)
        ));
    }
}
