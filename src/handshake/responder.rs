//! Answering side of the handshake

use tracing::{debug, warn};

use super::{
    check_incoming, derive_session_key, generate_nonce, nonce_field, public_key_field,
    sign_transcript, signature_field, verify_transcript, HandshakeError, HandshakeResult, Nonce,
    Rejection,
};
use crate::crypto::{KeyPair, PublicKey};
use crate::message::{ContentField, Message, TypeValue};
use crate::participant::Participant;
use crate::session::{Session, SessionKey};

/// Progress of a [`Responder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    /// Waiting for a challenge
    Created,
    /// Challenge accepted, response not yet produced
    ChallengeConsumed,
    /// Response produced, waiting for success
    ResponseSent,
    /// Success verified, session key available
    Complete,
    /// An incoming message was rejected; the object is spent
    Failed,
}

impl ResponderState {
    fn as_str(self) -> &'static str {
        match self {
            ResponderState::Created => "Created",
            ResponderState::ChallengeConsumed => "ChallengeConsumed",
            ResponderState::ResponseSent => "ResponseSent",
            ResponderState::Complete => "Complete",
            ResponderState::Failed => "Failed",
        }
    }
}

enum Stage {
    Created,
    ChallengeConsumed {
        remote: Participant,
        remote_nonce: Nonce,
    },
    ResponseSent {
        remote: Participant,
        remote_nonce: Nonce,
        local_nonce: Nonce,
    },
    Complete {
        remote: Participant,
        session_key: SessionKey,
    },
    Failed,
}

impl Stage {
    fn state(&self) -> ResponderState {
        match self {
            Stage::Created => ResponderState::Created,
            Stage::ChallengeConsumed { .. } => ResponderState::ChallengeConsumed,
            Stage::ResponseSent { .. } => ResponderState::ResponseSent,
            Stage::Complete { .. } => ResponderState::Complete,
            Stage::Failed => ResponderState::Failed,
        }
    }
}

/// The participant that answers a handshake
pub struct Responder {
    local: Participant,
    keys: KeyPair,
    stage: Stage,
}

impl Responder {
    /// Wait for a challenge as `local`, which must hold its private key
    pub fn new(local: Participant) -> HandshakeResult<Self> {
        let keys = local
            .key_pair()
            .cloned()
            .ok_or(HandshakeError::MissingPrivateKey)?;
        Ok(Responder {
            local,
            keys,
            stage: Stage::Created,
        })
    }

    /// Current state
    pub fn state(&self) -> ResponderState {
        self.stage.state()
    }

    /// The local participant
    pub fn local_participant(&self) -> &Participant {
        &self.local
    }

    /// The challenger, once its challenge has been accepted
    pub fn remote_participant(&self) -> Option<&Participant> {
        match &self.stage {
            Stage::ChallengeConsumed { remote, .. }
            | Stage::ResponseSent { remote, .. }
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

    /// Round 1: accept a challenge and bind the challenger's key
    pub fn consume_challenge(&mut self, message: &Message) -> HandshakeResult<()> {
        if !matches!(self.stage, Stage::Created) {
            return Err(self.illegal("consume_challenge"));
        }
        self.stage = Stage::Failed;

        match self.accept_challenge(message) {
            Ok((remote_key, remote_nonce)) => {
                let remote = Participant::peer(remote_key);
                debug!(remote = %remote, "handshake challenge accepted");
                self.stage = Stage::ChallengeConsumed {
                    remote,
                    remote_nonce,
                };
                Ok(())
            }
            Err(rejection) => {
                warn!(reason = %rejection, "handshake challenge rejected");
                Err(rejection.into())
            }
        }
    }

    fn accept_challenge(&self, message: &Message) -> Result<(PublicKey, Nonce), Rejection> {
        check_incoming(TypeValue::HandshakeChallenge, message, self.keys.public_key())?;

        Ok((public_key_field(message)?, nonce_field(message)?))
    }

    /// Round 2: answer with a fresh nonce and a signature over the transcript
    pub fn produce_response(&mut self) -> HandshakeResult<Message> {
        let (remote, remote_nonce) = match std::mem::replace(&mut self.stage, Stage::Failed) {
            Stage::ChallengeConsumed {
                remote,
                remote_nonce,
            } => (remote, remote_nonce),
            other => {
                self.stage = other;
                return Err(self.illegal("produce_response"));
            }
        };

        let local_nonce = generate_nonce();
        let signature = sign_transcript(&self.keys, &local_nonce, &remote_nonce);
        let message = Message::new(remote.clone(), TypeValue::HandshakeResponse)
            .with_field(
                ContentField::PublicKey,
                self.keys.public_key().as_bytes().to_vec(),
            )
            .with_field(ContentField::Nonce, local_nonce.to_vec())
            .with_field(ContentField::Signature, signature.to_vec());

        debug!(remote = %remote, "handshake response produced");
        self.stage = Stage::ResponseSent {
            remote,
            remote_nonce,
            local_nonce,
        };
        Ok(message)
    }

    /// Round 3: verify the challenger's proof and derive the session key.
    ///
    /// Any failure is terminal.
    pub fn consume_success(&mut self, message: &Message) -> HandshakeResult<()> {
        let (remote, remote_nonce, local_nonce) =
            match std::mem::replace(&mut self.stage, Stage::Failed) {
                Stage::ResponseSent {
                    remote,
                    remote_nonce,
                    local_nonce,
                } => (remote, remote_nonce, local_nonce),
                other => {
                    self.stage = other;
                    return Err(self.illegal("consume_success"));
                }
            };

        match self.verify_success(message, &remote, &remote_nonce, &local_nonce) {
            Ok(()) => {
                let session_key = derive_session_key(&remote_nonce, &local_nonce);
                debug!(remote = %remote, "handshake complete (responder)");
                self.stage = Stage::Complete {
                    remote,
                    session_key,
                };
                Ok(())
            }
            Err(rejection) => {
                warn!(remote = %remote, reason = %rejection, "handshake success rejected");
                Err(rejection.into())
            }
        }
    }

    fn verify_success(
        &self,
        message: &Message,
        remote: &Participant,
        remote_nonce: &Nonce,
        local_nonce: &Nonce,
    ) -> Result<(), Rejection> {
        check_incoming(TypeValue::HandshakeSuccess, message, self.keys.public_key())?;

        if public_key_field(message)? != *remote.public_key() {
            return Err(Rejection::UnexpectedPublicKey);
        }

        verify_transcript(
            remote.public_key(),
            remote_nonce,
            local_nonce,
            signature_field(message)?,
        )
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
    use crate::crypto::Hash;
    use crate::handshake::{Challenger, ChallengerState, NONCE_LENGTH};

    struct Run {
        challenger: Challenger,
        responder: Responder,
        c: Participant,
        r: Participant,
    }

    fn run() -> Run {
        let c = Participant::local_server(KeyPair::generate());
        let r = Participant::local_server(KeyPair::generate());
        Run {
            challenger: Challenger::new(c.clone()).unwrap(),
            responder: Responder::new(r.clone()).unwrap(),
            c,
            r,
        }
    }

    #[test]
    fn full_handshake_agrees_on_key() {
        let Run {
            mut challenger,
            mut responder,
            c,
            r,
        } = run();

        let challenge = challenger.produce_challenge(r.to_remote()).unwrap();
        responder.consume_challenge(&challenge).unwrap();
        let response = responder.produce_response().unwrap();
        challenger.consume_response(&response).unwrap();
        let success = challenger.produce_success().unwrap();
        responder.consume_success(&success).unwrap();

        assert_eq!(challenger.state(), ChallengerState::Complete);
        assert_eq!(responder.state(), ResponderState::Complete);

        let n_c = challenge.field(ContentField::Nonce).unwrap();
        let n_r = response.field(ContentField::Nonce).unwrap();
        let expected = Hash::digest_parts(&[n_c, n_r]);
        assert_eq!(challenger.session_key().unwrap().as_bytes(), &expected);
        assert_eq!(responder.session_key().unwrap(), challenger.session_key().unwrap());

        assert_eq!(responder.remote_participant(), Some(&c.to_remote()));
        assert_eq!(challenger.remote_participant(), Some(&r));
    }

    #[test]
    fn sessions_from_both_sides_share_key() {
        let Run {
            mut challenger,
            mut responder,
            r,
            ..
        } = run();
        let challenge = challenger.produce_challenge(r).unwrap();
        responder.consume_challenge(&challenge).unwrap();
        challenger
            .consume_response(&responder.produce_response().unwrap())
            .unwrap();
        responder
            .consume_success(&challenger.produce_success().unwrap())
            .unwrap();

        let a = challenger.into_session().unwrap();
        let b = responder.into_session().unwrap();
        assert_eq!(a.key(), b.key());
        assert!(a.is_valid() && b.is_valid());
    }

    #[test]
    fn response_shape() {
        let Run {
            mut challenger,
            mut responder,
            c,
            r,
        } = run();
        responder
            .consume_challenge(&challenger.produce_challenge(r.to_remote()).unwrap())
            .unwrap();
        let response = responder.produce_response().unwrap();

        assert_eq!(response.message_type(), Some(TypeValue::HandshakeResponse));
        assert_eq!(response.fields().count(), 4);
        assert_eq!(
            response.field(ContentField::Nonce).map(<[u8]>::len),
            Some(NONCE_LENGTH)
        );
        assert_eq!(
            response.recipient().map(Participant::public_key),
            Some(c.public_key())
        );
    }

    #[test]
    fn challenge_for_someone_else_rejected() {
        let Run {
            mut challenger,
            mut responder,
            ..
        } = run();
        let stranger = Participant::server(*KeyPair::generate().public_key());
        let challenge = challenger.produce_challenge(stranger).unwrap();

        assert_eq!(
            responder.consume_challenge(&challenge).unwrap_err(),
            HandshakeError::Rejected(Rejection::WrongRecipient)
        );
        assert_eq!(responder.state(), ResponderState::Failed);
        assert!(responder.produce_response().unwrap_err().is_sequencing());
    }

    #[test]
    fn challenge_with_extra_field_rejected() {
        let Run {
            mut challenger,
            mut responder,
            r,
            ..
        } = run();
        let challenge = challenger
            .produce_challenge(r.to_remote())
            .unwrap()
            .with_field(ContentField::Payload, b"hi".to_vec());

        assert_eq!(
            responder.consume_challenge(&challenge).unwrap_err(),
            HandshakeError::Rejected(Rejection::Shape("exact-field-set"))
        );
    }

    #[test]
    fn challenge_with_short_nonce_rejected() {
        let Run {
            mut challenger,
            mut responder,
            r,
            ..
        } = run();
        let challenge = challenger
            .produce_challenge(r.to_remote())
            .unwrap()
            .with_field(ContentField::Nonce, vec![3u8; NONCE_LENGTH - 1]);

        assert_eq!(
            responder.consume_challenge(&challenge).unwrap_err(),
            HandshakeError::Rejected(Rejection::Shape("nonce"))
        );
    }

    #[test]
    fn wrong_type_rejected() {
        let Run {
            mut challenger,
            mut responder,
            r,
            ..
        } = run();
        let challenge = challenger
            .produce_challenge(r.to_remote())
            .unwrap()
            .with_field(ContentField::Type, TypeValue::HandshakeSuccess.to_bytes());

        assert_eq!(
            responder.consume_challenge(&challenge).unwrap_err(),
            HandshakeError::Rejected(Rejection::Shape("type"))
        );
    }

    #[test]
    fn challenge_consumed_once() {
        let Run {
            mut challenger,
            mut responder,
            r,
            ..
        } = run();
        let challenge = challenger.produce_challenge(r.to_remote()).unwrap();
        responder.consume_challenge(&challenge).unwrap();

        assert!(responder.consume_challenge(&challenge).unwrap_err().is_sequencing());
        assert_eq!(responder.state(), ResponderState::ChallengeConsumed);
    }

    #[test]
    fn operations_out_of_order() {
        let Run { mut responder, .. } = run();
        assert_eq!(
            responder.produce_response().unwrap_err(),
            HandshakeError::IllegalState {
                operation: "produce_response",
                state: "Created"
            }
        );
        assert!(responder
            .consume_success(&Message::blank())
            .unwrap_err()
            .is_sequencing());
        assert!(responder.session_key().is_err());
        assert!(responder.into_session().is_err());
    }

    /// Responder after round 2 plus the success the challenger produced
    fn up_to_success() -> (Responder, Message, Participant) {
        let Run {
            mut challenger,
            mut responder,
            c,
            r,
        } = run();
        responder
            .consume_challenge(&challenger.produce_challenge(r.to_remote()).unwrap())
            .unwrap();
        challenger
            .consume_response(&responder.produce_response().unwrap())
            .unwrap();
        (responder, challenger.produce_success().unwrap(), c)
    }

    #[test]
    fn tampered_success_signature_rejected() {
        let (mut responder, mut success, _) = up_to_success();
        let mut sig = success.field(ContentField::Signature).unwrap().to_vec();
        sig[10] ^= 0x04;
        success.set_field(ContentField::Signature, sig);

        assert_eq!(
            responder.consume_success(&success).unwrap_err(),
            HandshakeError::Rejected(Rejection::BadSignature)
        );
        assert!(responder.session_key().is_err());
        assert_eq!(responder.state(), ResponderState::Failed);
    }

    #[test]
    fn success_from_other_key_rejected() {
        let (mut responder, success, _) = up_to_success();

        // A valid-looking proof signed by someone who never sent the challenge
        let impostor = KeyPair::generate();
        let forged = success.with_field(
            ContentField::PublicKey,
            impostor.public_key().as_bytes().to_vec(),
        );

        assert_eq!(
            responder.consume_success(&forged).unwrap_err(),
            HandshakeError::Rejected(Rejection::UnexpectedPublicKey)
        );
    }

    #[test]
    fn success_with_nonce_field_rejected() {
        let (mut responder, success, _) = up_to_success();
        let padded = success.with_field(ContentField::Nonce, vec![0u8; NONCE_LENGTH]);

        assert_eq!(
            responder.consume_success(&padded).unwrap_err(),
            HandshakeError::Rejected(Rejection::Shape("exact-field-set"))
        );
    }

    #[test]
    fn responder_needs_private_key() {
        let remote_only = Participant::user(*KeyPair::generate().public_key(), "carol");
        assert!(matches!(
            Responder::new(remote_only),
            Err(HandshakeError::MissingPrivateKey)
        ));
    }
}
