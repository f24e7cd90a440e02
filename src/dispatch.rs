//! Routing of decoded messages to handlers
//!
//! A [`Dispatcher`] runs the standard validator chain for a message's
//! type and only then hands it to a [`MessageHandler`]. Frames arriving
//! from a carrier go through [`Dispatcher::dispatch_frame`], which also
//! opens the envelope and seals any reply.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::crypto::PublicKey;
use crate::envelope::{decrypt_unpack, pack_encrypt, PackerError};
use crate::handshake::{HandshakeError, Responder};
use crate::message::validators::first_failure_boxed;
use crate::message::{ContentField, Message, TypeValue};
use crate::participant::Participant;
use crate::session::Session;

pub use crate::message::validators::validators_for;

/// Errors raised while dispatching a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// `TYPE` is missing or not a known type value
    #[error("message has no known type")]
    UnknownType,

    /// A validator in the type's chain rejected the message
    #[error("message rejected by {validator} validator")]
    Rejected {
        /// Name of the first failing validator
        validator: &'static str,
    },

    /// The handshake step behind the handler failed
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// The frame could not be unpacked or the reply packed
    #[error(transparent)]
    Packer(#[from] PackerError),
}

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Business logic for messages that passed validation
pub trait MessageHandler: Send {
    /// Handle a validated message of type `kind`, optionally replying
    fn handle(&mut self, kind: TypeValue, message: Message) -> DispatchResult<Option<Message>>;
}

/// Validates incoming messages and delegates them to `H`
pub struct Dispatcher<H> {
    local: Participant,
    handler: H,
}

impl<H: MessageHandler> Dispatcher<H> {
    /// Dispatch on behalf of `local`, which must hold its private key to
    /// open frames
    pub fn new(local: Participant, handler: H) -> Self {
        Dispatcher { local, handler }
    }

    /// The participant frames are opened for
    pub fn local(&self) -> &Participant {
        &self.local
    }

    /// Shared access to the handler
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Exclusive access to the handler
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Validate `message` and pass it to the handler
    pub fn dispatch(&mut self, message: Message) -> DispatchResult<Option<Message>> {
        let kind = message.message_type().ok_or(DispatchError::UnknownType)?;

        if let Some(validator) = first_failure_boxed(&validators_for(kind), &message) {
            warn!(%kind, validator, "message rejected");
            return Err(DispatchError::Rejected { validator });
        }

        debug!(%kind, "dispatching message");
        self.handler.handle(kind, message)
    }

    /// Open `frame`, dispatch it and seal the reply, if any
    pub fn dispatch_frame(&mut self, frame: &[u8]) -> DispatchResult<Option<Vec<u8>>> {
        let message = decrypt_unpack(frame, &self.local)?;
        match self.dispatch(message)? {
            Some(reply) => Ok(Some(pack_encrypt(&reply)?)),
            None => Ok(None),
        }
    }
}

/// Answering side of the protocol: runs [`Responder`]s, keeps the
/// resulting sessions, honours invalidation and collects forwarded
/// payloads.
///
/// Every call to [`handle`](MessageHandler::handle) first drops sessions
/// idle past the configured limit and answered challenges older than the
/// handshake timeout.
pub struct ResponderService {
    local: Participant,
    pending: HashMap<PublicKey, Pending>,
    sessions: HashMap<PublicKey, Session>,
    inbox: Vec<Vec<u8>>,
    max_idle: Duration,
    handshake_timeout: Duration,
    max_pending: usize,
}

struct Pending {
    responder: Responder,
    started: Instant,
}

impl ResponderService {
    /// Serve handshakes as `local` with default limits
    pub fn new(local: Participant) -> Self {
        Self::with_config(local, &CoreConfig::default())
    }

    /// Serve handshakes as `local` with the limits in `config`
    pub fn with_config(local: Participant, config: &CoreConfig) -> Self {
        ResponderService {
            local,
            pending: HashMap::new(),
            sessions: HashMap::new(),
            inbox: Vec::new(),
            max_idle: config.session_max_idle(),
            handshake_timeout: config.handshake_timeout(),
            max_pending: config.max_pending_handshakes,
        }
    }

    /// Established session with the holder of `key`
    pub fn session(&self, key: &PublicKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    /// Number of established sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of answered challenges awaiting their success message
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drain payloads received in `FORWARD` messages
    pub fn take_inbox(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.inbox)
    }

    /// Drop idle sessions and stale handshakes
    pub fn prune(&mut self) {
        let max_idle = self.max_idle;
        self.sessions.retain(|_, session| {
            if session.is_expired(max_idle) {
                session.invalidate();
                return false;
            }
            true
        });

        let timeout = self.handshake_timeout;
        let before = self.pending.len();
        self.pending.retain(|_, p| p.started.elapsed() <= timeout);
        if self.pending.len() < before {
            debug!(dropped = before - self.pending.len(), "stale handshakes dropped");
        }
    }

    fn sender_key(message: &Message) -> DispatchResult<PublicKey> {
        message
            .field(ContentField::PublicKey)
            .and_then(|bytes| PublicKey::from_bytes(bytes).ok())
            .ok_or(DispatchError::Rejected {
                validator: "public-key",
            })
    }

    fn answer_challenge(&mut self, message: Message) -> DispatchResult<Option<Message>> {
        let sender = Self::sender_key(&message)?;

        // The key in a challenge is unauthenticated until round 3, so an
        // in-flight handshake for it is never replaced.
        if self.pending.contains_key(&sender) {
            warn!(sender = %sender, "challenge for a key already in flight");
            return Err(DispatchError::Rejected {
                validator: "pending-handshake",
            });
        }
        if self.pending.len() >= self.max_pending {
            warn!(limit = self.max_pending, "too many handshakes in flight");
            return Err(DispatchError::Rejected {
                validator: "handshake-capacity",
            });
        }

        let mut responder = Responder::new(self.local.clone())?;
        responder.consume_challenge(&message)?;
        let reply = responder.produce_response()?;
        self.pending.insert(
            sender,
            Pending {
                responder,
                started: Instant::now(),
            },
        );
        Ok(Some(reply))
    }

    fn complete_handshake(&mut self, message: Message) -> DispatchResult<Option<Message>> {
        let sender = Self::sender_key(&message)?;
        let Pending { mut responder, .. } = self.pending.remove(&sender).ok_or_else(|| {
            warn!(sender = %sender, "success without a pending handshake");
            DispatchError::Rejected {
                validator: "session",
            }
        })?;

        responder.consume_success(&message)?;
        let session = responder.into_session()?;
        info!(remote = %session_remote(&session), "session established");
        self.sessions.insert(sender, session);
        Ok(None)
    }
}

impl MessageHandler for ResponderService {
    fn handle(&mut self, kind: TypeValue, message: Message) -> DispatchResult<Option<Message>> {
        self.prune();

        match kind {
            TypeValue::HandshakeChallenge => self.answer_challenge(message),
            TypeValue::HandshakeSuccess => self.complete_handshake(message),
            TypeValue::HandshakeInvalidate => {
                let presented = message.field(ContentField::SessionKey).unwrap_or_default();
                let matched = self
                    .sessions
                    .iter()
                    .find(|(_, s)| s.matches_key(presented))
                    .map(|(k, _)| *k);
                match matched.and_then(|k| self.sessions.remove(&k)) {
                    Some(mut session) => session.invalidate(),
                    None => debug!("invalidate for unknown session ignored"),
                }
                Ok(None)
            }
            TypeValue::Forward => {
                if let Some(payload) = message.field(ContentField::Payload) {
                    self.inbox.push(payload.to_vec());
                }
                Ok(None)
            }
            TypeValue::HandshakeResponse => Err(DispatchError::Rejected { validator: "type" }),
        }
    }
}

fn session_remote(session: &Session) -> String {
    session
        .remote_participant()
        .map(ToString::to_string)
        .unwrap_or_default()
}
