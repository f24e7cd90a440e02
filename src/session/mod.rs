//! Established sessions
//!
//! A [`Session`] is created once a handshake completes and is owned by
//! the layer above this crate. Invalidation wipes the key in place.

use std::time::{Duration, Instant};

use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{constant_time_eq, DIGEST_SIZE};
use crate::participant::Participant;

/// Size of a negotiated session key in bytes (one SHA-256 output)
pub const SESSION_KEY_SIZE: usize = DIGEST_SIZE;

/// Symmetric key both sides derive from the handshake nonces.
///
/// Zeroized on drop. `Debug` never prints the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Wrap raw key bytes
    pub fn new(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        SessionKey(bytes)
    }

    /// Parse a key received in a `SESSION_KEY` field
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; SESSION_KEY_SIZE] = bytes.try_into().ok()?;
        Some(SessionKey(arr))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.0, &other.0)
    }
}

impl Eq for SessionKey {}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Negotiated relationship with one remote participant
pub struct Session {
    remote_participant: Option<Participant>,
    key: SessionKey,
    last_interaction_time: Instant,
}

impl Session {
    /// Start a session with `remote` under `key`
    pub fn new(remote: Participant, key: SessionKey) -> Self {
        Session {
            remote_participant: Some(remote),
            key,
            last_interaction_time: Instant::now(),
        }
    }

    /// The peer, `None` once invalidated
    pub fn remote_participant(&self) -> Option<&Participant> {
        self.remote_participant.as_ref()
    }

    /// The session key, `None` once invalidated
    pub fn key(&self) -> Option<&SessionKey> {
        self.is_valid().then_some(&self.key)
    }

    /// Whether [`invalidate`](Self::invalidate) has not been called
    pub fn is_valid(&self) -> bool {
        self.remote_participant.is_some()
    }

    /// Record activity now
    pub fn touch(&mut self) {
        self.last_interaction_time = Instant::now();
    }

    /// When the session was last used
    pub fn last_interaction_time(&self) -> Instant {
        self.last_interaction_time
    }

    /// Time since the last recorded activity
    pub fn idle_for(&self) -> Duration {
        self.last_interaction_time.elapsed()
    }

    /// Whether the session has been idle longer than `max_idle`
    pub fn is_expired(&self, max_idle: Duration) -> bool {
        self.idle_for() > max_idle
    }

    /// Constant-time check of a key presented by a peer, e.g. in an
    /// invalidate message. Always false once invalidated.
    pub fn matches_key(&self, candidate: &[u8]) -> bool {
        self.is_valid() && constant_time_eq(self.key.as_bytes(), candidate)
    }

    /// Irrecoverably wipe the key and drop the peer reference.
    ///
    /// Safe to call more than once.
    pub fn invalidate(&mut self) {
        if let Some(remote) = self.remote_participant.take() {
            debug!(remote = %remote, "session invalidated");
        }
        self.key.zeroize();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("remote_participant", &self.remote_participant)
            .field("key", &self.key)
            .field("last_interaction_time", &self.last_interaction_time)
            .finish()
    }
}
