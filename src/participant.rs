//! Network participants: servers and users identified by a key pair

use crate::crypto::{KeyPair, PublicKey};

/// What kind of entity a participant is
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParticipantKind {
    /// A server or relay
    Server,
    /// A human user with a username
    User {
        /// Display/login name
        username: String,
    },
    /// Known only by a public key received on the wire
    Peer,
}

/// A network entity identified by an asymmetric key pair.
///
/// The private key is present only for the local entity. Two participants
/// are equal when their public keys (which determine the pair) match,
/// regardless of which side holds the private key. Two users must also
/// share a username, and a server never equals a user. A peer carries no
/// kind of its own and equals any participant with its key.
#[derive(Clone, Debug)]
pub struct Participant {
    public_key: PublicKey,
    key_pair: Option<KeyPair>,
    kind: ParticipantKind,
}

impl Participant {
    /// A remote server known only by its public key
    pub fn server(public_key: PublicKey) -> Self {
        Participant {
            public_key,
            key_pair: None,
            kind: ParticipantKind::Server,
        }
    }

    /// A remote entity known only by a public key it presented
    pub fn peer(public_key: PublicKey) -> Self {
        Participant {
            public_key,
            key_pair: None,
            kind: ParticipantKind::Peer,
        }
    }

    /// A remote user known only by public key and username
    pub fn user(public_key: PublicKey, username: impl Into<String>) -> Self {
        Participant {
            public_key,
            key_pair: None,
            kind: ParticipantKind::User {
                username: username.into(),
            },
        }
    }

    /// The local server, holding its private key
    pub fn local_server(key_pair: KeyPair) -> Self {
        Participant {
            public_key: *key_pair.public_key(),
            key_pair: Some(key_pair),
            kind: ParticipantKind::Server,
        }
    }

    /// The local user, holding its private key
    pub fn local_user(key_pair: KeyPair, username: impl Into<String>) -> Self {
        Participant {
            public_key: *key_pair.public_key(),
            key_pair: Some(key_pair),
            kind: ParticipantKind::User {
                username: username.into(),
            },
        }
    }

    /// Public key, always present
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Full key pair, present only for local participants
    pub fn key_pair(&self) -> Option<&KeyPair> {
        self.key_pair.as_ref()
    }

    /// Whether the private key is held
    pub fn is_local(&self) -> bool {
        self.key_pair.is_some()
    }

    /// Kind of participant
    pub fn kind(&self) -> &ParticipantKind {
        &self.kind
    }

    /// Username for users, `None` for servers
    pub fn username(&self) -> Option<&str> {
        match &self.kind {
            ParticipantKind::User { username } => Some(username),
            ParticipantKind::Server | ParticipantKind::Peer => None,
        }
    }

    /// Same participant without the private key, safe to hand to peers
    pub fn to_remote(&self) -> Self {
        Participant {
            public_key: self.public_key,
            key_pair: None,
            kind: self.kind.clone(),
        }
    }
}

impl PartialEq for Participant {
    fn eq(&self, other: &Self) -> bool {
        use ParticipantKind::*;

        self.public_key == other.public_key
            && match (&self.kind, &other.kind) {
                (User { username: a }, User { username: b }) => a == b,
                (Server, User { .. }) | (User { .. }, Server) => false,
                _ => true,
            }
    }
}

impl Eq for Participant {}

impl std::hash::Hash for Participant {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.public_key.hash(state);
    }
}

impl std::fmt::Display for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = self.public_key.to_hex();
        match &self.kind {
            ParticipantKind::Server => write!(f, "server:{}", &key[..16]),
            ParticipantKind::Peer => write!(f, "peer:{}", &key[..16]),
            ParticipantKind::User { username } => write!(f, "user:{username}@{}", &key[..16]),
        }
    }
}
