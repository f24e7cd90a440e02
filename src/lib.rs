//! # Parley
//!
//! Protocol core for participant-to-participant secure messaging.
//!
//! ## Features
//!
//! - **Mutual authentication** through a three-round signed challenge/response
//! - **Sealed envelopes**: content encrypted to the recipient's key, routing key in the clear
//! - **Shape validation** of every incoming message before it is trusted
//! - **Pluggable carrier** for moving envelope bytes (in-memory hub included)
//!
//! ## Quick Start
//!
//! ```rust
//! use parley::{Challenger, KeyPair, Participant, Responder};
//!
//! let server = Participant::local_server(KeyPair::generate());
//! let client = Participant::local_user(KeyPair::generate(), "alice");
//!
//! let mut challenger = Challenger::new(client).unwrap();
//! let mut responder = Responder::new(server.clone()).unwrap();
//!
//! let challenge = challenger.produce_challenge(server.to_remote()).unwrap();
//! responder.consume_challenge(&challenge).unwrap();
//! let response = responder.produce_response().unwrap();
//! challenger.consume_response(&response).unwrap();
//! let success = challenger.produce_success().unwrap();
//! responder.consume_success(&success).unwrap();
//!
//! assert_eq!(challenger.session_key().unwrap(), responder.session_key().unwrap());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        DISPATCH  (validators → handler)     │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │              PROTOCOL LAYER                 │
//! │  Handshake | Session | Message | Validators │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │        ENVELOPE  (CBOR + sealed box)        │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │               CRYPTO LAYER                  │
//! │ Ed25519 | X25519 | ChaCha20-Poly1305 | SHA-256 | Argon2id
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │         CARRIER  (memory | external)        │
//! └─────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod envelope;
pub mod handshake;
pub mod message;
pub mod participant;
pub mod session;
pub mod transport;

// Re-export main types at crate root
pub use config::{ConfigError, CoreConfig};
pub use crypto::{CryptoError, CryptoResult, KeyPair, PublicKey, SignatureBytes};
pub use dispatch::{DispatchError, Dispatcher, MessageHandler, ResponderService};
pub use envelope::{decrypt_unpack, pack_encrypt, peek_recipient, PackerError, PackerResult};
pub use handshake::{
    Challenger, ChallengerState, HandshakeError, HandshakeResult, Rejection, Responder,
    ResponderState,
};
pub use message::{ContentField, Message, TypeValue, PROTOCOL_VERSION};
pub use participant::{Participant, ParticipantKind};
pub use session::{Session, SessionKey};
pub use transport::{Carrier, CarrierError, CarrierResult};
