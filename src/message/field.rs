//! Closed vocabularies for envelope keys, content fields and message types

use std::fmt;
use std::str::FromStr;

/// The value named is not part of the vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} name: {name:?}")]
pub struct UnknownName {
    /// Which vocabulary was searched
    pub kind: &'static str,
    /// The rejected name
    pub name: String,
}

macro_rules! wire_names {
    (
        $(#[$meta:meta])*
        $ty:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $name:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $ty {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $ty {
            /// Every member, in declaration order
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Exact upper-case wire name
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $ty::$variant => $name ),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = UnknownName;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $name => Ok($ty::$variant), )+
                    other => Err(UnknownName {
                        kind: $kind,
                        name: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_names! {
    /// Keys of the outer (plaintext) envelope map
    TopLevelField, "top-level field" {
        /// Protocol version string
        Version => "VERSION",
        /// Recipient's public key, left readable for routing
        RecipientKey => "RECIPIENT_KEY",
        /// Sealed inner content map
        Content => "CONTENT",
    }
}

wire_names! {
    /// Keys of the inner (encrypted) content map
    ContentField, "content field" {
        /// Message type, one of [`TypeValue`]
        Type => "TYPE",
        /// Sender's public key
        PublicKey => "PUBLIC_KEY",
        /// Handshake nonce
        Nonce => "NONCE",
        /// Handshake signature
        Signature => "SIGNATURE",
        /// Session key being torn down
        SessionKey => "SESSION_KEY",
        /// Forwarded application payload
        Payload => "PAYLOAD",
    }
}

wire_names! {
    /// Values the `TYPE` content field may take
    TypeValue, "message type" {
        /// Round 1: challenger → responder
        HandshakeChallenge => "HANDSHAKE_CHALLENGE",
        /// Round 2: responder → challenger
        HandshakeResponse => "HANDSHAKE_RESPONSE",
        /// Round 3: challenger → responder
        HandshakeSuccess => "HANDSHAKE_SUCCESS",
        /// Tear down an established session
        HandshakeInvalidate => "HANDSHAKE_INVALIDATE",
        /// Application payload
        Forward => "FORWARD",
    }
}

impl TypeValue {
    /// The four handshake message types
    pub const HANDSHAKE: &'static [TypeValue] = &[
        TypeValue::HandshakeChallenge,
        TypeValue::HandshakeResponse,
        TypeValue::HandshakeSuccess,
        TypeValue::HandshakeInvalidate,
    ];

    /// Decode the raw bytes of a `TYPE` field
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        std::str::from_utf8(bytes).ok()?.parse().ok()
    }

    /// Encoded form stored in the `TYPE` field
    pub fn to_bytes(self) -> Vec<u8> {
        self.as_str().as_bytes().to_vec()
    }
}
