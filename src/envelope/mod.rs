//! Envelope codec: [`Message`] ⇄ wire bytes
//!
//! ```text
//! outer CBOR map (plaintext)
//! ├── VERSION        bytes  protocol version, UTF-8
//! ├── RECIPIENT_KEY  bytes  recipient public key, readable by relays
//! └── CONTENT        bytes  sealed box of the inner map
//!
//! inner CBOR map (sealed to RECIPIENT_KEY)
//! └── <content field name>  bytes  one entry per field
//! ```
//!
//! Keys are CBOR text strings holding the exact upper-case field names,
//! values are CBOR byte strings. Content entries are written in field
//! order so the same message always encodes to the same inner map.

use std::collections::HashSet;

use ciborium::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::{sealed, CryptoError, PublicKey};
use crate::message::{Content, ContentField, Message, TopLevelField};
use crate::participant::Participant;

/// Errors raised while packing or unpacking an envelope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackerError {
    /// CBOR encoding or decoding failed
    #[error("CBOR serialization failed: {0}")]
    Serialization(String),

    /// Valid CBOR with the wrong structure
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Sealing or opening the content block failed
    #[error("envelope crypto failed: {0}")]
    Crypto(#[from] CryptoError),

    /// The message to pack has no recipient
    #[error("message has no recipient")]
    MissingRecipient,

    /// The participant unpacking holds no private key
    #[error("local participant has no private key")]
    MissingPrivateKey,

    /// The envelope is addressed to a different key
    #[error("envelope is addressed to another participant")]
    RecipientMismatch,
}

/// Result type for envelope operations
pub type PackerResult<T> = Result<T, PackerError>;

/// Serialize `message` and seal its content to the recipient's key
pub fn pack_encrypt(message: &Message) -> PackerResult<Vec<u8>> {
    let recipient = message.recipient().ok_or(PackerError::MissingRecipient)?;

    let mut fields: Vec<_> = message.content().iter().collect();
    fields.sort_by_key(|(field, _)| **field);
    let inner = encode_map(
        fields
            .into_iter()
            .map(|(field, value)| (field.as_str(), value.clone()))
            .collect(),
    )?;
    let sealed = sealed::seal(recipient.public_key(), &inner)?;

    let outer = encode_map(vec![
        (
            TopLevelField::Version.as_str(),
            message.version().as_bytes().to_vec(),
        ),
        (
            TopLevelField::RecipientKey.as_str(),
            recipient.public_key().as_bytes().to_vec(),
        ),
        (TopLevelField::Content.as_str(), sealed),
    ])?;

    debug!(
        kind = ?message.message_type(),
        recipient = %recipient,
        bytes = outer.len(),
        "envelope packed"
    );
    Ok(outer)
}

/// Open an envelope addressed to `local` and rebuild the message.
///
/// The returned message's recipient is `local` without its private key.
pub fn decrypt_unpack(bytes: &[u8], local: &Participant) -> PackerResult<Message> {
    let keys = local.key_pair().ok_or(PackerError::MissingPrivateKey)?;
    let outer = Outer::decode(bytes)?;

    if outer.recipient_key != local.public_key().as_bytes()[..] {
        warn!(local = %local, "envelope addressed to another participant");
        return Err(PackerError::RecipientMismatch);
    }

    let version = String::from_utf8(outer.version)
        .map_err(|_| PackerError::Malformed("version is not UTF-8".into()))?;

    let inner = sealed::open(keys, &outer.content)?;
    let mut content = Content::new();
    for (name, value) in decode_map(&inner)? {
        let field: ContentField = name
            .parse()
            .map_err(|e| PackerError::Malformed(format!("{e}")))?;
        content.insert(field, value);
    }

    let message = Message::from_parts(version, Some(local.to_remote()), content);
    debug!(kind = ?message.message_type(), "envelope unpacked");
    Ok(message)
}

/// Read the plaintext recipient key without opening the content
pub fn peek_recipient(bytes: &[u8]) -> PackerResult<PublicKey> {
    let outer = Outer::decode(bytes)?;
    PublicKey::from_bytes(&outer.recipient_key)
        .map_err(|_| PackerError::Malformed("recipient key is not a valid public key".into()))
}

struct Outer {
    version: Vec<u8>,
    recipient_key: Vec<u8>,
    content: Vec<u8>,
}

impl Outer {
    fn decode(bytes: &[u8]) -> PackerResult<Self> {
        let mut version = None;
        let mut recipient_key = None;
        let mut content = None;

        for (name, value) in decode_map(bytes)? {
            let field: TopLevelField = name
                .parse()
                .map_err(|e| PackerError::Malformed(format!("{e}")))?;
            let slot = match field {
                TopLevelField::Version => &mut version,
                TopLevelField::RecipientKey => &mut recipient_key,
                TopLevelField::Content => &mut content,
            };
            *slot = Some(value);
        }

        let missing = |field: TopLevelField| PackerError::Malformed(format!("missing {field}"));
        Ok(Outer {
            version: version.ok_or_else(|| missing(TopLevelField::Version))?,
            recipient_key: recipient_key.ok_or_else(|| missing(TopLevelField::RecipientKey))?,
            content: content.ok_or_else(|| missing(TopLevelField::Content))?,
        })
    }
}

fn encode_map(entries: Vec<(&str, Vec<u8>)>) -> PackerResult<Vec<u8>> {
    let map = Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Value::Text(k.to_string()), Value::Bytes(v)))
            .collect(),
    );

    let mut buf = Vec::new();
    ciborium::into_writer(&map, &mut buf)
        .map_err(|e| PackerError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Decode a map of text keys to byte values, rejecting duplicate keys
fn decode_map(bytes: &[u8]) -> PackerResult<Vec<(String, Vec<u8>)>> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| PackerError::Serialization(e.to_string()))?;

    let entries = match value {
        Value::Map(entries) => entries,
        _ => return Err(PackerError::Malformed("expected a CBOR map".into())),
    };

    let mut seen = HashSet::with_capacity(entries.len());
    let mut out = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let key = match key {
            Value::Text(key) => key,
            _ => return Err(PackerError::Malformed("map key is not text".into())),
        };
        let value = match value {
            Value::Bytes(value) => value,
            _ => return Err(PackerError::Malformed(format!("{key} is not a byte string"))),
        };
        if !seen.insert(key.clone()) {
            return Err(PackerError::Malformed(format!("duplicate key {key}")));
        }
        out.push((key, value));
    }
    Ok(out)
}
