//! Protocol messages
//!
//! A [`Message`] is a versioned envelope addressed to a [`Participant`],
//! carrying an unordered map of named content fields. Only the envelope
//! codec turns it into bytes; everything else works on this model.

pub mod field;
pub mod validators;

use std::collections::HashMap;

pub use field::{ContentField, TopLevelField, TypeValue, UnknownName};

use crate::participant::Participant;

/// Protocol version every message carries unless overridden
pub const PROTOCOL_VERSION: &str = "1.0";

/// Content map: field name → raw bytes
pub type Content = HashMap<ContentField, Vec<u8>>;

/// A protocol message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    version: String,
    recipient: Option<Participant>,
    content: Content,
}

impl Message {
    /// A message of type `kind` addressed to `recipient`
    pub fn new(recipient: Participant, kind: TypeValue) -> Self {
        Message::blank()
            .with_recipient(recipient)
            .with_field(ContentField::Type, kind.to_bytes())
    }

    /// A message with no recipient and no content
    pub fn blank() -> Self {
        Message {
            version: PROTOCOL_VERSION.to_string(),
            recipient: None,
            content: Content::new(),
        }
    }

    /// Rebuild a message from decoded parts
    pub fn from_parts(version: String, recipient: Option<Participant>, content: Content) -> Self {
        Message {
            version,
            recipient,
            content,
        }
    }

    /// Replace the recipient
    pub fn with_recipient(mut self, recipient: Participant) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Replace the version string
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add or replace a content field (builder form)
    pub fn with_field(mut self, field: ContentField, value: impl Into<Vec<u8>>) -> Self {
        self.set_field(field, value);
        self
    }

    /// Add or replace a content field
    pub fn set_field(&mut self, field: ContentField, value: impl Into<Vec<u8>>) {
        self.content.insert(field, value.into());
    }

    /// Remove a content field, returning its bytes
    pub fn remove_field(&mut self, field: ContentField) -> Option<Vec<u8>> {
        self.content.remove(&field)
    }

    /// Raw bytes of a content field
    pub fn field(&self, field: ContentField) -> Option<&[u8]> {
        self.content.get(&field).map(Vec::as_slice)
    }

    /// Whether the field is present (possibly empty)
    pub fn has_field(&self, field: ContentField) -> bool {
        self.content.contains_key(&field)
    }

    /// Decoded `TYPE` field, if present and known
    pub fn message_type(&self) -> Option<TypeValue> {
        self.field(ContentField::Type).and_then(TypeValue::from_bytes)
    }

    /// Protocol version string
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Recipient, absent only for blank messages
    pub fn recipient(&self) -> Option<&Participant> {
        self.recipient.as_ref()
    }

    /// All content fields
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Names of the present content fields
    pub fn fields(&self) -> impl Iterator<Item = ContentField> + '_ {
        self.content.keys().copied()
    }
}
