//! Shape checks applied to incoming messages before they are trusted
//!
//! Each validator is a pure predicate over one concern. Validators never
//! check cryptographic correctness; signature verification belongs to the
//! handshake.

use super::{ContentField, Message, TypeValue, PROTOCOL_VERSION};
use crate::crypto::PublicKey;
use crate::handshake::{NONCE_LENGTH, SIGNATURE_MAX_LENGTH, SIGNATURE_MIN_LENGTH};

/// A shape predicate over a [`Message`]
pub trait Validator: Send + Sync {
    /// Short name reported when this check fails
    fn name(&self) -> &'static str;

    /// Whether `message` passes this check
    fn is_valid(&self, message: &Message) -> bool;
}

/// Name of the first validator in `chain` that rejects `message`
pub fn first_failure(chain: &[&dyn Validator], message: &Message) -> Option<&'static str> {
    chain
        .iter()
        .find(|v| !v.is_valid(message))
        .map(|v| v.name())
}

/// Boxed-chain form of [`first_failure`]
pub fn first_failure_boxed(
    chain: &[Box<dyn Validator>],
    message: &Message,
) -> Option<&'static str> {
    chain
        .iter()
        .find(|v| !v.is_valid(message))
        .map(|v| v.name())
}

/// Version string equals the expected protocol version
#[derive(Debug, Clone)]
pub struct VersionValidator {
    expected: String,
}

impl VersionValidator {
    /// Expect a specific version
    pub fn new(expected: impl Into<String>) -> Self {
        VersionValidator {
            expected: expected.into(),
        }
    }
}

impl Default for VersionValidator {
    fn default() -> Self {
        Self::new(PROTOCOL_VERSION)
    }
}

impl Validator for VersionValidator {
    fn name(&self) -> &'static str {
        "version"
    }

    fn is_valid(&self, message: &Message) -> bool {
        message.version() == self.expected
    }
}

/// A recipient is present
#[derive(Debug, Clone, Copy, Default)]
pub struct RecipientValidator;

impl Validator for RecipientValidator {
    fn name(&self) -> &'static str {
        "recipient"
    }

    fn is_valid(&self, message: &Message) -> bool {
        message.recipient().is_some()
    }
}

/// Every listed field is present and non-empty; if `exact`, nothing else is
#[derive(Debug, Clone)]
pub struct FieldSetValidator {
    fields: Vec<ContentField>,
    exact: bool,
}

impl FieldSetValidator {
    /// Require at least these fields
    pub fn at_least(fields: &[ContentField]) -> Self {
        FieldSetValidator {
            fields: fields.to_vec(),
            exact: false,
        }
    }

    /// Require exactly these fields
    pub fn exactly(fields: &[ContentField]) -> Self {
        FieldSetValidator {
            fields: fields.to_vec(),
            exact: true,
        }
    }
}

impl Validator for FieldSetValidator {
    fn name(&self) -> &'static str {
        if self.exact {
            "exact-field-set"
        } else {
            "field-set"
        }
    }

    fn is_valid(&self, message: &Message) -> bool {
        let all_present = self
            .fields
            .iter()
            .all(|f| message.field(*f).is_some_and(|v| !v.is_empty()));
        if !all_present {
            return false;
        }
        !self.exact || message.fields().all(|f| self.fields.contains(&f))
    }
}

/// Nonce field present with an exact length
#[derive(Debug, Clone, Copy)]
pub struct NonceValidator {
    field: ContentField,
    length: usize,
}

impl NonceValidator {
    /// Check `field` has exactly `length` bytes
    pub fn new(field: ContentField, length: usize) -> Self {
        NonceValidator { field, length }
    }
}

impl Default for NonceValidator {
    fn default() -> Self {
        Self::new(ContentField::Nonce, NONCE_LENGTH)
    }
}

impl Validator for NonceValidator {
    fn name(&self) -> &'static str {
        "nonce"
    }

    fn is_valid(&self, message: &Message) -> bool {
        message
            .field(self.field)
            .is_some_and(|v| v.len() == self.length)
    }
}

/// Signature field present with a length inside `[min, max]`
#[derive(Debug, Clone, Copy)]
pub struct SignatureValidator {
    field: ContentField,
    min: usize,
    max: usize,
}

impl SignatureValidator {
    /// Check `field` length is within `min..=max`
    pub fn new(field: ContentField, min: usize, max: usize) -> Self {
        SignatureValidator { field, min, max }
    }
}

impl Default for SignatureValidator {
    fn default() -> Self {
        Self::new(
            ContentField::Signature,
            SIGNATURE_MIN_LENGTH,
            SIGNATURE_MAX_LENGTH,
        )
    }
}

impl Validator for SignatureValidator {
    fn name(&self) -> &'static str {
        "signature"
    }

    fn is_valid(&self, message: &Message) -> bool {
        message
            .field(self.field)
            .is_some_and(|v| (self.min..=self.max).contains(&v.len()))
    }
}

/// Public-key field present and decodable as a key on the signature curve
#[derive(Debug, Clone, Copy)]
pub struct PublicKeyValidator {
    field: ContentField,
}

impl PublicKeyValidator {
    /// Check the key stored in `field`
    pub fn new(field: ContentField) -> Self {
        PublicKeyValidator { field }
    }
}

impl Default for PublicKeyValidator {
    fn default() -> Self {
        Self::new(ContentField::PublicKey)
    }
}

impl Validator for PublicKeyValidator {
    fn name(&self) -> &'static str {
        "public-key"
    }

    fn is_valid(&self, message: &Message) -> bool {
        message
            .field(self.field)
            .is_some_and(|v| !v.is_empty() && PublicKey::is_valid_encoding(v))
    }
}

/// `TYPE` decodes to one of an allowed subset
#[derive(Debug, Clone)]
pub struct TypeValidator {
    allowed: Vec<TypeValue>,
}

impl TypeValidator {
    /// Allow any of `allowed`
    pub fn any_of(allowed: &[TypeValue]) -> Self {
        TypeValidator {
            allowed: allowed.to_vec(),
        }
    }

    /// Allow exactly one type
    pub fn only(kind: TypeValue) -> Self {
        Self::any_of(&[kind])
    }

    /// Allow the four handshake types
    pub fn handshake() -> Self {
        Self::any_of(TypeValue::HANDSHAKE)
    }
}

impl Validator for TypeValidator {
    fn name(&self) -> &'static str {
        "type"
    }

    fn is_valid(&self, message: &Message) -> bool {
        message
            .message_type()
            .is_some_and(|t| self.allowed.contains(&t))
    }
}

/// Standard chain for an incoming message of type `kind`.
///
/// Every chain checks version, recipient presence, the type itself and
/// the exact field set for that type, followed by per-field shape checks.
pub fn validators_for(kind: TypeValue) -> Vec<Box<dyn Validator>> {
    use ContentField as F;

    let mut chain: Vec<Box<dyn Validator>> = vec![
        Box::new(VersionValidator::default()),
        Box::new(RecipientValidator),
        Box::new(TypeValidator::only(kind)),
    ];
    match kind {
        TypeValue::HandshakeChallenge => {
            chain.push(Box::new(FieldSetValidator::exactly(&[F::Type, F::PublicKey, F::Nonce])));
            chain.push(Box::new(PublicKeyValidator::default()));
            chain.push(Box::new(NonceValidator::default()));
        }
        TypeValue::HandshakeResponse => {
            chain.push(Box::new(FieldSetValidator::exactly(&[
                F::Type, F::PublicKey, F::Nonce, F::Signature,
            ])));
            chain.push(Box::new(PublicKeyValidator::default()));
            chain.push(Box::new(NonceValidator::default()));
            chain.push(Box::new(SignatureValidator::default()));
        }
        TypeValue::HandshakeSuccess => {
            chain.push(Box::new(FieldSetValidator::exactly(&[
                F::Type, F::PublicKey, F::Signature,
            ])));
            chain.push(Box::new(PublicKeyValidator::default()));
            chain.push(Box::new(SignatureValidator::default()));
        }
        TypeValue::HandshakeInvalidate => {
            chain.push(Box::new(FieldSetValidator::exactly(&[F::Type, F::SessionKey])));
        }
        TypeValue::Forward => {
            chain.push(Box::new(FieldSetValidator::exactly(&[F::Type, F::Payload])));
        }
    }
    chain
}
