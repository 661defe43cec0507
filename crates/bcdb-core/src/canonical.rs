//! Canonical signing string.
//!
//! The signing string is the exact plaintext a header signature covers.
//! Its layout is byte-exact because the verifier rebuilds it from the
//! advertised header fields:
//!
//! ```text
//! (created): 1700000000
//! (expires): 1700000003
//! (key-id): 42
//! ```
//!
//! Lines are joined by a single `\n` with no trailing newline.

use std::fmt;
use std::str::FromStr;

/// A field that can appear in the signed `headers` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignedField {
    Created,
    Expires,
    KeyId,
}

/// The fields signed by every client header, in signing order.
pub const SIGNED_FIELDS: [SignedField; 3] =
    [SignedField::Created, SignedField::Expires, SignedField::KeyId];

impl SignedField {
    /// The pseudo-header name, e.g. `(created)`.
    pub const fn name(self) -> &'static str {
        match self {
            SignedField::Created => "(created)",
            SignedField::Expires => "(expires)",
            SignedField::KeyId => "(key-id)",
        }
    }
}

impl fmt::Display for SignedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignedField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "(created)" => Ok(SignedField::Created),
            "(expires)" => Ok(SignedField::Expires),
            "(key-id)" => Ok(SignedField::KeyId),
            other => Err(format!("unknown signed field '{other}'")),
        }
    }
}

/// Render a field list as it appears in the `headers` parameter.
pub fn headers_list(fields: &[SignedField]) -> String {
    fields
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the signing string for an arbitrary field order.
pub fn signing_string(fields: &[SignedField], created: u64, expires: u64, key_id: u64) -> String {
    fields
        .iter()
        .map(|field| {
            let value = match field {
                SignedField::Created => created,
                SignedField::Expires => expires,
                SignedField::KeyId => key_id,
            };
            format!("{}: {}", field.name(), value)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the signing string in the canonical [`SIGNED_FIELDS`] order.
pub fn canonical_signing_string(created: u64, expires: u64, key_id: u64) -> String {
    signing_string(&SIGNED_FIELDS, created, expires, key_id)
}
