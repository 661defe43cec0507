//! Signed authorization headers.
//!
//! A header asserts "key `keyId` vouches for this call between `created` and
//! `expires`". It is built per request, never persisted, and rendered as:
//!
//! ```text
//! Signature keyId="42",algorithm="hs2019",created="1700000000",expires="1700000003",headers="(created) (expires) (key-id)",signature="<base64>"
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_signing_string, headers_list, SignedField, SIGNED_FIELDS};
use crate::crypto::Ed25519Signature;
use crate::error::{ValidationError, VerifyError};
use crate::identity::{Identity, KeyId};

/// Algorithm identifier advertised in every header.
pub const ALGORITHM: &str = "hs2019";

/// Credential scheme prefix.
pub const SCHEME: &str = "Signature";

/// Current time in seconds since the unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// How long a header stays valid after it is created.
///
/// Always positive. There is deliberately no default: callers pick the
/// window explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u64")]
pub struct ValidityWindow(u64);

impl ValidityWindow {
    /// Create a window of `secs` seconds. Zero or negative is rejected.
    pub fn from_secs(secs: i64) -> Result<Self, ValidationError> {
        if secs <= 0 {
            return Err(ValidationError::InvalidValidityWindow(secs));
        }
        Ok(Self(secs as u64))
    }

    /// The window length in seconds.
    pub const fn as_secs(&self) -> u64 {
        self.0
    }
}

impl TryFrom<i64> for ValidityWindow {
    type Error = ValidationError;

    fn try_from(secs: i64) -> Result<Self, Self::Error> {
        Self::from_secs(secs)
    }
}

impl From<ValidityWindow> for u64 {
    fn from(window: ValidityWindow) -> Self {
        window.0
    }
}

/// A signed header for one logical request.
///
/// Invariant: `expires - created` equals the validity window it was built
/// with, so `expires > created`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub key_id: KeyId,
    pub created: u64,
    pub expires: u64,
    pub signature: Ed25519Signature,
}

impl AuthHeader {
    /// The canonical string this header's signature covers.
    pub fn signing_string(&self) -> String {
        canonical_signing_string(self.created, self.expires, self.key_id)
    }

    /// True once the header may no longer be sent.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires
    }

    /// Render the header value for the `authorization` header.
    pub fn render(&self) -> String {
        format!(
            r#"{SCHEME} keyId="{}",algorithm="{ALGORITHM}",created="{}",expires="{}",headers="{}",signature="{}""#,
            self.key_id,
            self.created,
            self.expires,
            headers_list(&SIGNED_FIELDS),
            self.signature.to_base64(),
        )
    }
}

impl fmt::Display for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Builds signed headers for an identity.
///
/// Building is a pure function of the identity, the clock and the window.
#[derive(Debug, Clone, Copy)]
pub struct AuthHeaderBuilder<'a> {
    identity: &'a Identity,
    validity: ValidityWindow,
}

impl<'a> AuthHeaderBuilder<'a> {
    pub fn new(identity: &'a Identity, validity: ValidityWindow) -> Self {
        Self { identity, validity }
    }

    /// Build a header valid from now.
    pub fn build(&self) -> AuthHeader {
        self.build_at(unix_now())
    }

    /// Build a header as if the current time were `now`.
    pub fn build_at(&self, now: u64) -> AuthHeader {
        let created = now;
        let expires = created.saturating_add(self.validity.as_secs());
        let key_id = self.identity.id();

        let message = canonical_signing_string(created, expires, key_id);
        let signature = self.identity.sign(message.as_bytes());

        AuthHeader {
            key_id,
            created,
            expires,
            signature,
        }
    }
}

/// A header value parsed from the wire, not yet verified.
///
/// Parsing is strict: unknown or duplicate parameters, missing parameters,
/// and unknown signed fields are all rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub key_id: KeyId,
    pub algorithm: String,
    pub created: u64,
    pub expires: u64,
    /// Signed fields in the advertised order.
    pub headers: Vec<SignedField>,
    pub signature: Ed25519Signature,
}

impl FromStr for Credential {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |msg: &str| VerifyError::Malformed(msg.to_string());

        let rest = s
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix(' '))
            .ok_or_else(|| malformed("header must start with 'Signature '"))?;

        let params = parse_params(rest)?;

        let mut key_id = None;
        let mut algorithm = None;
        let mut created = None;
        let mut expires = None;
        let mut headers = None;
        let mut signature = None;

        for (name, value) in params {
            let slot = match name {
                "keyId" => &mut key_id,
                "algorithm" => &mut algorithm,
                "created" => &mut created,
                "expires" => &mut expires,
                "headers" => &mut headers,
                "signature" => &mut signature,
                other => return Err(VerifyError::Malformed(format!("unknown parameter '{other}'"))),
            };
            if slot.replace(value).is_some() {
                return Err(VerifyError::Malformed(format!("duplicate parameter '{name}'")));
            }
        }

        let number = |value: &str, name: &str| {
            value
                .parse::<u64>()
                .map_err(|_| VerifyError::Malformed(format!("parameter '{name}' is not a number")))
        };

        let key_id = number(require(key_id, "keyId")?, "keyId")?;
        let algorithm = require(algorithm, "algorithm")?.to_string();
        let created = number(require(created, "created")?, "created")?;
        let expires = number(require(expires, "expires")?, "expires")?;
        let headers = parse_headers(require(headers, "headers")?)?;
        let signature = Ed25519Signature::from_base64(require(signature, "signature")?)?;

        if algorithm != ALGORITHM {
            return Err(VerifyError::Malformed(format!("unsupported algorithm '{algorithm}'")));
        }
        if expires <= created {
            return Err(malformed("expires must be after created"));
        }

        Ok(Self {
            key_id,
            algorithm,
            created,
            expires,
            headers,
            signature,
        })
    }
}

fn require<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, VerifyError> {
    value.ok_or_else(|| VerifyError::Malformed(format!("missing parameter '{name}'")))
}

/// Split `a="1",b="2"` into name/value pairs.
fn parse_params(input: &str) -> Result<Vec<(&str, &str)>, VerifyError> {
    let mut params = Vec::new();
    let mut rest = input.trim_start();

    loop {
        let eq = rest
            .find('=')
            .ok_or_else(|| VerifyError::Malformed("expected name=\"value\"".into()))?;
        let name = rest[..eq].trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(VerifyError::Malformed(format!("invalid parameter name '{name}'")));
        }

        let after = rest[eq + 1..]
            .strip_prefix('"')
            .ok_or_else(|| VerifyError::Malformed(format!("value of '{name}' must be quoted")))?;
        let close = after
            .find('"')
            .ok_or_else(|| VerifyError::Malformed(format!("unterminated value for '{name}'")))?;
        params.push((name, &after[..close]));

        rest = after[close + 1..].trim_start();
        if rest.is_empty() {
            return Ok(params);
        }
        rest = rest
            .strip_prefix(',')
            .ok_or_else(|| VerifyError::Malformed("expected ',' between parameters".into()))?
            .trim_start();
    }
}

/// Parse the advertised field list. Every client field must appear exactly once.
fn parse_headers(value: &str) -> Result<Vec<SignedField>, VerifyError> {
    let mut fields = Vec::with_capacity(SIGNED_FIELDS.len());
    for name in value.split_ascii_whitespace() {
        let field: SignedField = name.parse().map_err(VerifyError::Malformed)?;
        if fields.contains(&field) {
            return Err(VerifyError::Malformed(format!("duplicate signed field '{name}'")));
        }
        fields.push(field);
    }

    if let Some(missing) = SIGNED_FIELDS.iter().find(|f| !fields.contains(f)) {
        return Err(VerifyError::Malformed(format!("signed field {missing} is missing")));
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::from_entropy(42, &[0x42; 32]).unwrap()
    }

    #[test]
    fn test_validity_window_must_be_positive() {
        assert_eq!(
            ValidityWindow::from_secs(0),
            Err(ValidationError::InvalidValidityWindow(0))
        );
        assert_eq!(
            ValidityWindow::from_secs(-5),
            Err(ValidationError::InvalidValidityWindow(-5))
        );
        assert_eq!(ValidityWindow::from_secs(3).unwrap().as_secs(), 3);
    }

    #[test]
    fn test_validity_window_serde() {
        let window: ValidityWindow = serde_json::from_str("3600").unwrap();
        assert_eq!(window.as_secs(), 3600);
        assert!(serde_json::from_str::<ValidityWindow>("0").is_err());
        assert_eq!(serde_json::to_string(&window).unwrap(), "3600");
    }

    #[test]
    fn test_build_at_window() {
        let id = identity();
        let header = AuthHeaderBuilder::new(&id, ValidityWindow::from_secs(3).unwrap())
            .build_at(1_700_000_000);

        assert_eq!(header.key_id, 42);
        assert_eq!(header.created, 1_700_000_000);
        assert_eq!(header.expires - header.created, 3);
        id.public_key()
            .verify(header.signing_string().as_bytes(), &header.signature)
            .unwrap();
    }

    #[test]
    fn test_expiry_boundary() {
        let id = identity();
        let header =
            AuthHeaderBuilder::new(&id, ValidityWindow::from_secs(10).unwrap()).build_at(100);
        assert!(!header.is_expired_at(109));
        assert!(header.is_expired_at(110));
    }

    #[test]
    fn test_render_layout() {
        let id = identity();
        let header =
            AuthHeaderBuilder::new(&id, ValidityWindow::from_secs(3).unwrap()).build_at(1000);
        let rendered = header.render();

        let expected_prefix = r#"Signature keyId="42",algorithm="hs2019",created="1000",expires="1003",headers="(created) (expires) (key-id)",signature=""#;
        assert!(rendered.starts_with(expected_prefix), "{rendered}");
        assert!(rendered.ends_with('"'));
        assert_eq!(rendered, header.to_string());
    }

    #[test]
    fn test_render_parse_roundtrip() {
        let id = identity();
        let header =
            AuthHeaderBuilder::new(&id, ValidityWindow::from_secs(60).unwrap()).build_at(500);
        let credential: Credential = header.render().parse().unwrap();

        assert_eq!(credential.key_id, header.key_id);
        assert_eq!(credential.created, 500);
        assert_eq!(credential.expires, 560);
        assert_eq!(credential.headers, SIGNED_FIELDS.to_vec());
        assert_eq!(credential.signature, header.signature);
    }

    #[test]
    fn test_parse_tolerates_spaces_between_params() {
        let sig = Ed25519Signature::ZERO.to_base64();
        let value = format!(
            r#"Signature keyId="1",algorithm="hs2019",created="1",expires="2",headers="(created) (expires) (key-id) ", signature="{sig}""#
        );
        let credential: Credential = value.parse().unwrap();
        assert_eq!(credential.headers.len(), 3);
    }

    #[test]
    fn test_parse_rejects() {
        let sig = Ed25519Signature::ZERO.to_base64();
        let cases = [
            format!(r#"Bearer keyId="1",algorithm="hs2019",created="1",expires="2",headers="(created) (expires) (key-id)",signature="{sig}""#),
            format!(r#"Signature keyId="bad",algorithm="hs2019",created="1",expires="2",headers="(created) (expires) (key-id)",signature="{sig}""#),
            format!(r#"Signature keyId="1",algorithm="hs2019",created="1",expires="2",headers="(created) (expires)",signature="{sig}""#),
            format!(r#"Signature keyId="1",algorithm="hs2019",created="1",expires="2",headers="(created) (expires) (key-id) host",signature="{sig}""#),
            format!(r#"Signature keyId="1",algorithm="hs2019",created="1",expires="2",headers="(created) (created) (expires) (key-id)",signature="{sig}""#),
            format!(r#"Signature keyId="1",algorithm="rsa",created="1",expires="2",headers="(created) (expires) (key-id)",signature="{sig}""#),
            format!(r#"Signature keyId="1",algorithm="hs2019",created="2",expires="2",headers="(created) (expires) (key-id)",signature="{sig}""#),
            format!(r#"Signature keyId="1",keyId="1",algorithm="hs2019",created="1",expires="2",headers="(created) (expires) (key-id)",signature="{sig}""#),
            format!(r#"Signature keyId="1",algorithm="hs2019",created="1",expires="2",headers="(created) (expires) (key-id)",extra="x",signature="{sig}""#),
            r#"Signature keyId="1",algorithm="hs2019",created="1",expires="2",headers="(created) (expires) (key-id)""#.to_string(),
            r#"Signature keyId="1,algorithm"#.to_string(),
        ];

        for case in cases {
            assert!(
                matches!(case.parse::<Credential>(), Err(VerifyError::Malformed(_))),
                "should reject: {case}"
            );
        }
    }
}
