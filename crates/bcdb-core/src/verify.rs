//! Server-side credential verification.
//!
//! The verifier is the other half of [`AuthHeaderBuilder`](crate::AuthHeaderBuilder):
//! it rebuilds the signing string from the advertised fields and checks the
//! signature against the registered public key for `keyId`.

use std::collections::HashMap;

use crate::canonical::signing_string;
use crate::crypto::Ed25519PublicKey;
use crate::error::VerifyError;
use crate::header::{unix_now, Credential};
use crate::identity::{Identity, KeyId};

/// Resolves a key id to its registered public key.
pub trait KeyRegistry: Send + Sync {
    fn public_key(&self, key_id: KeyId) -> Option<Ed25519PublicKey>;
}

/// A fixed, in-memory key registry.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyRegistry {
    keys: HashMap<KeyId, Ed25519PublicKey>,
}

impl StaticKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the key for `key_id`.
    pub fn insert(&mut self, key_id: KeyId, key: Ed25519PublicKey) {
        self.keys.insert(key_id, key);
    }

    /// Builder-style registration of an identity's public key.
    pub fn with_identity(mut self, identity: &Identity) -> Self {
        self.insert(identity.id(), identity.public_key());
        self
    }
}

impl KeyRegistry for StaticKeyRegistry {
    fn public_key(&self, key_id: KeyId) -> Option<Ed25519PublicKey> {
        self.keys.get(&key_id).copied()
    }
}

/// Verifies authorization header values.
#[derive(Debug, Clone)]
pub struct Verifier<R: KeyRegistry> {
    registry: R,
    skew_secs: u64,
}

impl<R: KeyRegistry> Verifier<R> {
    /// `skew_secs` is how far in the future `created` may be before the
    /// header is rejected as not yet valid.
    pub fn new(registry: R, skew_secs: u64) -> Self {
        Self {
            registry,
            skew_secs,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Verify a header value against the current clock.
    pub fn verify(&self, value: &str) -> Result<KeyId, VerifyError> {
        self.verify_at(value, unix_now())
    }

    /// Verify a header value as if the current time were `now`.
    ///
    /// Returns the authenticated key id on success.
    pub fn verify_at(&self, value: &str, now: u64) -> Result<KeyId, VerifyError> {
        let credential: Credential = value.parse()?;

        let key = self
            .registry
            .public_key(credential.key_id)
            .ok_or(VerifyError::UnknownKey(credential.key_id))?;

        // Rebuilt in the advertised order: any order other than the one the
        // signer used produces a different string.
        let message = signing_string(
            &credential.headers,
            credential.created,
            credential.expires,
            credential.key_id,
        );
        key.verify(message.as_bytes(), &credential.signature)
            .map_err(|_| VerifyError::BadSignature)?;

        if now > credential.expires {
            return Err(VerifyError::Expired {
                expires: credential.expires,
                now,
            });
        }
        if credential.created > now.saturating_add(self.skew_secs) {
            return Err(VerifyError::NotYetValid {
                created: credential.created,
                now,
            });
        }

        Ok(credential.key_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Signature;
    use crate::header::{AuthHeaderBuilder, ValidityWindow};

    const NOW: u64 = 1_700_000_000;

    fn setup() -> (Identity, Verifier<StaticKeyRegistry>) {
        let identity = Identity::from_entropy(7, &[0x11; 32]).unwrap();
        let registry = StaticKeyRegistry::new().with_identity(&identity);
        (identity, Verifier::new(registry, 5))
    }

    fn header(identity: &Identity, at: u64, secs: i64) -> String {
        AuthHeaderBuilder::new(identity, ValidityWindow::from_secs(secs).unwrap())
            .build_at(at)
            .render()
    }

    #[test]
    fn test_valid_header_accepted() {
        let (identity, verifier) = setup();
        let value = header(&identity, NOW, 3);
        assert_eq!(verifier.verify_at(&value, NOW + 1), Ok(7));
    }

    #[test]
    fn test_unknown_key() {
        let (_, verifier) = setup();
        let stranger = Identity::from_entropy(99, &[0x22; 32]).unwrap();
        let value = header(&stranger, NOW, 3);
        assert_eq!(
            verifier.verify_at(&value, NOW),
            Err(VerifyError::UnknownKey(99))
        );
    }

    #[test]
    fn test_wrong_key_for_id() {
        let (_, verifier) = setup();
        let impostor = Identity::from_entropy(7, &[0x33; 32]).unwrap();
        let value = header(&impostor, NOW, 3);
        assert_eq!(verifier.verify_at(&value, NOW), Err(VerifyError::BadSignature));
    }

    #[test]
    fn test_tampered_values_rejected() {
        let (identity, verifier) = setup();
        let value = header(&identity, NOW, 3);

        let tampered_created = value.replace(
            &format!("created=\"{NOW}\""),
            &format!("created=\"{}\"", NOW - 1),
        );
        assert_eq!(
            verifier.verify_at(&tampered_created, NOW),
            Err(VerifyError::BadSignature)
        );

        let tampered_expires = value.replace(
            &format!("expires=\"{}\"", NOW + 3),
            &format!("expires=\"{}\"", NOW + 3600),
        );
        assert_eq!(
            verifier.verify_at(&tampered_expires, NOW),
            Err(VerifyError::BadSignature)
        );
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let (identity, verifier) = setup();
        let built = AuthHeaderBuilder::new(&identity, ValidityWindow::from_secs(3).unwrap())
            .build_at(NOW);

        let mut bytes = *built.signature.as_bytes();
        bytes[10] ^= 0x01;
        let value = built
            .render()
            .replace(&built.signature.to_base64(), &Ed25519Signature(bytes).to_base64());

        assert_eq!(verifier.verify_at(&value, NOW), Err(VerifyError::BadSignature));
    }

    #[test]
    fn test_reordered_headers_rejected() {
        let (identity, verifier) = setup();
        let value = header(&identity, NOW, 3).replace(
            "headers=\"(created) (expires) (key-id)\"",
            "headers=\"(key-id) (created) (expires)\"",
        );
        assert_eq!(verifier.verify_at(&value, NOW), Err(VerifyError::BadSignature));
    }

    #[test]
    fn test_missing_field_rejected() {
        let (identity, verifier) = setup();
        let value = header(&identity, NOW, 3).replace(
            "headers=\"(created) (expires) (key-id)\"",
            "headers=\"(created) (expires)\"",
        );
        assert!(matches!(
            verifier.verify_at(&value, NOW),
            Err(VerifyError::Malformed(_))
        ));
    }

    #[test]
    fn test_expiry() {
        let (identity, verifier) = setup();
        let value = header(&identity, NOW, 3);

        assert!(verifier.verify_at(&value, NOW + 3).is_ok());
        assert_eq!(
            verifier.verify_at(&value, NOW + 4),
            Err(VerifyError::Expired {
                expires: NOW + 3,
                now: NOW + 4
            })
        );
    }

    #[test]
    fn test_clock_skew() {
        let (identity, verifier) = setup();

        let within = header(&identity, NOW + 5, 60);
        assert!(verifier.verify_at(&within, NOW).is_ok());

        let beyond = header(&identity, NOW + 6, 60);
        assert_eq!(
            verifier.verify_at(&beyond, NOW),
            Err(VerifyError::NotYetValid {
                created: NOW + 6,
                now: NOW
            })
        );
    }
}
