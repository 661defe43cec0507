//! Caller identities.
//!
//! An [`Identity`] pairs the numeric id registered with the key registry
//! with an Ed25519 keypair. Keys are derived deterministically: the same
//! mnemonic always yields the same keypair, with no randomness involved.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair, SEED_LENGTH};
use crate::error::IdentityError;
use crate::mnemonic;

/// Numeric id of a registered identity. Also the `keyId` of its headers.
pub type KeyId = u64;

/// The only identity file version understood by [`Identity::from_identity_file`].
pub const IDENTITY_FILE_VERSION: &str = "1.1.0";

/// Where the key material for an identity comes from.
#[derive(Clone)]
pub enum SeedSource {
    /// A BIP-39 English mnemonic phrase.
    Mnemonic(String),
    /// Raw 32-byte entropy.
    Entropy(Vec<u8>),
    /// A file holding the 32-byte seed, either raw or hex encoded.
    SeedFile(PathBuf),
}

impl fmt::Debug for SeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedSource::Mnemonic(_) => f.write_str("SeedSource::Mnemonic(<redacted>)"),
            SeedSource::Entropy(_) => f.write_str("SeedSource::Entropy(<redacted>)"),
            SeedSource::SeedFile(path) => write!(f, "SeedSource::SeedFile({})", path.display()),
        }
    }
}

/// A caller identity: id plus signing keypair.
///
/// Immutable once created. Signing takes `&self` and touches no shared
/// mutable state, so one identity can sign from many threads at once.
#[derive(Clone)]
pub struct Identity {
    id: KeyId,
    keypair: Keypair,
}

impl Identity {
    /// Derive an identity from any supported seed source.
    pub fn from_seed(id: KeyId, source: SeedSource) -> Result<Self, IdentityError> {
        match source {
            SeedSource::Mnemonic(phrase) => Self::from_mnemonic(id, &phrase),
            SeedSource::Entropy(entropy) => Self::from_entropy(id, &entropy),
            SeedSource::SeedFile(path) => Self::from_seed_file(id, path),
        }
    }

    /// Derive an identity from a 24-word mnemonic phrase.
    pub fn from_mnemonic(id: KeyId, phrase: &str) -> Result<Self, IdentityError> {
        let entropy = mnemonic::to_entropy(phrase)?;
        Self::from_entropy(id, &entropy)
    }

    /// Build an identity from raw entropy, used directly as the Ed25519 seed.
    pub fn from_entropy(id: KeyId, entropy: &[u8]) -> Result<Self, IdentityError> {
        let seed: [u8; SEED_LENGTH] =
            entropy.try_into().map_err(|_| IdentityError::InvalidSeed {
                expected: SEED_LENGTH,
                got: entropy.len(),
            })?;

        Ok(Self::from_seed_bytes(id, seed))
    }

    /// Build an identity from a seed of the right length.
    pub fn from_seed_bytes(id: KeyId, seed: [u8; SEED_LENGTH]) -> Self {
        Self {
            id,
            keypair: Keypair::from_seed(&seed),
        }
    }

    /// Create a fresh random identity, returning it with its mnemonic phrase.
    ///
    /// The phrase is the only backup of the key; store it before registering
    /// the public key.
    pub fn generate(id: KeyId) -> Result<(Self, String), IdentityError> {
        let keypair = Keypair::generate();
        let phrase = mnemonic::from_entropy(&keypair.seed())?;
        Ok((Self { id, keypair }, phrase))
    }

    /// Load the seed from a file containing either 32 raw bytes or 64 hex
    /// characters (surrounding whitespace is ignored for the hex form).
    pub fn from_seed_file<P: AsRef<Path>>(id: KeyId, path: P) -> Result<Self, IdentityError> {
        let bytes = std::fs::read(path)?;
        if bytes.len() == SEED_LENGTH {
            return Self::from_entropy(id, &bytes);
        }

        let text = String::from_utf8_lossy(&bytes);
        match hex::decode(text.trim()) {
            Ok(seed) => Self::from_entropy(id, &seed),
            Err(_) => Err(IdentityError::InvalidSeed {
                expected: SEED_LENGTH,
                got: bytes.len(),
            }),
        }
    }

    /// Load an identity file: a JSON stream of the version string followed
    /// by `{"threebotid": <id>, "mnemonic": "<words>"}`.
    pub fn from_identity_file<P: AsRef<Path>>(path: P) -> Result<Self, IdentityError> {
        #[derive(Deserialize)]
        struct IdentityFile {
            threebotid: KeyId,
            mnemonic: String,
        }

        let file = File::open(path)?;
        let mut stream = serde_json::Deserializer::from_reader(file).into_iter::<serde_json::Value>();

        let version = match stream.next() {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                return Err(IdentityError::InvalidIdentityFile(format!(
                    "failed to parse version: {e}"
                )))
            }
            None => return Err(IdentityError::InvalidIdentityFile("empty file".into())),
        };

        if version.as_str() != Some(IDENTITY_FILE_VERSION) {
            return Err(IdentityError::InvalidIdentityFile(format!(
                "unsupported version {version}"
            )));
        }

        let info = match stream.next() {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                return Err(IdentityError::InvalidIdentityFile(format!(
                    "failed to parse identity object: {e}"
                )))
            }
            None => {
                return Err(IdentityError::InvalidIdentityFile(
                    "missing identity object".into(),
                ))
            }
        };

        let info: IdentityFile = serde_json::from_value(info)
            .map_err(|e| IdentityError::InvalidIdentityFile(e.to_string()))?;

        Self::from_mnemonic(info.threebotid, &info.mnemonic)
    }

    /// The caller id, sent as `keyId` in every header.
    pub fn id(&self) -> KeyId {
        self.id
    }

    /// The public half of the keypair, as registered with the key registry.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Create a detached signature over a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        self.keypair.sign(message)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("public_key", &self.public_key())
            .finish()
    }
}
