//! BIP-39 mnemonic codec.
//!
//! Converts between English mnemonic phrases and the entropy they encode.
//! The entropy, not the phrase text, is what seeds an identity keypair.

use bip39::{Language, Mnemonic};

use crate::error::IdentityError;

/// Decode a mnemonic phrase into its entropy bytes.
///
/// Words are matched case-insensitively and may be separated by any
/// whitespace. Fails with [`IdentityError::InvalidMnemonic`] on an unknown
/// word, a bad word count or a checksum mismatch.
pub fn to_entropy(phrase: &str) -> Result<Vec<u8>, IdentityError> {
    let normalized = normalize(phrase);
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| IdentityError::InvalidMnemonic(e.to_string()))?;
    Ok(mnemonic.to_entropy())
}

/// Encode entropy bytes as an English mnemonic phrase.
pub fn from_entropy(entropy: &[u8]) -> Result<String, IdentityError> {
    let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy)
        .map_err(|e| IdentityError::InvalidMnemonic(e.to_string()))?;
    Ok(mnemonic.to_string())
}

fn normalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
