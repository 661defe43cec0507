//! Golden test vectors for signed headers.
//!
//! Each vector pins the exact header value produced for a seed, key id and
//! time window. Ed25519 signing is deterministic, so any change to the
//! canonical string or the rendering shows up as a mismatch here.

use bcdb_core::{AuthHeader, Ed25519Signature, Identity, KeyId};

/// A golden header vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed for deterministic key generation.
    pub seed: [u8; 32],
    pub key_id: KeyId,
    pub created: u64,
    pub expires: u64,
    /// Expected public key (hex).
    pub expected_public_key: &'static str,
    /// Expected signature (standard base64).
    pub expected_signature: &'static str,
}

impl GoldenVector {
    pub fn identity(&self) -> Identity {
        Identity::from_seed_bytes(self.key_id, self.seed)
    }

    /// The expected rendered header value.
    pub fn expected_header(&self) -> String {
        format!(
            r#"Signature keyId="{}",algorithm="hs2019",created="{}",expires="{}",headers="(created) (expires) (key-id)",signature="{}""#,
            self.key_id, self.created, self.expires, self.expected_signature
        )
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "three second window",
            seed: [0x42; 32],
            key_id: 42,
            created: 1_700_000_000,
            expires: 1_700_000_003,
            expected_public_key: "2152f8d19b791d24453242e15f2eab6cb7cffa7b6a5ed30097960e069881db12",
            expected_signature: "D4E1Wo8aggwKp+E47sRrN6MY8dFqb536lqR8DV5E+/UL/elBdIEPcrWiVocIHjOAeZYxWtMN5nnmYEkWnMViCQ==",
        },
        GoldenVector {
            name: "zero seed, one hour window",
            seed: [0x00; 32],
            key_id: 1,
            created: 1_600_000_000,
            expires: 1_600_003_600,
            expected_public_key: "3b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29",
            expected_signature: "cAg2MIWPe9aTRsP73JVa3wHXqfH2X6omz8oK1LplSns4UtslX0ppmrbJ9ETBPyUbw5FLTPGcXB2mw9wfH16yAg==",
        },
        GoldenVector {
            name: "max key id at epoch",
            seed: sequential_seed(),
            key_id: u64::MAX,
            created: 0,
            expires: 1,
            expected_public_key: "03a107bff3ce10be1d70dd18e74bc09967e4d6309ba50d5f1ddc8664125531b8",
            expected_signature: "GaMAyiE6z4FPIHGhMWWuTWVhEVRRQVLq5pTxz9e2qYHQPWcqOG7JhSqUSP32SZlGkq7M3OuD7WJMSvLLKmBjAw==",
        },
    ]
}

/// Seed bytes `0x00, 0x01, ..., 0x1f`.
const fn sequential_seed() -> [u8; 32] {
    let mut seed = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        seed[i] = i as u8;
        i += 1;
    }
    seed
}

/// Build the header a vector describes.
pub fn header_from_vector(vector: &GoldenVector) -> AuthHeader {
    let identity = vector.identity();
    let message = bcdb_core::canonical_signing_string(vector.created, vector.expires, vector.key_id);
    AuthHeader {
        key_id: vector.key_id,
        created: vector.created,
        expires: vector.expires,
        signature: identity.sign(message.as_bytes()),
    }
}

/// Check every vector, returning `(name, matches, rendered)`.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let rendered = header_from_vector(v).render();
            let key_matches = v.identity().public_key().to_hex() == v.expected_public_key;
            let matches = key_matches && rendered == v.expected_header();
            (v.name.to_string(), matches, rendered)
        })
        .collect()
}

/// Decode a vector's expected signature.
pub fn expected_signature(vector: &GoldenVector) -> Option<Ed25519Signature> {
    Ed25519Signature::from_base64(vector.expected_signature).ok()
}
