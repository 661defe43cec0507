//! # BCDB Core
//!
//! Pure primitives for the BCDB client: identities, signed authorization
//! headers, and the object/ACL data model that those headers protect.
//!
//! This crate performs no networking. The only I/O it does is reading seed
//! and identity files when an [`Identity`] is loaded from disk.
//!
//! ## Key Types
//!
//! - [`Identity`] - Caller id plus an Ed25519 keypair derived from a mnemonic
//! - [`AuthHeaderBuilder`] - Produces a signed [`AuthHeader`] for one request
//! - [`Verifier`] - The server-side acceptance contract for header values
//! - [`Object`], [`Metadata`], [`Tag`] - The tag-indexed object model
//! - [`Acl`], [`Permissions`] - Permission records referenced by objects
//!
//! ## Signing
//!
//! Every header signs a canonical string built from three fields:
//!
//! ```text
//! (created): <unix seconds>
//! (expires): <unix seconds>
//! (key-id): <identity id>
//! ```
//!
//! See the [`canonical`] module for the exact byte layout.

pub mod acl;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod header;
pub mod identity;
pub mod mnemonic;
pub mod object;
pub mod validation;
pub mod verify;

pub use acl::{Acl, Permissions, DEFAULT_PERMISSIONS};
pub use canonical::{canonical_signing_string, signing_string, SignedField, SIGNED_FIELDS};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CoreError, IdentityError, ValidationError, VerifyError};
pub use header::{unix_now, AuthHeader, AuthHeaderBuilder, Credential, ValidityWindow, ALGORITHM};
pub use identity::{Identity, KeyId, SeedSource};
pub use object::{
    is_reserved, AclKey, Metadata, Object, ObjectId, Tag, TagValue, Tags, UserId, TAG_ACL,
    TAG_CREATED, TAG_SIZE, TAG_UPDATED,
};
pub use validation::{validate_tag_key, validate_tags};
pub use verify::{KeyRegistry, StaticKeyRegistry, Verifier};
