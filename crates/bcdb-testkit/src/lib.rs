//! # BCDB Testkit
//!
//! Testing utilities for the BCDB client.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: exact header values for fixed seeds and times
//! - **Generators**: Proptest strategies for identities, tags and permissions
//! - **Fixtures**: an owner identity wired to a reference server
//! - **Reference server**: [`MemoryServer`], honoring the authentication
//!   contract and the object/ACL semantics the client relies on
//! - **Transports**: [`MemoryTransport`] for in-process tests, and
//!   [`RpcServer`] to exercise `RpcTransport` over real TCP
//!
//! ## Test Fixtures
//!
//! ```rust
//! use bcdb_core::Tags;
//! use bcdb_testkit::TestFixture;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let fixture = TestFixture::new();
//! let client = fixture.client();
//! let id = client
//!     .collection("files")
//!     .set(&b"hello"[..], &Tags::new().with("k", "v"), None)
//!     .await
//!     .unwrap();
//! assert_eq!(client.fetch(id).await.unwrap().tag("k"), Some("v"));
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod memory;
pub mod rpc_server;
pub mod server;
pub mod vectors;

pub use fixtures::{identity, test_config, TestFixture, OWNER_ID, TEST_MNEMONIC};
pub use memory::MemoryTransport;
pub use rpc_server::RpcServer;
pub use server::{MemoryServer, Rejection};
pub use vectors::{all_vectors, header_from_vector, verify_all_vectors, GoldenVector};
