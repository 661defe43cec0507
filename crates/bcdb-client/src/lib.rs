//! # BCDB Client
//!
//! Client for the BCDB tag-indexed object store.
//!
//! Every call carries a freshly signed `Signature ...` authorization header,
//! so the server authorizes the caller without a handshake. The same API
//! works over the binary RPC transport and over HTTP.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bcdb_client::{Client, ClientConfig};
//! use bcdb_core::{Identity, Tags, ValidityWindow};
//! use bcdb_transport::{RpcConfig, TransportConfig};
//! use futures::StreamExt;
//!
//! async fn example(phrase: &str) -> Result<(), Box<dyn std::error::Error>> {
//!     let identity = Identity::from_mnemonic(42, phrase)?;
//!     let config = ClientConfig::new(ValidityWindow::from_secs(3)?);
//!     let transport = TransportConfig::Rpc(RpcConfig::new("127.0.0.1:50051"));
//!     let client = Client::connect(identity, &transport, config)?;
//!
//!     let files = client.collection("files");
//!     let id = files.set(&b"hello"[..], &Tags::new().with("name", "greeting"), None).await?;
//!     let object = files.get(id).await?;
//!     assert_eq!(object.tag("name"), Some("greeting"));
//!
//!     let mut ids = files.list(&Tags::new().with("name", "greeting")).await?;
//!     while let Some(id) = ids.next().await {
//!         println!("{}", id?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod acl;
pub mod auth;
pub mod client;
pub mod collection;
pub mod config;
pub mod error;

pub use acl::AclClient;
pub use auth::HeaderSource;
pub use client::Client;
pub use collection::CollectionClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
