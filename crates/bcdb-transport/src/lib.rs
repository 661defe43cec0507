//! # BCDB Transport
//!
//! Wire protocol adapters for the BCDB client.
//!
//! Every call is a [`Request`] plus [`CallMetadata`] (the signed
//! authorization header and an optional peer route). Two interchangeable
//! adapters implement [`Transport`]:
//!
//! - [`RpcTransport`] - length-prefixed CBOR frames over TCP
//! - [`HttpTransport`] - the REST gateway, with streamed results as a sequence of JSON values
//!
//! [`AnyTransport`] picks one at construction time from a [`TransportConfig`].
//!
//! ## RPC Call Flow
//!
//! ```text
//! Client                              Server
//!   |-------- Envelope --------------->|
//!   |<------- Reply -------------------|   (zero or more)
//!   |<------- End | Error -------------|
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod messages;
pub mod rpc;
pub mod transport;

pub use codec::{read_frame, write_frame, MAX_FRAME_SIZE};
pub use config::{AnyTransport, TransportConfig};
pub use error::{Result, TransportError};
pub use http::{HttpConfig, HttpTransport};
pub use messages::{Envelope, Frame, Request, Response, StatusCode};
pub use rpc::{RpcConfig, RpcTransport};
pub use transport::{end_on_error, CallMetadata, ResponseStream, Transport};
