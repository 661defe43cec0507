//! Transport selection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::{HttpConfig, HttpTransport};
use crate::messages::{Request, Response};
use crate::rpc::{RpcConfig, RpcTransport};
use crate::transport::{CallMetadata, ResponseStream, Transport};

/// Which wire protocol to use, and how to reach the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    Rpc(RpcConfig),
    Http(HttpConfig),
}

impl TransportConfig {
    /// Build the configured transport.
    ///
    /// No connection is made here; every call connects on its own.
    pub fn connect(&self) -> Result<AnyTransport> {
        Ok(match self {
            TransportConfig::Rpc(config) => AnyTransport::Rpc(RpcTransport::new(config.clone())),
            TransportConfig::Http(config) => {
                AnyTransport::Http(HttpTransport::new(config.clone())?)
            }
        })
    }
}

/// A transport chosen at construction time.
#[derive(Debug, Clone)]
pub enum AnyTransport {
    Rpc(RpcTransport),
    Http(HttpTransport),
}

#[async_trait]
impl Transport for AnyTransport {
    async fn unary(&self, metadata: CallMetadata, request: Request) -> Result<Response> {
        match self {
            AnyTransport::Rpc(t) => t.unary(metadata, request).await,
            AnyTransport::Http(t) => t.unary(metadata, request).await,
        }
    }

    async fn streaming(
        &self,
        metadata: CallMetadata,
        request: Request,
    ) -> Result<ResponseStream> {
        match self {
            AnyTransport::Rpc(t) => t.streaming(metadata, request).await,
            AnyTransport::Http(t) => t.streaming(metadata, request).await,
        }
    }
}
