//! Binary RPC transport.
//!
//! Each call opens a TCP connection, writes one [`Envelope`] frame and reads
//! [`Frame`]s until `End` or `Error`.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::codec::{read_frame, write_frame};
use crate::error::{Result, TransportError};
use crate::messages::{Envelope, Frame, Request, Response};
use crate::transport::{CallMetadata, ResponseStream, Transport};

/// RPC transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// `host:port` of the server.
    pub addr: String,
    pub connect_timeout: Duration,
    /// Applies to every frame read and write.
    pub io_timeout: Duration,
}

impl RpcConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(30),
        }
    }
}

/// Transport speaking length-prefixed CBOR over TCP.
#[derive(Debug, Clone)]
pub struct RpcTransport {
    config: RpcConfig,
}

impl RpcTransport {
    pub fn new(config: RpcConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Connect and send the request envelope.
    async fn open(&self, metadata: CallMetadata, request: Request) -> Result<TcpStream> {
        let mut conn = timeout(self.config.connect_timeout, TcpStream::connect(&self.config.addr))
            .await
            .map_err(|_| TransportError::Timeout(format!("connect to {}", self.config.addr)))??;
        conn.set_nodelay(true)?;

        tracing::trace!(addr = %self.config.addr, op = request.name(), "rpc call");
        let envelope = Envelope {
            authorization: metadata.authorization,
            route: metadata.route,
            request,
        };
        timeout(self.config.io_timeout, write_frame(&mut conn, &envelope))
            .await
            .map_err(|_| TransportError::Timeout("write request".into()))??;

        Ok(conn)
    }
}

async fn next_frame(conn: &mut TcpStream, io_timeout: Duration) -> Result<Frame> {
    timeout(io_timeout, read_frame(conn))
        .await
        .map_err(|_| TransportError::Timeout("read reply".into()))?
}

#[async_trait]
impl Transport for RpcTransport {
    async fn unary(&self, metadata: CallMetadata, request: Request) -> Result<Response> {
        let io_timeout = self.config.io_timeout;
        let mut conn = self.open(metadata, request).await?;

        let reply = match next_frame(&mut conn, io_timeout).await? {
            Frame::Reply(response) => response,
            Frame::End => return Err(TransportError::UnexpectedResponse("no reply".into())),
            Frame::Error { code, message } => return Err(TransportError::status(code, message)),
        };

        match next_frame(&mut conn, io_timeout).await? {
            Frame::End => Ok(reply),
            Frame::Error { code, message } => Err(TransportError::status(code, message)),
            Frame::Reply(_) => Err(TransportError::UnexpectedResponse(
                "more than one reply to a unary call".into(),
            )),
        }
    }

    async fn streaming(
        &self,
        metadata: CallMetadata,
        request: Request,
    ) -> Result<ResponseStream> {
        let io_timeout = self.config.io_timeout;
        let conn = self.open(metadata, request).await?;

        // The connection lives in the stream state and is dropped with it.
        let replies = stream::try_unfold(conn, move |mut conn| async move {
            match next_frame(&mut conn, io_timeout).await? {
                Frame::Reply(response) => Ok(Some((response, conn))),
                Frame::End => Ok(None),
                Frame::Error { code, message } => Err(TransportError::status(code, message)),
            }
        });

        Ok(replies.boxed())
    }
}
