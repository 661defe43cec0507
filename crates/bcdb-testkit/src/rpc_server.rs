//! TCP server speaking the binary RPC protocol.
//!
//! Wraps a [`MemoryServer`] so `RpcTransport` can be exercised end to end.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use bcdb_transport::{read_frame, write_frame, Envelope, Frame, RpcConfig, TransportError};

use crate::server::MemoryServer;

/// A running RPC server on a loopback port. Stopped on drop.
pub struct RpcServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl RpcServer {
    /// Bind an ephemeral loopback port and start serving.
    pub async fn spawn(server: Arc<MemoryServer>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let task = tokio::spawn(async move {
            loop {
                let (conn, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("accept failed: {}", e);
                        break;
                    }
                };
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    if let Err(e) = serve(conn, &server).await {
                        tracing::debug!(%peer, error = %e, "connection ended");
                    }
                });
            }
        });

        Ok(Self { addr, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Client configuration pointing at this server.
    pub fn config(&self) -> RpcConfig {
        RpcConfig {
            addr: self.addr.to_string(),
            connect_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_secs(5),
        }
    }
}

impl Drop for RpcServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Serve one call: read the envelope, write replies, then `End` or `Error`.
async fn serve(mut conn: TcpStream, server: &MemoryServer) -> Result<(), TransportError> {
    let envelope: Envelope = read_frame(&mut conn).await?;

    match server.handle(&envelope.authorization, envelope.request) {
        Ok(replies) => {
            for reply in replies {
                write_frame(&mut conn, &Frame::Reply(reply)).await?;
            }
            write_frame(&mut conn, &Frame::End).await?;
        }
        Err(rejection) => {
            write_frame(
                &mut conn,
                &Frame::Error {
                    code: rejection.code,
                    message: rejection.message,
                },
            )
            .await?;
        }
    }
    Ok(())
}
