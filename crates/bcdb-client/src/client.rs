//! The Client: unified API for a BCDB server.
//!
//! The client owns the caller identity and the transport. Collection and
//! ACL operations are reached through cheap borrowed views.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};

use bcdb_core::{Identity, KeyId, Object, ObjectId};
use bcdb_transport::{
    AnyTransport, CallMetadata, Request, Response, StatusCode, Transport, TransportConfig,
    TransportError,
};

use crate::acl::AclClient;
use crate::auth::HeaderSource;
use crate::collection::CollectionClient;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// A BCDB client bound to one identity and one transport.
pub struct Client<T: Transport> {
    identity: Arc<Identity>,
    transport: T,
    headers: HeaderSource,
    config: ClientConfig,
}

impl Client<AnyTransport> {
    /// Build a client over the transport described by `transport`.
    pub fn connect(
        identity: impl Into<Arc<Identity>>,
        transport: &TransportConfig,
        config: ClientConfig,
    ) -> Result<Self> {
        let transport = transport.connect()?;
        Ok(Self::new(identity, transport, config))
    }
}

impl<T: Transport> Client<T> {
    /// Create a new client.
    pub fn new(identity: impl Into<Arc<Identity>>, transport: T, config: ClientConfig) -> Self {
        let identity = identity.into();
        let headers = HeaderSource::new(identity.clone(), config.validity, config.reuse_headers);
        Self {
            identity,
            transport,
            headers,
            config,
        }
    }

    /// The caller id sent with every call.
    pub fn id(&self) -> KeyId {
        self.identity.id()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Operations on a named collection.
    pub fn collection(&self, name: impl Into<String>) -> CollectionClient<'_, T> {
        CollectionClient::new(self, name.into())
    }

    /// ACL management.
    pub fn acl(&self) -> AclClient<'_, T> {
        AclClient::new(self)
    }

    /// Get an object by id, whatever collection it lives in.
    pub async fn fetch(&self, id: ObjectId) -> Result<Object> {
        match self.unary(Request::Fetch { id }).await? {
            Response::Object { id, metadata, data } => {
                Ok(Object::from_metadata(id, data, &metadata))
            }
            other => Err(unexpected(&other)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    fn metadata(&self) -> CallMetadata {
        CallMetadata::new(self.headers.header().render()).with_route(self.config.route)
    }

    /// Sign and dispatch a unary request.
    pub(crate) async fn unary(&self, request: Request) -> Result<Response> {
        tracing::debug!(
            op = request.name(),
            collection = request.collection(),
            key_id = self.identity.id(),
            "dispatch"
        );
        self.transport
            .unary(self.metadata(), request)
            .await
            .map_err(classify)
    }

    /// Sign and dispatch a streaming request.
    pub(crate) async fn streaming(
        &self,
        request: Request,
    ) -> Result<BoxStream<'static, Result<Response>>> {
        tracing::debug!(
            op = request.name(),
            collection = request.collection(),
            key_id = self.identity.id(),
            "dispatch stream"
        );
        let replies = self
            .transport
            .streaming(self.metadata(), request)
            .await
            .map_err(classify)?;
        Ok(replies.map(|reply| reply.map_err(classify)).boxed())
    }
}

/// Map a transport failure onto a client error.
fn classify(err: TransportError) -> ClientError {
    if err.status_code() == Some(StatusCode::Unauthenticated) {
        tracing::warn!("server rejected authentication");
    }
    ClientError::from(err)
}

/// Error for a reply that does not fit the request.
pub(crate) fn unexpected(response: &Response) -> ClientError {
    ClientError::Transport(TransportError::UnexpectedResponse(format!(
        "unexpected {} reply",
        response.kind()
    )))
}
