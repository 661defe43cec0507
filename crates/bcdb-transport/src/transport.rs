//! Transport abstraction.
//!
//! A transport takes a request plus its call metadata and returns either a
//! single response or a lazy stream of responses. Implementations exist for
//! the binary RPC protocol and for HTTP; tests use an in-memory server.

use std::future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::error::Result;
use crate::messages::{Request, Response};

/// Lazy sequence of replies. Ends with at most one `Err`.
pub type ResponseStream = BoxStream<'static, Result<Response>>;

/// Per-call metadata sent next to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMetadata {
    /// The rendered `Signature ...` header value.
    pub authorization: String,
    /// Peer that should serve the request.
    pub route: Option<u64>,
}

impl CallMetadata {
    pub fn new(authorization: impl Into<String>) -> Self {
        Self {
            authorization: authorization.into(),
            route: None,
        }
    }

    pub fn with_route(mut self, route: Option<u64>) -> Self {
        self.route = route;
        self
    }
}

/// A wire protocol adapter.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch a request that has exactly one reply.
    async fn unary(&self, metadata: CallMetadata, request: Request) -> Result<Response>;

    /// Dispatch a request that replies with a stream.
    ///
    /// Each call opens a fresh stream. Dropping it releases the underlying
    /// connection.
    async fn streaming(&self, metadata: CallMetadata, request: Request)
        -> Result<ResponseStream>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn unary(&self, metadata: CallMetadata, request: Request) -> Result<Response> {
        (**self).unary(metadata, request).await
    }

    async fn streaming(
        &self,
        metadata: CallMetadata,
        request: Request,
    ) -> Result<ResponseStream> {
        (**self).streaming(metadata, request).await
    }
}

/// Stop a stream right after its first error.
pub fn end_on_error<S, T, E>(stream: S) -> impl Stream<Item = std::result::Result<T, E>>
where
    S: Stream<Item = std::result::Result<T, E>>,
{
    stream.scan(false, |failed, item| {
        if *failed {
            return future::ready(None);
        }
        *failed = item.is_err();
        future::ready(Some(item))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use futures::stream;

    #[tokio::test]
    async fn test_end_on_error() {
        let items: Vec<Result<u32>> = vec![
            Ok(1),
            Err(TransportError::ConnectionClosed),
            Ok(2),
        ];
        let collected: Vec<_> = end_on_error(stream::iter(items)).collect().await;

        assert_eq!(collected.len(), 2);
        assert!(matches!(collected[0], Ok(1)));
        assert!(matches!(collected[1], Err(TransportError::ConnectionClosed)));
    }

    #[test]
    fn test_call_metadata() {
        let meta = CallMetadata::new("Signature x").with_route(Some(3));
        assert_eq!(meta.authorization, "Signature x");
        assert_eq!(meta.route, Some(3));
    }
}
