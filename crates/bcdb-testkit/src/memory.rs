//! In-memory transport backed by a [`MemoryServer`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use bcdb_transport::{
    CallMetadata, Request, Response, ResponseStream, Result, Transport, TransportError,
};

use crate::server::MemoryServer;

/// Transport that hands requests straight to a [`MemoryServer`].
///
/// Records every call so tests can assert on what was sent.
pub struct MemoryTransport {
    server: Arc<MemoryServer>,
    calls: AtomicUsize,
    seen: Mutex<Vec<CallMetadata>>,
    /// Streams fail with a closed connection after this many items.
    stream_fault: Mutex<Option<usize>>,
}

impl MemoryTransport {
    pub fn new(server: Arc<MemoryServer>) -> Self {
        Self {
            server,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            stream_fault: Mutex::new(None),
        }
    }

    pub fn server(&self) -> &Arc<MemoryServer> {
        &self.server
    }

    /// Number of calls dispatched so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Metadata of every call, in dispatch order.
    pub fn seen(&self) -> Vec<CallMetadata> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make every later stream break after `items` replies.
    pub fn fail_streams_after(&self, items: usize) {
        *self
            .stream_fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(items);
    }

    fn dispatch(&self, metadata: CallMetadata, request: Request) -> Result<Vec<Response>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let replies = self.server.handle(&metadata.authorization, request);
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(metadata);
        Ok(replies?)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn unary(&self, metadata: CallMetadata, request: Request) -> Result<Response> {
        let mut replies = self.dispatch(metadata, request)?;
        if replies.len() != 1 {
            return Err(TransportError::UnexpectedResponse(format!(
                "{} replies to a unary call",
                replies.len()
            )));
        }
        Ok(replies.remove(0))
    }

    async fn streaming(
        &self,
        metadata: CallMetadata,
        request: Request,
    ) -> Result<ResponseStream> {
        let replies = self.dispatch(metadata, request)?;
        let fault = *self
            .stream_fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let items: Vec<Result<Response>> = match fault {
            Some(limit) => replies
                .into_iter()
                .take(limit)
                .map(Ok)
                .chain(std::iter::once(Err(TransportError::ConnectionClosed)))
                .collect(),
            None => replies.into_iter().map(Ok).collect(),
        };
        Ok(stream::iter(items).boxed())
    }
}
