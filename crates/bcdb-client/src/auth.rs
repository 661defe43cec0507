//! Header source: fresh or cached signed headers.

use std::sync::{Arc, Mutex, PoisonError};

use bcdb_core::{unix_now, AuthHeader, AuthHeaderBuilder, Identity, ValidityWindow};

/// Produces the authorization header for each call.
///
/// Without caching every call gets a freshly signed header. With caching a
/// header is reused until `now >= expires`, then rebuilt. Signing happens
/// outside the lock.
#[derive(Debug)]
pub struct HeaderSource {
    identity: Arc<Identity>,
    validity: ValidityWindow,
    cache: Option<Mutex<Option<AuthHeader>>>,
}

impl HeaderSource {
    pub fn new(identity: Arc<Identity>, validity: ValidityWindow, reuse: bool) -> Self {
        Self {
            identity,
            validity,
            cache: reuse.then(|| Mutex::new(None)),
        }
    }

    /// Header for a call made now.
    pub fn header(&self) -> AuthHeader {
        self.header_at(unix_now())
    }

    /// Header for a call made at `now`.
    pub fn header_at(&self, now: u64) -> AuthHeader {
        let Some(cache) = &self.cache else {
            return self.build(now);
        };

        if let Some(cached) = cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|h| !h.is_expired_at(now))
        {
            return cached.clone();
        }

        let fresh = self.build(now);
        *cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(fresh.clone());
        fresh
    }

    fn build(&self, now: u64) -> AuthHeader {
        AuthHeaderBuilder::new(&self.identity, self.validity).build_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(reuse: bool) -> HeaderSource {
        let identity = Arc::new(Identity::from_entropy(1, &[5u8; 32]).unwrap());
        HeaderSource::new(identity, ValidityWindow::from_secs(3).unwrap(), reuse)
    }

    #[test]
    fn test_fresh_header_per_call() {
        let source = source(false);
        let a = source.header_at(100);
        let b = source.header_at(101);
        assert_eq!(a.created, 100);
        assert_eq!(b.created, 101);
    }

    #[test]
    fn test_cached_until_expiry() {
        let source = source(true);
        let first = source.header_at(100);
        assert_eq!(source.header_at(101), first);
        assert_eq!(source.header_at(102), first);

        // expires = 103: rebuilt once now >= expires.
        let rebuilt = source.header_at(103);
        assert_eq!(rebuilt.created, 103);
        assert_eq!(rebuilt.expires, 106);
        assert_eq!(source.header_at(104), rebuilt);
    }
}
