//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use bcdb_client::{Client, ClientConfig};
use bcdb_core::{Identity, KeyId, ValidityWindow};

use crate::memory::MemoryTransport;
use crate::server::MemoryServer;

/// A valid 24-word English mnemonic.
pub const TEST_MNEMONIC: &str = "crunch depend lock agree lava include clown toss runway source better such never bonus divide trade squeeze type ride satoshi slender lottery rain cause";

/// Id of the fixture's server owner.
pub const OWNER_ID: KeyId = 1;

/// Deterministic identity whose seed is `[byte; 32]`.
pub fn identity(id: KeyId, byte: u8) -> Identity {
    Identity::from_seed_bytes(id, [byte; 32])
}

/// Client config with a one-minute validity window.
pub fn test_config() -> ClientConfig {
    match ValidityWindow::from_secs(60) {
        Ok(validity) => ClientConfig::new(validity),
        Err(_) => unreachable!("60 is a positive window"),
    }
}

/// An owner identity, a reference server and a transport into it.
pub struct TestFixture {
    pub owner: Identity,
    pub server: Arc<MemoryServer>,
    pub transport: Arc<MemoryTransport>,
}

impl TestFixture {
    /// A server owned by [`OWNER_ID`] with no other known users.
    pub fn new() -> Self {
        Self::with_users(&[])
    }

    /// A server that also knows the keys of `users`.
    pub fn with_users(users: &[&Identity]) -> Self {
        let owner = identity(OWNER_ID, 0x01);
        let server = Arc::new(MemoryServer::with_users(&owner, users));
        let transport = Arc::new(MemoryTransport::new(Arc::clone(&server)));
        Self {
            owner,
            server,
            transport,
        }
    }

    /// Client for the owner.
    pub fn client(&self) -> Client<Arc<MemoryTransport>> {
        self.client_with(self.owner.clone(), test_config())
    }

    /// Client for any identity, sharing the fixture's transport.
    pub fn client_for(&self, identity: Identity) -> Client<Arc<MemoryTransport>> {
        self.client_with(identity, test_config())
    }

    pub fn client_with(
        &self,
        identity: Identity,
        config: ClientConfig,
    ) -> Client<Arc<MemoryTransport>> {
        Client::new(identity, Arc::clone(&self.transport), config)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
