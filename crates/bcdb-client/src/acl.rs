//! ACL management.

use futures::stream::{BoxStream, StreamExt};

use bcdb_core::{Acl, AclKey, Permissions, UserId};
use bcdb_transport::{end_on_error, Request, Response, Transport};

use crate::client::{unexpected, Client};
use crate::error::Result;

/// Manages the permission objects referenced by an object's `:acl` tag.
pub struct AclClient<'a, T: Transport> {
    client: &'a Client<T>,
}

impl<'a, T: Transport> AclClient<'a, T> {
    pub(crate) fn new(client: &'a Client<T>) -> Self {
        Self { client }
    }

    /// Create an ACL and return its key.
    ///
    /// `perm` is a 3-character `rwd` string with `-` for missing
    /// permissions; use [`DEFAULT_PERMISSIONS`](bcdb_core::DEFAULT_PERMISSIONS)
    /// for read-only.
    pub async fn create(&self, perm: &str, users: &[UserId]) -> Result<AclKey> {
        let perm: Permissions = perm.parse()?;
        let request = Request::AclCreate {
            perm,
            users: users.to_vec(),
        };
        match self.client.unary(request).await? {
            Response::AclKey { key } => Ok(key),
            other => Err(unexpected(&other)),
        }
    }

    /// All ACLs visible to the caller.
    pub async fn list(&self) -> Result<BoxStream<'static, Result<Acl>>> {
        let replies = self.client.streaming(Request::AclList).await?;
        let items = replies.map(|reply| match reply? {
            Response::Acl { acl } => Ok(acl),
            other => Err(unexpected(&other)),
        });
        Ok(end_on_error(items).boxed())
    }

    pub async fn get(&self, key: AclKey) -> Result<Acl> {
        match self.client.unary(Request::AclGet { key }).await? {
            Response::Acl { acl } => Ok(acl),
            other => Err(unexpected(&other)),
        }
    }

    /// Replace the permission string of an ACL.
    pub async fn set(&self, key: AclKey, perm: &str) -> Result<()> {
        let perm: Permissions = perm.parse()?;
        self.expect_empty(Request::AclSet { key, perm }).await
    }

    /// Add users. Granting an existing member is a no-op.
    pub async fn grant(&self, key: AclKey, users: &[UserId]) -> Result<()> {
        self.expect_empty(Request::AclGrant {
            key,
            users: users.to_vec(),
        })
        .await
    }

    /// Remove users. Revoking a non-member is a no-op.
    pub async fn revoke(&self, key: AclKey, users: &[UserId]) -> Result<()> {
        self.expect_empty(Request::AclRevoke {
            key,
            users: users.to_vec(),
        })
        .await
    }

    async fn expect_empty(&self, request: Request) -> Result<()> {
        match self.client.unary(request).await? {
            Response::Empty => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}
