//! Collection-scoped object operations.

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};

use bcdb_core::{validate_tags, AclKey, Metadata, Object, ObjectId, Tags};
use bcdb_transport::{end_on_error, Request, Response, Transport};

use crate::client::{unexpected, Client};
use crate::error::Result;

/// CRUD and tag queries within one collection.
pub struct CollectionClient<'a, T: Transport> {
    client: &'a Client<T>,
    name: String,
}

impl<'a, T: Transport> CollectionClient<'a, T> {
    pub(crate) fn new(client: &'a Client<T>, name: String) -> Self {
        Self { client, name }
    }

    /// The collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self, tags: &Tags, acl: Option<AclKey>) -> Metadata {
        Metadata {
            collection: self.name.clone(),
            acl,
            tags: tags.to_vec(),
        }
    }

    /// Store a new object and return its id.
    ///
    /// Tags in the reserved `:` namespace are rejected before anything is
    /// sent.
    pub async fn set(
        &self,
        data: impl Into<Bytes>,
        tags: &Tags,
        acl: Option<AclKey>,
    ) -> Result<ObjectId> {
        validate_tags(tags)?;
        let request = Request::Set {
            data: data.into(),
            metadata: self.metadata(tags, acl),
        };
        match self.client.unary(request).await? {
            Response::Id { id } => Ok(id),
            other => Err(unexpected(&other)),
        }
    }

    /// Get an object with its tags, reserved tags included.
    pub async fn get(&self, id: ObjectId) -> Result<Object> {
        let request = Request::Get {
            collection: self.name.clone(),
            id,
        };
        match self.client.unary(request).await? {
            Response::Object { id, metadata, data } => {
                Ok(Object::from_metadata(id, data, &metadata))
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Partially update an object.
    ///
    /// `None` data keeps the stored bytes, `tags` are merged into the
    /// existing ones, and a new `acl` requires ownership of the object.
    pub async fn update(
        &self,
        id: ObjectId,
        data: Option<Bytes>,
        tags: Option<&Tags>,
        acl: Option<AclKey>,
    ) -> Result<()> {
        let empty = Tags::new();
        let tags = tags.unwrap_or(&empty);
        validate_tags(tags)?;

        let request = Request::Update {
            id,
            data,
            metadata: self.metadata(tags, acl),
        };
        match self.client.unary(request).await? {
            Response::Empty => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Delete an object. Later reads report it as not found.
    pub async fn delete(&self, id: ObjectId) -> Result<()> {
        let request = Request::Delete {
            collection: self.name.clone(),
            id,
        };
        match self.client.unary(request).await? {
            Response::Empty => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Ids of every object matching all of `tags`.
    pub async fn list(&self, tags: &Tags) -> Result<BoxStream<'static, Result<ObjectId>>> {
        let request = Request::List {
            collection: self.name.clone(),
            tags: tags.to_vec(),
        };
        let replies = self.client.streaming(request).await?;
        let items = replies.map(|reply| match reply? {
            Response::Id { id } => Ok(id),
            other => Err(unexpected(&other)),
        });
        Ok(end_on_error(items).boxed())
    }

    /// Objects matching all of `tags`. Only tags are returned; `data` is
    /// always empty.
    pub async fn find(&self, tags: &Tags) -> Result<BoxStream<'static, Result<Object>>> {
        let request = Request::Find {
            collection: self.name.clone(),
            tags: tags.to_vec(),
        };
        let replies = self.client.streaming(request).await?;
        let items = replies.map(|reply| match reply? {
            Response::Found { id, metadata } => {
                Ok(Object::from_metadata(id, Bytes::new(), &metadata))
            }
            other => Err(unexpected(&other)),
        });
        Ok(end_on_error(items).boxed())
    }
}
