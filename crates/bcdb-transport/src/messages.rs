//! Wire message types.
//!
//! Both transports speak these messages: the RPC transport serializes them
//! directly into frames, the HTTP transport maps them onto routes.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use bcdb_core::{Acl, AclKey, Metadata, ObjectId, Permissions, Tag, UserId};

/// A request to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Store a new object. `metadata` carries the collection, tags and ACL.
    Set { data: Bytes, metadata: Metadata },
    Get { collection: String, id: ObjectId },
    /// Get an object by id from any collection.
    Fetch { id: ObjectId },
    /// Partial update. `None` data keeps the stored bytes.
    Update {
        id: ObjectId,
        data: Option<Bytes>,
        metadata: Metadata,
    },
    Delete { collection: String, id: ObjectId },
    List { collection: String, tags: Vec<Tag> },
    Find { collection: String, tags: Vec<Tag> },

    AclCreate { perm: Permissions, users: Vec<UserId> },
    AclGet { key: AclKey },
    AclSet { key: AclKey, perm: Permissions },
    AclGrant { key: AclKey, users: Vec<UserId> },
    AclRevoke { key: AclKey, users: Vec<UserId> },
    AclList,
}

impl Request {
    /// Operation name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Set { .. } => "set",
            Request::Get { .. } => "get",
            Request::Fetch { .. } => "fetch",
            Request::Update { .. } => "update",
            Request::Delete { .. } => "delete",
            Request::List { .. } => "list",
            Request::Find { .. } => "find",
            Request::AclCreate { .. } => "acl.create",
            Request::AclGet { .. } => "acl.get",
            Request::AclSet { .. } => "acl.set",
            Request::AclGrant { .. } => "acl.grant",
            Request::AclRevoke { .. } => "acl.revoke",
            Request::AclList => "acl.list",
        }
    }

    /// The collection the request is scoped to, if any.
    pub fn collection(&self) -> Option<&str> {
        match self {
            Request::Set { metadata, .. } | Request::Update { metadata, .. } => {
                Some(&metadata.collection)
            }
            Request::Get { collection, .. }
            | Request::Delete { collection, .. }
            | Request::List { collection, .. }
            | Request::Find { collection, .. } => Some(collection),
            _ => None,
        }
    }

    /// Whether the server answers with a stream of replies.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            Request::List { .. } | Request::Find { .. } | Request::AclList
        )
    }
}

/// A single reply from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// An object id: the result of `Set`, or one item of a `List` stream.
    Id { id: ObjectId },
    /// A full object: the result of `Get` and `Fetch`.
    Object {
        id: ObjectId,
        metadata: Metadata,
        data: Bytes,
    },
    /// One item of a `Find` stream.
    Found { id: ObjectId, metadata: Metadata },
    /// The result of `AclCreate`.
    AclKey { key: AclKey },
    /// The result of `AclGet`, or one item of an `AclList` stream.
    Acl { acl: Acl },
    /// Success with nothing to return.
    Empty,
}

impl Response {
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Id { .. } => "id",
            Response::Object { .. } => "object",
            Response::Found { .. } => "found",
            Response::AclKey { .. } => "acl-key",
            Response::Acl { .. } => "acl",
            Response::Empty => "empty",
        }
    }
}

/// Error status reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    Internal,
}

impl StatusCode {
    /// Map an HTTP status onto a server status.
    pub fn from_http(status: u16) -> Self {
        match status {
            400 => StatusCode::InvalidArgument,
            401 => StatusCode::Unauthenticated,
            403 => StatusCode::PermissionDenied,
            404 => StatusCode::NotFound,
            _ => StatusCode::Internal,
        }
    }

    /// The HTTP status a server uses for this code.
    pub fn to_http(self) -> u16 {
        match self {
            StatusCode::InvalidArgument => 400,
            StatusCode::Unauthenticated => 401,
            StatusCode::PermissionDenied => 403,
            StatusCode::NotFound => 404,
            StatusCode::Internal => 500,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::InvalidArgument => "invalid argument",
            StatusCode::Unauthenticated => "unauthenticated",
            StatusCode::PermissionDenied => "permission denied",
            StatusCode::NotFound => "not found",
            StatusCode::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// What the client writes on an RPC connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The rendered `Signature ...` header value.
    pub authorization: String,
    /// Peer that should serve the request, if not the one connected to.
    pub route: Option<u64>,
    pub request: Request,
}

/// What the server writes back on an RPC connection.
///
/// Zero or more `Reply` frames, terminated by `End` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    Reply(Response),
    End,
    Error { code: StatusCode, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(StatusCode::from_http(400), StatusCode::InvalidArgument);
        assert_eq!(StatusCode::from_http(401), StatusCode::Unauthenticated);
        assert_eq!(StatusCode::from_http(403), StatusCode::PermissionDenied);
        assert_eq!(StatusCode::from_http(404), StatusCode::NotFound);
        assert_eq!(StatusCode::from_http(409), StatusCode::Internal);
        assert_eq!(StatusCode::from_http(502), StatusCode::Internal);

        for code in [
            StatusCode::InvalidArgument,
            StatusCode::Unauthenticated,
            StatusCode::PermissionDenied,
            StatusCode::NotFound,
            StatusCode::Internal,
        ] {
            assert_eq!(StatusCode::from_http(code.to_http()), code);
        }
    }

    #[test]
    fn test_streaming_requests() {
        let list = Request::List {
            collection: "c".into(),
            tags: vec![],
        };
        assert!(list.is_streaming());
        assert!(Request::AclList.is_streaming());
        assert!(!Request::Fetch { id: 1 }.is_streaming());
    }

    #[test]
    fn test_collection_scope() {
        let update = Request::Update {
            id: 1,
            data: None,
            metadata: Metadata {
                collection: "files".into(),
                ..Default::default()
            },
        };
        assert_eq!(update.collection(), Some("files"));
        assert_eq!(Request::AclGet { key: 1 }.collection(), None);
    }
}
