//! In-memory reference server.
//!
//! Honors the server contract the client is written against: header
//! verification, reserved tags, tombstones, tag merging, and ACL-based
//! access checks. Storage is a pair of maps behind a lock.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;

use bcdb_core::{
    is_reserved, unix_now, Acl, AclKey, Identity, KeyId, Metadata, ObjectId, Permissions,
    StaticKeyRegistry, Tag, TagValue, UserId, Verifier, TAG_CREATED, TAG_SIZE, TAG_UPDATED,
};
use bcdb_transport::{Request, Response, StatusCode, TransportError};

/// Clock skew tolerated by the verifier, in seconds.
pub const DEFAULT_SKEW_SECS: u64 = 60;

/// A request the server refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: StatusCode,
    pub message: String,
}

impl Rejection {
    fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn not_found(what: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::NotFound, format!("{what} not found"))
    }

    fn denied(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PermissionDenied, message)
    }
}

impl From<Rejection> for TransportError {
    fn from(r: Rejection) -> Self {
        TransportError::status(r.code, r.message)
    }
}

type Handled = std::result::Result<Vec<Response>, Rejection>;

#[derive(Debug, Clone)]
struct StoredObject {
    collection: String,
    data: Bytes,
    /// User tags only; reserved tags are derived on read.
    tags: BTreeMap<String, String>,
    acl: Option<AclKey>,
    created: u64,
    updated: u64,
    deleted: bool,
}

impl StoredObject {
    /// User tags plus the reserved `:size`/`:created`/`:updated` tags.
    fn all_tags(&self) -> BTreeMap<String, String> {
        let mut tags = self.tags.clone();
        tags.insert(TAG_SIZE.into(), self.data.len().to_string());
        tags.insert(TAG_CREATED.into(), self.created.to_string());
        tags.insert(TAG_UPDATED.into(), self.updated.to_string());
        tags
    }

    fn metadata(&self) -> Metadata {
        Metadata {
            collection: self.collection.clone(),
            acl: self.acl,
            tags: self
                .all_tags()
                .into_iter()
                .map(|(key, value)| Tag {
                    key,
                    value: TagValue::Str(value),
                })
                .collect(),
        }
    }

    /// Whether every query tag matches. `:acl` matches against the ACL key.
    fn matches(&self, query: &[(String, String)]) -> bool {
        let tags = self.all_tags();
        query.iter().all(|(key, value)| match key.as_str() {
            bcdb_core::TAG_ACL => self.acl.map(|a| a.to_string()).as_ref() == Some(value),
            _ => tags.get(key) == Some(value),
        })
    }
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ObjectId, StoredObject>,
    next_id: ObjectId,
    acls: BTreeMap<AclKey, Acl>,
    next_acl: AclKey,
}

/// Reference BCDB server.
///
/// The identity registered as owner may do anything. Other registered
/// identities are limited to what the ACL on each object grants them.
pub struct MemoryServer {
    owner: KeyId,
    verifier: Verifier<StaticKeyRegistry>,
    state: RwLock<State>,
}

impl MemoryServer {
    /// A server owned by `owner`.
    pub fn new(owner: &Identity) -> Self {
        Self::with_users(owner, &[])
    }

    /// A server owned by `owner` that also knows the keys of `users`.
    pub fn with_users(owner: &Identity, users: &[&Identity]) -> Self {
        let registry = users
            .iter()
            .fold(StaticKeyRegistry::new().with_identity(owner), |reg, user| {
                reg.with_identity(user)
            });
        Self {
            owner: owner.id(),
            verifier: Verifier::new(registry, DEFAULT_SKEW_SECS),
            state: RwLock::new(State {
                next_id: 1,
                next_acl: 1,
                ..State::default()
            }),
        }
    }

    pub fn owner(&self) -> KeyId {
        self.owner
    }

    /// Number of live (not deleted) objects.
    pub fn object_count(&self) -> usize {
        self.read().objects.values().filter(|o| !o.deleted).count()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Authenticate and execute one request.
    ///
    /// Returns every reply the request produces: exactly one for unary
    /// requests, any number for streaming ones.
    pub fn handle(&self, authorization: &str, request: Request) -> Handled {
        let caller = self.verifier.verify(authorization).map_err(|e| {
            tracing::debug!(error = %e, "rejecting header");
            Rejection::new(StatusCode::Unauthenticated, e.to_string())
        })?;
        tracing::trace!(caller, op = request.name(), "handling");

        match request {
            Request::Set { data, metadata } => self.set(caller, data, metadata),
            Request::Get { collection, id } => self.get(caller, Some(collection.as_str()), id),
            Request::Fetch { id } => self.get(caller, None, id),
            Request::Update { id, data, metadata } => self.update(caller, id, data, metadata),
            Request::Delete { collection, id } => self.delete(caller, &collection, id),
            Request::List { collection, tags } => self.query(caller, &collection, &tags, false),
            Request::Find { collection, tags } => self.query(caller, &collection, &tags, true),
            Request::AclCreate { perm, users } => self.acl_create(caller, perm, users),
            Request::AclGet { key } => self.acl_get(caller, key),
            Request::AclSet { key, perm } => self.acl_update(caller, key, |acl| acl.perm = perm),
            Request::AclGrant { key, users } => self.acl_update(caller, key, |acl| {
                acl.grant(&users);
            }),
            Request::AclRevoke { key, users } => self.acl_update(caller, key, |acl| {
                acl.revoke(&users);
            }),
            Request::AclList => self.acl_list(caller),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access
    // ─────────────────────────────────────────────────────────────────────────

    fn is_owner(&self, caller: KeyId) -> bool {
        caller == self.owner
    }

    fn require_owner(&self, caller: KeyId) -> Result<(), Rejection> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(Rejection::denied("operation is restricted to the owner"))
        }
    }

    /// Owner, or a member of the object's ACL holding `required`.
    fn check_access(
        &self,
        state: &State,
        caller: KeyId,
        object: &StoredObject,
        required: Permissions,
    ) -> Result<(), Rejection> {
        if self.is_owner(caller) {
            return Ok(());
        }
        let granted = object
            .acl
            .and_then(|key| state.acls.get(&key))
            .filter(|acl| acl.is_member(caller))
            .map(|acl| acl.perm.allows(required))
            .unwrap_or(false);
        if granted {
            Ok(())
        } else {
            Err(Rejection::denied(format!(
                "missing '{required}' permission"
            )))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Objects
    // ─────────────────────────────────────────────────────────────────────────

    fn set(&self, caller: KeyId, data: Bytes, metadata: Metadata) -> Handled {
        self.require_owner(caller)?;
        let tags = user_tags(&metadata.tags)?;

        let now = unix_now();
        let mut state = self.write();
        let id = state.next_id;
        state.next_id += 1;
        state.objects.insert(
            id,
            StoredObject {
                collection: metadata.collection,
                data,
                tags,
                acl: metadata.acl,
                created: now,
                updated: now,
                deleted: false,
            },
        );
        Ok(vec![Response::Id { id }])
    }

    fn get(&self, caller: KeyId, collection: Option<&str>, id: ObjectId) -> Handled {
        let state = self.read();
        let object = live_object(&state, collection, id)?;
        self.check_access(&state, caller, object, Permissions::READ)?;

        Ok(vec![Response::Object {
            id,
            metadata: object.metadata(),
            data: object.data.clone(),
        }])
    }

    fn update(
        &self,
        caller: KeyId,
        id: ObjectId,
        data: Option<Bytes>,
        metadata: Metadata,
    ) -> Handled {
        let tags = user_tags(&metadata.tags)?;

        let mut state = self.write();
        let object = live_object(&state, Some(metadata.collection.as_str()), id)?;
        self.check_access(&state, caller, object, Permissions::WRITE)?;
        if metadata.acl.is_some() && !self.is_owner(caller) {
            return Err(Rejection::denied("only the owner can change an object's acl"));
        }

        let object = state
            .objects
            .get_mut(&id)
            .ok_or_else(|| Rejection::not_found(format!("object {id}")))?;
        if let Some(data) = data {
            object.data = data;
        }
        object.tags.extend(tags);
        if metadata.acl.is_some() {
            object.acl = metadata.acl;
        }
        object.updated = unix_now();
        Ok(vec![Response::Empty])
    }

    fn delete(&self, caller: KeyId, collection: &str, id: ObjectId) -> Handled {
        let mut state = self.write();
        let object = live_object(&state, Some(collection), id)?;
        self.check_access(&state, caller, object, Permissions::DELETE)?;

        if let Some(object) = state.objects.get_mut(&id) {
            object.deleted = true;
            object.data = Bytes::new();
        }
        Ok(vec![Response::Empty])
    }

    fn query(&self, caller: KeyId, collection: &str, tags: &[Tag], full: bool) -> Handled {
        self.require_owner(caller)?;
        let query: Vec<(String, String)> = tags
            .iter()
            .map(|t| (t.key.clone(), t.value.to_string()))
            .collect();

        let state = self.read();
        let replies = state
            .objects
            .iter()
            .filter(|(_, o)| !o.deleted && o.collection == collection && o.matches(&query))
            .map(|(id, o)| {
                if full {
                    Response::Found {
                        id: *id,
                        metadata: o.metadata(),
                    }
                } else {
                    Response::Id { id: *id }
                }
            })
            .collect();
        Ok(replies)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // ACLs
    // ─────────────────────────────────────────────────────────────────────────

    fn acl_create(&self, caller: KeyId, perm: Permissions, users: Vec<UserId>) -> Handled {
        self.require_owner(caller)?;
        let mut state = self.write();
        let key = state.next_acl;
        state.next_acl += 1;
        state.acls.insert(
            key,
            Acl {
                key,
                perm,
                users: users.into_iter().collect(),
            },
        );
        Ok(vec![Response::AclKey { key }])
    }

    fn acl_get(&self, caller: KeyId, key: AclKey) -> Handled {
        let state = self.read();
        let acl = state
            .acls
            .get(&key)
            .ok_or_else(|| Rejection::not_found(format!("acl {key}")))?;
        if !self.is_owner(caller) && !acl.is_member(caller) {
            return Err(Rejection::denied("not a member of this acl"));
        }
        Ok(vec![Response::Acl { acl: acl.clone() }])
    }

    fn acl_update(&self, caller: KeyId, key: AclKey, change: impl FnOnce(&mut Acl)) -> Handled {
        self.require_owner(caller)?;
        let mut state = self.write();
        let acl = state
            .acls
            .get_mut(&key)
            .ok_or_else(|| Rejection::not_found(format!("acl {key}")))?;
        change(acl);
        Ok(vec![Response::Empty])
    }

    fn acl_list(&self, caller: KeyId) -> Handled {
        let owner = self.is_owner(caller);
        let state = self.read();
        Ok(state
            .acls
            .values()
            .filter(|acl| owner || acl.is_member(caller))
            .map(|acl| Response::Acl { acl: acl.clone() })
            .collect())
    }
}

fn live_object<'s>(
    state: &'s State,
    collection: Option<&str>,
    id: ObjectId,
) -> Result<&'s StoredObject, Rejection> {
    state
        .objects
        .get(&id)
        .filter(|o| !o.deleted)
        .filter(|o| collection.map_or(true, |c| o.collection == c))
        .ok_or_else(|| Rejection::not_found(format!("object {id}")))
}

/// Flatten written tags, rejecting the reserved namespace. Last write wins.
fn user_tags(tags: &[Tag]) -> Result<BTreeMap<String, String>, Rejection> {
    let mut map = BTreeMap::new();
    for tag in tags {
        if is_reserved(&tag.key) {
            return Err(Rejection::new(
                StatusCode::InvalidArgument,
                format!("tag '{}' is reserved", tag.key),
            ));
        }
        map.insert(tag.key.clone(), tag.value.to_string());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bcdb_core::{AuthHeaderBuilder, ValidityWindow};
    use std::collections::BTreeSet;

    fn memberships(server: &MemoryServer, user: UserId) -> BTreeSet<AclKey> {
        server
            .read()
            .acls
            .values()
            .filter(|acl| acl.is_member(user))
            .map(|acl| acl.key)
            .collect()
    }

    fn auth(identity: &Identity) -> String {
        AuthHeaderBuilder::new(identity, ValidityWindow::from_secs(60).unwrap())
            .build()
            .render()
    }

    fn owner() -> Identity {
        Identity::from_entropy(1, &[1u8; 32]).unwrap()
    }

    fn metadata(tags: Vec<Tag>) -> Metadata {
        Metadata {
            collection: "files".into(),
            acl: None,
            tags,
        }
    }

    #[test]
    fn test_unauthenticated() {
        let server = MemoryServer::new(&owner());
        let stranger = Identity::from_entropy(2, &[2u8; 32]).unwrap();

        let err = server
            .handle(&auth(&stranger), Request::AclList)
            .unwrap_err();
        assert_eq!(err.code, StatusCode::Unauthenticated);

        let err = server.handle("garbage", Request::AclList).unwrap_err();
        assert_eq!(err.code, StatusCode::Unauthenticated);
    }

    #[test]
    fn test_reserved_tags_rejected() {
        let owner = owner();
        let server = MemoryServer::new(&owner);
        let err = server
            .handle(
                &auth(&owner),
                Request::Set {
                    data: Bytes::new(),
                    metadata: metadata(vec![Tag::new(":size", "1")]),
                },
            )
            .unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);
        assert_eq!(server.object_count(), 0);
    }

    #[test]
    fn test_acl_member_access() {
        let owner = owner();
        let reader = Identity::from_entropy(2, &[2u8; 32]).unwrap();
        let server = MemoryServer::with_users(&owner, &[&reader]);
        let owner_auth = auth(&owner);

        let key = match server
            .handle(
                &owner_auth,
                Request::AclCreate {
                    perm: "r--".parse().unwrap(),
                    users: vec![2],
                },
            )
            .unwrap()
            .remove(0)
        {
            Response::AclKey { key } => key,
            other => panic!("unexpected {other:?}"),
        };

        let mut guarded = metadata(vec![]);
        guarded.acl = Some(key);
        server
            .handle(
                &owner_auth,
                Request::Set {
                    data: Bytes::from_static(b"x"),
                    metadata: guarded,
                },
            )
            .unwrap();

        let reader_auth = auth(&reader);
        assert!(server
            .handle(&reader_auth, Request::Fetch { id: 1 })
            .is_ok());
        let err = server
            .handle(
                &reader_auth,
                Request::Delete {
                    collection: "files".into(),
                    id: 1,
                },
            )
            .unwrap_err();
        assert_eq!(err.code, StatusCode::PermissionDenied);
        assert_eq!(memberships(&server, 2), BTreeSet::from([key]));
    }

    #[test]
    fn test_get_wrong_collection_is_not_found() {
        let owner = owner();
        let server = MemoryServer::new(&owner);
        let owner_auth = auth(&owner);
        server
            .handle(
                &owner_auth,
                Request::Set {
                    data: Bytes::new(),
                    metadata: metadata(vec![]),
                },
            )
            .unwrap();

        let err = server
            .handle(
                &owner_auth,
                Request::Get {
                    collection: "other".into(),
                    id: 1,
                },
            )
            .unwrap_err();
        assert_eq!(err.code, StatusCode::NotFound);
    }
}
