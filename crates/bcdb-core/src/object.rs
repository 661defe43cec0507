//! Object data model.
//!
//! Objects carry opaque data plus a flat string tag map. Tags whose key
//! starts with `:` form a reserved namespace maintained by the server.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Object id, unique within a server.
pub type ObjectId = u32;

/// Key of an ACL object.
pub type AclKey = u64;

/// A user id as it appears in ACL membership lists.
pub type UserId = u64;

/// Prefix of the reserved tag namespace.
pub const RESERVED_PREFIX: char = ':';

pub const TAG_ACL: &str = ":acl";
pub const TAG_SIZE: &str = ":size";
pub const TAG_CREATED: &str = ":created";
pub const TAG_UPDATED: &str = ":updated";

/// Whether a tag key belongs to the server-owned namespace.
pub fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

/// A typed tag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagValue {
    Str(String),
    Double(f64),
    Int(i64),
    Uint(u64),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Str(s) => f.write_str(s),
            TagValue::Double(v) => write!(f, "{v}"),
            TagValue::Int(v) => write!(f, "{v}"),
            TagValue::Uint(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::Str(s.to_string())
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        TagValue::Str(s)
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Double(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl From<u64> for TagValue {
    fn from(v: u64) -> Self {
        TagValue::Uint(v)
    }
}

/// A single key/value tag as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: TagValue,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Request-side metadata for an object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub collection: String,
    pub acl: Option<AclKey>,
    /// Ordered tags. On duplicate keys the last one wins.
    pub tags: Vec<Tag>,
}

impl Metadata {
    /// Flatten the tags into the string map exposed on [`Object`].
    ///
    /// A set `acl` is mirrored into the reserved `:acl` tag.
    pub fn tag_map(&self) -> BTreeMap<String, String> {
        let mut map: BTreeMap<String, String> = self
            .tags
            .iter()
            .map(|t| (t.key.clone(), t.value.to_string()))
            .collect();
        if let Some(acl) = self.acl {
            map.insert(TAG_ACL.to_string(), acl.to_string());
        }
        map
    }
}

/// A caller-facing tag set.
///
/// Backed by a sorted map so the wire order is deterministic and duplicate
/// keys collapse to the last inserted value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tags(BTreeMap<String, TagValue>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TagValue>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The ordered wire form.
    pub fn to_vec(&self) -> Vec<Tag> {
        self.0
            .iter()
            .map(|(k, v)| Tag {
                key: k.clone(),
                value: v.clone(),
            })
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Tags
where
    K: Into<String>,
    V: Into<TagValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A stored object as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    pub data: Bytes,
    /// User tags plus the reserved tags.
    pub tags: BTreeMap<String, String>,
}

impl Object {
    /// Assemble an object from the server's metadata and data.
    pub fn from_metadata(id: ObjectId, data: Bytes, metadata: &Metadata) -> Self {
        Self {
            id,
            data,
            tags: metadata.tag_map(),
        }
    }

    /// The ACL guarding this object, if any.
    pub fn acl(&self) -> Option<AclKey> {
        self.tags.get(TAG_ACL).and_then(|v| v.parse().ok())
    }

    /// Stored data size in bytes, 0 when unknown.
    pub fn size(&self) -> u64 {
        self.reserved_u64(TAG_SIZE)
    }

    /// Creation time in unix seconds, 0 when unknown.
    pub fn created(&self) -> u64 {
        self.reserved_u64(TAG_CREATED)
    }

    /// Last update time in unix seconds, 0 when unknown.
    pub fn updated(&self) -> u64 {
        self.reserved_u64(TAG_UPDATED)
    }

    /// A user tag value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    fn reserved_u64(&self, key: &str) -> u64 {
        self.tags
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_last_write_wins_and_sorted() {
        let mut tags = Tags::new();
        tags.insert("b", "1").insert("a", 2i64).insert("b", "3");

        let wire = tags.to_vec();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0], Tag::new("a", 2i64));
        assert_eq!(wire[1], Tag::new("b", "3"));
    }

    #[test]
    fn test_tag_value_rendering() {
        assert_eq!(TagValue::from("x").to_string(), "x");
        assert_eq!(TagValue::from(-4i64).to_string(), "-4");
        assert_eq!(TagValue::from(7u64).to_string(), "7");
        assert_eq!(TagValue::from(1.5f64).to_string(), "1.5");
    }

    #[test]
    fn test_reserved_namespace() {
        assert!(is_reserved(":acl"));
        assert!(is_reserved(":anything"));
        assert!(!is_reserved("acl"));
        assert!(!is_reserved("a:b"));
    }

    #[test]
    fn test_reserved_properties() {
        let metadata = Metadata {
            collection: "files".into(),
            acl: Some(12),
            tags: vec![
                Tag::new("name", "report"),
                Tag::new(TAG_SIZE, "5"),
                Tag::new(TAG_CREATED, "1700000000"),
            ],
        };
        let object = Object::from_metadata(3, Bytes::from_static(b"hello"), &metadata);

        assert_eq!(object.acl(), Some(12));
        assert_eq!(object.size(), 5);
        assert_eq!(object.created(), 1_700_000_000);
        assert_eq!(object.updated(), 0);
        assert_eq!(object.tag("name"), Some("report"));
    }

    #[test]
    fn test_missing_reserved_tags_default() {
        let object = Object {
            id: 1,
            data: Bytes::new(),
            tags: BTreeMap::new(),
        };
        assert_eq!(object.acl(), None);
        assert_eq!(object.size(), 0);
        assert_eq!(object.created(), 0);
    }
}
