use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;

/// A single access-control entry on an object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AclRule {
    pub entity: String,
    pub role: String,
}

impl AclRule {
    pub fn new(entity: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            role: role.into(),
        }
    }
}

/// The writable attributes of an object, supplied when creating it.
///
/// Only `name` is required. Empty strings and empty collections are treated
/// as "not specified" and left for the service to fill in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectAttrs {
    pub name: String,
    pub content_type: String,
    pub content_language: String,
    pub content_encoding: String,
    pub cache_control: String,
    pub metadata: BTreeMap<String, String>,
    pub acl: Vec<AclRule>,
}

impl ObjectAttrs {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// The service's view of an object, decoded from a response.
///
/// Values of this type are never sent back to the service; every change is
/// expressed as a new request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Object {
    pub bucket: String,
    pub name: String,
    pub content_type: String,
    pub content_language: String,
    pub content_encoding: String,
    pub cache_control: String,
    pub metadata: BTreeMap<String, String>,
    pub acl: Vec<AclRule>,

    /// Entity of the owner, empty when the service did not report one.
    pub owner: String,
    pub size: u64,
    pub generation: i64,
    pub meta_generation: i64,
    pub storage_class: String,
    pub media_link: String,

    /// Raw MD5 digest of the contents.
    pub md5: Vec<u8>,
    pub crc32c: u32,

    #[serde(with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted: Option<OffsetDateTime>,
}
