use std::collections::BTreeMap;
use std::fmt;
use std::io;

use bytes::Bytes;
use futures::{stream, StreamExt};

use crate::adapters::BodyStream;
use crate::model::object::{Object, ObjectAttrs};

/// A request to create or overwrite an object, accepted by
/// `Bucket::create_object`.
pub struct CreateObjectRequest {
    /// Attributes for the new object. `attrs.name` must be set; other empty
    /// fields are left to the service.
    ///
    /// Object names must be non-empty, at most 1024 bytes long, and must not
    /// contain a line feed or carriage return.
    pub attrs: ObjectAttrs,

    /// The object's contents. Consumed exactly once by the upload.
    pub contents: BodyStream,

    /// If set, the object is written only when its current generation equals
    /// this value. Zero means the object must not exist yet.
    pub generation_precondition: Option<i64>,
}

impl CreateObjectRequest {
    pub fn new(name: impl Into<String>, contents: BodyStream) -> Self {
        Self {
            attrs: ObjectAttrs::new(name),
            contents,
            generation_precondition: None,
        }
    }

    /// Convenience constructor for contents already held in memory.
    pub fn from_bytes(name: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        Self::new(name, contents_from_bytes(contents))
    }

    pub fn with_precondition(mut self, generation: i64) -> Self {
        self.generation_precondition = Some(generation);
        self
    }
}

impl fmt::Debug for CreateObjectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateObjectRequest")
            .field("attrs", &self.attrs)
            .field("generation_precondition", &self.generation_precondition)
            .finish_non_exhaustive()
    }
}

pub fn contents_from_bytes(contents: impl Into<Bytes>) -> BodyStream {
    let contents: Bytes = contents.into();
    stream::once(async move { Ok::<_, io::Error>(contents) }).boxed()
}

/// A request to read the contents of an object at a particular generation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadObjectRequest {
    pub name: String,

    /// Zero means the latest generation.
    pub generation: i64,
}

impl ReadObjectRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generation: 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatObjectRequest {
    pub name: String,
}

impl StatObjectRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// How a single string field of an object should change in an update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FieldUpdate {
    /// Leave the field untouched.
    #[default]
    Keep,
    /// Remove the field.
    Clear,
    /// Set the field to the given non-empty value.
    Set(String),
}

impl FieldUpdate {
    /// Map the optional-string convention onto a field update: `None` keeps
    /// the field, an empty string clears it, anything else sets it.
    ///
    /// There is no way to set a field to the empty string.
    pub fn from_ptr(value: Option<String>) -> Self {
        match value {
            None => FieldUpdate::Keep,
            Some(v) if v.is_empty() => FieldUpdate::Clear,
            Some(v) => FieldUpdate::Set(v),
        }
    }

    pub fn set(value: impl Into<String>) -> Self {
        Self::from_ptr(Some(value.into()))
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }
}

/// A request to patch the metadata of an existing object, accepted by
/// `Bucket::update_object`.
///
/// The service does not allow the content type to be removed, so
/// `content_type: FieldUpdate::Clear` will be rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateObjectRequest {
    pub name: String,

    pub content_type: FieldUpdate,
    pub content_encoding: FieldUpdate,
    pub content_language: FieldUpdate,
    pub cache_control: FieldUpdate,

    /// User metadata changes. Keys mapped to `None` are deleted, others are
    /// set, and keys not mentioned are untouched.
    pub metadata: Option<BTreeMap<String, Option<String>>>,
}

impl UpdateObjectRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Criteria for a single listing call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub prefix: String,
    pub delimiter: String,

    /// Include non-current generations.
    pub versions: bool,

    /// Page token from a previous listing; empty starts at the beginning.
    pub cursor: String,

    /// Zero lets the service choose.
    pub max_results: u32,
}

/// One page of listing results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Objects {
    pub results: Vec<Object>,

    /// Prefixes collapsed by the query's delimiter.
    pub prefixes: Vec<String>,

    /// The query for the following page, if there is one.
    pub next: Option<Query>,
}
