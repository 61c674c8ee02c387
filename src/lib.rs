//! A client for buckets in Google Cloud Storage, spoken over the JSON API.

pub mod adapters;
pub mod bucket;
pub mod classify;
pub mod codec;
pub mod config;
pub mod model;
pub mod testing;
pub mod util;

pub use bucket::{new_bucket, Bucket, GcsBucket, ObjectReader};
pub use config::BucketConfig;
pub use model::{
    error::{Error, Result},
    object::{AclRule, Object, ObjectAttrs},
    request::{
        CreateObjectRequest, FieldUpdate, Objects, Query, ReadObjectRequest, StatObjectRequest,
        UpdateObjectRequest,
    },
};
