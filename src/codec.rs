//! Translation between [`Object`]/[`ObjectAttrs`] and the JSON API's object
//! resource.
//!
//! Decoding is all-or-nothing: checksums and generations are used for
//! integrity and concurrency control, so any field that fails to decode fails
//! the whole object.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::model::{
    error::DecodeError,
    object::{AclRule, Object, ObjectAttrs},
    raw::{RawAcl, RawInt, RawObject},
};

fn to_raw_acls(rules: &[AclRule]) -> Vec<RawAcl> {
    rules
        .iter()
        .map(|rule| RawAcl {
            entity: rule.entity.clone(),
            role: rule.role.clone(),
        })
        .collect()
}

fn from_raw_acls(rules: Vec<RawAcl>) -> Vec<AclRule> {
    rules
        .into_iter()
        .map(|rule| AclRule {
            entity: rule.entity,
            role: rule.role,
        })
        .collect()
}

/// Build the object resource sent when initiating an upload. Server-assigned
/// fields (size, checksums, timestamps, generations) are never set.
pub fn to_raw_object(bucket: &str, attrs: &ObjectAttrs) -> RawObject {
    RawObject {
        bucket: bucket.to_string(),
        name: attrs.name.clone(),
        content_type: attrs.content_type.clone(),
        content_language: attrs.content_language.clone(),
        content_encoding: attrs.content_encoding.clone(),
        cache_control: attrs.cache_control.clone(),
        acl: (!attrs.acl.is_empty()).then(|| to_raw_acls(&attrs.acl)),
        metadata: (!attrs.metadata.is_empty()).then(|| attrs.metadata.clone()),
        ..Default::default()
    }
}

pub fn serialize_metadata(bucket: &str, attrs: &ObjectAttrs) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&to_raw_object(bucket, attrs))
}

fn from_rfc3339(field: &'static str, s: &str) -> Result<Option<OffsetDateTime>, DecodeError> {
    if s.is_empty() {
        return Ok(None);
    }

    OffsetDateTime::parse(s, &Rfc3339)
        .map(Some)
        .map_err(|source| DecodeError::Timestamp { field, source })
}

fn from_raw_int(field: &'static str, value: Option<RawInt>) -> Result<i64, DecodeError> {
    match value {
        None => Ok(0),
        Some(RawInt::Number(n)) => Ok(n),
        Some(RawInt::Text(s)) => s
            .parse()
            .map_err(|_| DecodeError::Integer { field, value: s }),
    }
}

fn from_raw_size(value: Option<RawInt>) -> Result<u64, DecodeError> {
    match value {
        None => Ok(0),
        Some(RawInt::Number(n)) => u64::try_from(n).map_err(|_| DecodeError::Integer {
            field: "size",
            value: n.to_string(),
        }),
        Some(RawInt::Text(s)) => s.parse().map_err(|_| DecodeError::Integer {
            field: "size",
            value: s,
        }),
    }
}

fn decode_base64(field: &'static str, s: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD
        .decode(s)
        .map_err(|source| DecodeError::Base64 { field, source })
}

/// Decode a base64 CRC32C value: exactly four bytes, most significant first.
pub fn decode_crc32c(s: &str) -> Result<u32, DecodeError> {
    let raw = decode_base64("crc32c", s)?;
    let bytes: [u8; 4] = raw
        .as_slice()
        .try_into()
        .map_err(|_| DecodeError::Crc32cLength(raw.len()))?;

    Ok(u32::from_be_bytes(bytes))
}

/// Decode an object resource returned by the service. `bucket` is the name
/// of the bucket the request was made against.
pub fn from_raw_object(bucket: &str, raw: RawObject) -> Result<Object, DecodeError> {
    Ok(Object {
        bucket: bucket.to_string(),
        size: from_raw_size(raw.size)?,
        generation: from_raw_int("generation", raw.generation)?,
        meta_generation: from_raw_int("metageneration", raw.metageneration)?,
        created: from_rfc3339("timeCreated", &raw.time_created)?,
        updated: from_rfc3339("updated", &raw.updated)?,
        deleted: from_rfc3339("timeDeleted", &raw.time_deleted)?,
        md5: decode_base64("md5Hash", &raw.md5_hash)?,
        crc32c: decode_crc32c(&raw.crc32c)?,
        owner: raw.owner.map(|owner| owner.entity).unwrap_or_default(),
        acl: from_raw_acls(raw.acl.unwrap_or_default()),
        metadata: raw.metadata.unwrap_or_default(),
        name: raw.name,
        content_type: raw.content_type,
        content_language: raw.content_language,
        content_encoding: raw.content_encoding,
        cache_control: raw.cache_control,
        storage_class: raw.storage_class,
        media_link: raw.media_link,
    })
}
