//! Wire shapes of the JSON API's object resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An integer the service may send either as a JSON number or, for 64-bit
/// fields, as decimal text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawInt {
    Number(i64),
    Text(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAcl {
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOwner {
    #[serde(default)]
    pub entity: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObject {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_language: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_encoding: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cache_control: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<Vec<RawAcl>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<RawOwner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<RawInt>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<RawInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metageneration: Option<RawInt>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_class: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub md5_hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub crc32c: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub time_created: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub time_deleted: String,
}

/// Response body of an objects listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObjects {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<RawObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefixes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// The JSON error envelope carried by non-2xx responses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawErrorBody {
    pub error: RawErrorDetail,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawErrorDetail {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}
