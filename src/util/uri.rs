use crate::model::error::Error;

/// A `gs://bucket/object` location given on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectUri {
    pub bucket: String,
    pub object: String,
}

pub fn parse_object_uri(uri: &str) -> Result<ObjectUri, Error> {
    let rest = uri
        .strip_prefix("gs://")
        .ok_or_else(|| Error::InvalidRequest(format!("failed to parse provider of: {}", uri)))?;

    let (bucket, object) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(Error::InvalidRequest(format!(
            "failed to parse bucket of: {}",
            uri
        )));
    }

    Ok(ObjectUri {
        bucket: bucket.to_string(),
        object: object.to_string(),
    })
}
