use reqwest::Method;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::{
    bucket::{check_name_segment, GcsBucket, ObjectReader},
    classify,
    model::{error::Result, request::ReadObjectRequest},
    util::path::encode_segment,
};

/// The direct download URL for an object. Bucket and object names are each
/// encoded as a single path segment, so a `/` in an object name never turns
/// into a path separator.
pub(crate) fn read_url(storage_host: &str, bucket: &str, req: &ReadObjectRequest) -> String {
    let mut url = format!(
        "https://{}/{}/{}",
        storage_host,
        encode_segment(bucket),
        encode_segment(&req.name)
    );

    if req.generation != 0 {
        url.push_str(&format!("?generation={}", req.generation));
    }

    url
}

pub(crate) async fn new_reader(
    bucket: &GcsBucket,
    req: &ReadObjectRequest,
) -> Result<ObjectReader> {
    debug!(bucket=%bucket.config.name, object=%req.name, generation=req.generation, "called");

    check_name_segment(&req.name)?;

    let url = bucket.parse_url(&read_url(&bucket.config.storage_host, &bucket.config.name, req))?;
    let http_req = bucket.request(Method::GET, url)?;

    let res = bucket.execute(http_req).await?;
    let res = classify::checked(res).await?;

    Ok(StreamReader::new(res.body))
}
