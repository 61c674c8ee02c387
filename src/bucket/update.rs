use bytes::Bytes;
use reqwest::{
    header::{HeaderValue, CONTENT_TYPE},
    Method,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    adapters::Body,
    bucket::GcsBucket,
    classify,
    model::{
        error::Result,
        object::Object,
        request::{FieldUpdate, UpdateObjectRequest},
    },
};

fn insert_field(patch: &mut Map<String, Value>, key: &str, update: &FieldUpdate) {
    match update {
        FieldUpdate::Keep => {}
        FieldUpdate::Clear => {
            patch.insert(key.to_string(), Value::Null);
        }
        FieldUpdate::Set(value) => {
            patch.insert(key.to_string(), Value::String(value.clone()));
        }
    }
}

/// Build the sparse patch body: untouched fields are absent, cleared fields
/// are `null`, and deleted metadata keys map to `null`.
pub(crate) fn patch_body(req: &UpdateObjectRequest) -> Value {
    let mut patch = Map::new();

    insert_field(&mut patch, "contentType", &req.content_type);
    insert_field(&mut patch, "contentEncoding", &req.content_encoding);
    insert_field(&mut patch, "contentLanguage", &req.content_language);
    insert_field(&mut patch, "cacheControl", &req.cache_control);

    if let Some(metadata) = &req.metadata {
        let delta = metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().map_or(Value::Null, Value::String)))
            .collect();
        patch.insert("metadata".to_string(), Value::Object(delta));
    }

    Value::Object(patch)
}

pub(crate) async fn update_object(bucket: &GcsBucket, req: &UpdateObjectRequest) -> Result<Object> {
    debug!(bucket=%bucket.config.name, object=%req.name, "called");

    let body = serde_json::to_vec(&patch_body(req))?;
    let url = bucket.object_resource_url(&req.name, true)?;
    let http_req = bucket
        .request(Method::PATCH, url)?
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .body(Body::Full(Bytes::from(body)));

    let res = bucket.execute(http_req).await?;
    let res = classify::checked(res).await?;

    bucket.decode_object(res).await
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::bucket::{
        tests::{mock_bucket, object_json},
        Bucket,
    };

    #[test]
    fn test_patch_body() {
        let cases = vec![
            (UpdateObjectRequest::new("o"), json!({})),
            (
                UpdateObjectRequest {
                    content_type: FieldUpdate::set("text/plain"),
                    ..UpdateObjectRequest::new("o")
                },
                json!({"contentType": "text/plain"}),
            ),
            (
                UpdateObjectRequest {
                    content_type: FieldUpdate::from_ptr(Some(String::new())),
                    ..UpdateObjectRequest::new("o")
                },
                json!({"contentType": null}),
            ),
            (
                UpdateObjectRequest {
                    content_encoding: FieldUpdate::from_ptr(Some(String::new())),
                    content_language: FieldUpdate::set("de"),
                    cache_control: FieldUpdate::Clear,
                    ..UpdateObjectRequest::new("o")
                },
                json!({"contentEncoding": null, "contentLanguage": "de", "cacheControl": null}),
            ),
            (
                UpdateObjectRequest {
                    metadata: Some(BTreeMap::from([
                        ("keep".to_string(), Some("v".to_string())),
                        ("drop".to_string(), None),
                    ])),
                    ..UpdateObjectRequest::new("o")
                },
                json!({"metadata": {"keep": "v", "drop": null}}),
            ),
            (
                UpdateObjectRequest {
                    metadata: Some(BTreeMap::new()),
                    ..UpdateObjectRequest::new("o")
                },
                json!({"metadata": {}}),
            ),
        ];

        for (req, expected) in cases {
            assert_eq!(patch_body(&req), expected, "failed for case: {:?}", req);
        }
    }

    #[tokio::test]
    async fn test_update_object() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_json(StatusCode::OK, object_json("foo/bar"));

        let req = UpdateObjectRequest {
            content_type: FieldUpdate::set("text/plain"),
            ..UpdateObjectRequest::new("foo/bar")
        };
        let o = bucket.update_object(&req).await.unwrap();
        assert_eq!(o.name, "foo/bar");
        assert_eq!(o.content_type, "text/plain");

        let sent = mock.requests();
        assert_eq!(sent[0].method, Method::PATCH);
        assert_eq!(
            sent[0].url.as_str(),
            "https://www.googleapis.com/storage/v1/b/some-bucket/o/foo%2Fbar?projection=full"
        );
        assert_eq!(sent[0].header("content-type"), Some("application/json"));
        assert_eq!(sent[0].json(), json!({"contentType": "text/plain"}));
    }

    #[tokio::test]
    async fn test_update_object_not_found() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_error(StatusCode::NOT_FOUND, "No such object");

        let err = bucket
            .update_object(&UpdateObjectRequest::new("missing"))
            .await
            .unwrap_err();

        assert!(err.is_not_found(), "{:?}", err);
    }
}
