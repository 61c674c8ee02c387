use bytes::Bytes;
use reqwest::{
    header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION},
    Method,
};
use tracing::debug;

use crate::{
    adapters::Body,
    bucket::{check_name_segment, GcsBucket},
    classify, codec,
    model::{
        error::{Error, Result},
        object::Object,
        request::CreateObjectRequest,
    },
    util::path::encode_segment,
};

const MAX_OBJECT_NAME_LEN: usize = 1024;

/// Used when the caller gives no content type. Requests carrying
/// `ifGenerationMatch` are rejected by the service if the type is missing.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const X_UPLOAD_CONTENT_TYPE: HeaderName = HeaderName::from_static("x-upload-content-type");

/// Check an object name locally. UTF-8 validity is guaranteed by `&str`; the
/// JSON encoder cannot be relied on to reject anything else.
pub fn validate_object_name(name: &str) -> Result<()> {
    check_name_segment(name)?;

    if name.len() > MAX_OBJECT_NAME_LEN {
        return Err(Error::InvalidRequest(format!(
            "invalid object name: {} bytes exceeds the limit of {}",
            name.len(),
            MAX_OBJECT_NAME_LEN
        )));
    }

    if name.contains(['\n', '\r']) {
        return Err(Error::InvalidRequest(
            "invalid object name: contains a line feed or carriage return".into(),
        ));
    }

    Ok(())
}

pub(crate) fn upload_url(upload_host: &str, bucket: &str, precondition: Option<i64>) -> String {
    let mut url = format!(
        "https://{}/upload/storage/v1/b/{}/o?uploadType=resumable&projection=full",
        upload_host,
        encode_segment(bucket)
    );

    if let Some(generation) = precondition {
        url.push_str(&format!("&ifGenerationMatch={}", generation));
    }

    url
}

pub(crate) async fn create_object(bucket: &GcsBucket, req: CreateObjectRequest) -> Result<Object> {
    debug!(
        bucket=%bucket.config.name,
        object=%req.attrs.name,
        precondition=?req.generation_precondition,
        "called"
    );

    validate_object_name(&req.attrs.name)?;

    let content_type = if req.attrs.content_type.is_empty() {
        DEFAULT_CONTENT_TYPE
    } else {
        req.attrs.content_type.as_str()
    };
    let content_type = HeaderValue::from_str(content_type).map_err(|_| {
        Error::InvalidRequest(format!("invalid content type: {:?}", content_type))
    })?;

    // Initiate a resumable upload session with the object's metadata.
    let url = bucket.parse_url(&upload_url(
        &bucket.config.upload_host,
        &bucket.config.name,
        req.generation_precondition,
    ))?;

    let metadata = codec::serialize_metadata(&bucket.config.name, &req.attrs)?;
    let http_req = bucket
        .request(Method::POST, url)?
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .header(X_UPLOAD_CONTENT_TYPE, content_type.clone())
        .body(Body::Full(Bytes::from(metadata)));

    let res = bucket.execute(http_req).await?;
    let res = classify::checked(res).await?;

    let location = res
        .headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Protocol("expected a Location header for the upload session".into()))?
        .to_string();
    drop(res);

    debug!(object=%req.attrs.name, location=%location, "upload session started");

    // Send the contents to the session. The object only comes into existence
    // once the whole body has been accepted.
    let url = bucket
        .parse_url(&location)
        .map_err(|_| Error::Protocol(format!("invalid upload location: {}", location)))?;

    let http_req = bucket
        .request(Method::PUT, url)?
        .header(CONTENT_TYPE, content_type)
        .body(Body::Stream(req.contents));

    let res = bucket.execute(http_req).await?;
    let res = classify::checked(res).await?;

    bucket.decode_object(res).await
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io;

    use futures::{stream, StreamExt};
    use reqwest::StatusCode;

    use super::*;
    use crate::adapters::TransportError;
    use crate::bucket::{
        tests::{mock_bucket, object_json},
        Bucket,
    };
    use crate::model::object::AclRule;

    const SESSION: &str =
        "https://www.googleapis.com/upload/storage/v1/b/some-bucket/o?uploadType=resumable&upload_id=xyz";

    #[test]
    fn test_validate_object_name() {
        let long = "a".repeat(1024);
        let too_long = "a".repeat(1025);
        let cases = vec![
            ("foo", true),
            ("foo/bar baz", true),
            ("타코", true),
            (long.as_str(), true),
            ("", false),
            (".", false),
            ("..", false),
            ("...", true),
            ("./foo", true),
            (too_long.as_str(), false),
            ("foo\nbar", false),
            ("foo\rbar", false),
        ];

        for (name, ok) in cases {
            assert_eq!(validate_object_name(name).is_ok(), ok, "failed for case: {:?}", name);
        }
    }

    #[test]
    fn test_upload_url() {
        let cases = vec![
            (
                "b",
                None,
                "https://www.googleapis.com/upload/storage/v1/b/b/o?uploadType=resumable&projection=full",
            ),
            (
                "b",
                Some(0),
                "https://www.googleapis.com/upload/storage/v1/b/b/o?uploadType=resumable&projection=full&ifGenerationMatch=0",
            ),
            (
                "b c",
                Some(1234),
                "https://www.googleapis.com/upload/storage/v1/b/b%20c/o?uploadType=resumable&projection=full&ifGenerationMatch=1234",
            ),
        ];

        for (b, precondition, expected) in cases {
            let result = upload_url("www.googleapis.com", b, precondition);
            assert_eq!(result, expected, "failed for case: {:?}", precondition);
        }
    }

    #[tokio::test]
    async fn test_create_object() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_response(StatusCode::OK, &[("location", SESSION)], "");
        mock.push_json(StatusCode::OK, object_json("foo"));

        let mut req = CreateObjectRequest::from_bytes("foo", "taco").with_precondition(0);
        req.attrs.metadata = BTreeMap::from([("k".to_string(), "v".to_string())]);
        req.attrs.acl = vec![AclRule::new("allUsers", "READER")];

        let o = bucket.create_object(req).await.unwrap();
        assert_eq!(o.name, "foo");
        assert_eq!(o.generation, 17);
        assert_eq!(o.crc32c, 0x01020304);

        let sent = mock.requests();
        assert_eq!(sent.len(), 2);

        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(
            sent[0].url.as_str(),
            "https://www.googleapis.com/upload/storage/v1/b/some-bucket/o?uploadType=resumable&projection=full&ifGenerationMatch=0"
        );
        assert_eq!(sent[0].header("content-type"), Some("application/json"));
        assert_eq!(sent[0].header("x-upload-content-type"), Some("application/octet-stream"));
        assert_eq!(
            sent[0].json(),
            serde_json::json!({
                "bucket": "some-bucket",
                "name": "foo",
                "metadata": {"k": "v"},
                "acl": [{"entity": "allUsers", "role": "READER"}],
            })
        );

        assert_eq!(sent[1].method, Method::PUT);
        assert_eq!(sent[1].url.as_str(), SESSION);
        assert_eq!(sent[1].header("content-type"), Some("application/octet-stream"));
        assert_eq!(sent[1].body.as_ref(), b"taco");
    }

    #[tokio::test]
    async fn test_create_object_explicit_content_type() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_response(StatusCode::OK, &[("location", SESSION)], "");
        mock.push_json(StatusCode::OK, object_json("foo"));

        let mut req = CreateObjectRequest::from_bytes("foo", "taco");
        req.attrs.content_type = "text/plain".to_string();
        bucket.create_object(req).await.unwrap();

        let sent = mock.requests();
        assert!(!sent[0].url.as_str().contains("ifGenerationMatch"));
        assert_eq!(sent[0].header("x-upload-content-type"), Some("text/plain"));
        assert_eq!(sent[0].json()["contentType"], "text/plain");
        assert_eq!(sent[1].header("content-type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_create_object_invalid_name_sends_nothing() {
        let (mock, bucket) = mock_bucket("some-bucket");

        let err = bucket
            .create_object(CreateObjectRequest::from_bytes("foo\nbar", "taco"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidRequest(_)), "{:?}", err);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_create_object_missing_location() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_response(StatusCode::OK, &[], "");

        let err = bucket
            .create_object(CreateObjectRequest::from_bytes("foo", "taco"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Protocol(_)), "{:?}", err);
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_create_object_initiate_failure() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_error(StatusCode::FORBIDDEN, "denied");

        let err = bucket
            .create_object(CreateObjectRequest::from_bytes("foo", "taco"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Service(ref e) if e.code == StatusCode::FORBIDDEN));
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_create_object_precondition_failed() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_response(StatusCode::OK, &[("location", SESSION)], "");
        mock.push_error(StatusCode::PRECONDITION_FAILED, "Precondition Failed");

        let err = bucket
            .create_object(CreateObjectRequest::from_bytes("foo", "taco").with_precondition(0))
            .await
            .unwrap_err();

        assert!(err.is_precondition(), "{:?}", err);
        assert!(matches!(
            err.cause(),
            Error::Service(e) if e.code == StatusCode::PRECONDITION_FAILED
        ));
    }

    #[tokio::test]
    async fn test_create_object_contents_error() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_response(StatusCode::OK, &[("location", SESSION)], "");

        let contents = stream::iter(vec![
            Ok(Bytes::from_static(b"tac")),
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire")),
        ])
        .boxed();

        let err = bucket
            .create_object(CreateObjectRequest::new("foo", contents))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_create_object_bad_response_body() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_response(StatusCode::OK, &[("location", SESSION)], "");
        mock.push_json(
            StatusCode::OK,
            serde_json::json!({"name": "foo", "crc32c": "AQID"}),
        );

        let err = bucket
            .create_object(CreateObjectRequest::from_bytes("foo", "taco"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Decode(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_create_object_transport_error() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_transport_error(TransportError::new("connection refused"));

        let err = bucket
            .create_object(CreateObjectRequest::from_bytes("foo", "taco"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)), "{:?}", err);
    }
}
