use reqwest::Method;
use tracing::debug;

use crate::{
    bucket::GcsBucket,
    classify,
    model::{error::Result, object::Object, request::StatObjectRequest},
};

pub(crate) async fn stat_object(bucket: &GcsBucket, req: &StatObjectRequest) -> Result<Object> {
    debug!(bucket=%bucket.config.name, object=%req.name, "called");

    let url = bucket.object_resource_url(&req.name, true)?;
    let http_req = bucket.request(Method::GET, url)?;

    let res = bucket.execute(http_req).await?;
    let res = classify::checked(res).await?;

    bucket.decode_object(res).await
}

pub(crate) async fn delete_object(bucket: &GcsBucket, name: &str) -> Result<()> {
    debug!(bucket=%bucket.config.name, object=%name, "called");

    let url = bucket.object_resource_url(name, false)?;
    let http_req = bucket.request(Method::DELETE, url)?;

    // Some transports report a missing object as an error, not a 404 response.
    let res = bucket
        .transport
        .execute(http_req)
        .await
        .map_err(classify::classify_transport_not_found)?;
    classify::checked(res).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;
    use crate::adapters::TransportError;
    use crate::bucket::{
        tests::{mock_bucket, object_json},
        Bucket,
    };
    use crate::model::error::Error;

    #[tokio::test]
    async fn test_stat_object() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_json(StatusCode::OK, object_json("foo bar"));

        let o = bucket.stat_object(&StatObjectRequest::new("foo bar")).await.unwrap();
        assert_eq!(o.bucket, "some-bucket");
        assert_eq!(o.name, "foo bar");
        assert_eq!(o.size, 4);

        let sent = mock.requests();
        assert_eq!(sent[0].method, Method::GET);
        assert_eq!(
            sent[0].url.as_str(),
            "https://www.googleapis.com/storage/v1/b/some-bucket/o/foo%20bar?projection=full"
        );
    }

    #[tokio::test]
    async fn test_stat_object_not_found() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_error(StatusCode::NOT_FOUND, "No such object");

        let err = bucket
            .stat_object(&StatObjectRequest::new("missing"))
            .await
            .unwrap_err();

        assert!(err.is_not_found(), "{:?}", err);
    }

    #[tokio::test]
    async fn test_stat_object_malformed_body() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_response(StatusCode::OK, &[], "{not json");

        let err = bucket
            .stat_object(&StatObjectRequest::new("foo"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Json(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_delete_object() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_response(StatusCode::NO_CONTENT, &[], "");

        bucket.delete_object("foo/bar").await.unwrap();

        let sent = mock.requests();
        assert_eq!(sent[0].method, Method::DELETE);
        assert_eq!(
            sent[0].url.as_str(),
            "https://www.googleapis.com/storage/v1/b/some-bucket/o/foo%2Fbar"
        );
    }

    #[tokio::test]
    async fn test_delete_object_errors() {
        let cases = vec![
            ("status 404", Some(StatusCode::NOT_FOUND), None, true),
            ("transport 404", None, Some(Some(StatusCode::NOT_FOUND)), true),
            ("status 500", Some(StatusCode::INTERNAL_SERVER_ERROR), None, false),
            ("transport reset", None, Some(None), false),
        ];

        for (label, status, transport_err, not_found) in cases {
            let (mock, bucket) = mock_bucket("some-bucket");
            if let Some(status) = status {
                mock.push_error(status, "nope");
            }
            if let Some(code) = transport_err {
                let mut err = TransportError::new("nope");
                err.status = code;
                mock.push_transport_error(err);
            }

            let err = bucket.delete_object("foo").await.unwrap_err();
            assert_eq!(err.is_not_found(), not_found, "failed for case: {}", label);
        }
    }
}
