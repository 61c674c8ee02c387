use reqwest::{Method, Url};
use tracing::debug;

use crate::{
    adapters::collect_body,
    bucket::GcsBucket,
    classify, codec,
    model::{
        error::{Error, Result},
        raw::RawObjects,
        request::{Objects, Query},
    },
    util::path::expand_template_var,
};

pub(crate) fn list_url(api_base: &str, bucket: &str, query: &Query) -> Result<Url> {
    let base = format!("{}b/{}/o", api_base, expand_template_var(bucket));
    let mut url = Url::parse(&base)
        .map_err(|err| Error::InvalidRequest(format!("bad url {}: {}", base, err)))?;

    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("projection", "full");
        if !query.prefix.is_empty() {
            pairs.append_pair("prefix", &query.prefix);
        }
        if !query.delimiter.is_empty() {
            pairs.append_pair("delimiter", &query.delimiter);
        }
        if query.versions {
            pairs.append_pair("versions", "true");
        }
        if !query.cursor.is_empty() {
            pairs.append_pair("pageToken", &query.cursor);
        }
        if query.max_results > 0 {
            pairs.append_pair("maxResults", &query.max_results.to_string());
        }
    }

    Ok(url)
}

pub(crate) async fn list_objects(bucket: &GcsBucket, query: &Query) -> Result<Objects> {
    debug!(bucket=%bucket.config.name, prefix=%query.prefix, delimiter=%query.delimiter, "called");

    let url = list_url(&bucket.config.api_base, &bucket.config.name, query)?;
    let http_req = bucket.request(Method::GET, url)?;

    let res = bucket.execute(http_req).await?;
    let res = classify::checked(res).await?;

    let body = collect_body(res.body).await?;
    let raw: RawObjects = serde_json::from_slice(&body)?;

    let results = raw
        .items
        .unwrap_or_default()
        .into_iter()
        .map(|item| codec::from_raw_object(&bucket.config.name, item))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let next = raw
        .next_page_token
        .filter(|token| !token.is_empty())
        .map(|token| Query {
            cursor: token,
            ..query.clone()
        });

    Ok(Objects {
        results,
        prefixes: raw.prefixes.unwrap_or_default(),
        next,
    })
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::bucket::{
        tests::{mock_bucket, object_json},
        Bucket,
    };

    #[test]
    fn test_list_url() {
        let base = "https://www.googleapis.com/storage/v1/";
        let cases = vec![
            (
                Query::default(),
                "https://www.googleapis.com/storage/v1/b/b/o?projection=full",
            ),
            (
                Query {
                    prefix: "foo/".to_string(),
                    delimiter: "/".to_string(),
                    versions: true,
                    cursor: "tok".to_string(),
                    max_results: 10,
                },
                "https://www.googleapis.com/storage/v1/b/b/o?projection=full&prefix=foo%2F&delimiter=%2F&versions=true&pageToken=tok&maxResults=10",
            ),
        ];

        for (query, expected) in cases {
            let url = list_url(base, "b", &query).unwrap();
            assert_eq!(url.as_str(), expected, "failed for case: {:?}", query);
        }
    }

    #[tokio::test]
    async fn test_list_objects() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_json(
            StatusCode::OK,
            json!({
                "items": [object_json("dir/a"), object_json("dir/b")],
                "prefixes": ["dir/sub/"],
                "nextPageToken": "page-2",
            }),
        );

        let query = Query {
            prefix: "dir/".to_string(),
            delimiter: "/".to_string(),
            ..Default::default()
        };
        let listing = bucket.list_objects(&query).await.unwrap();

        let names: Vec<_> = listing.results.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["dir/a", "dir/b"]);
        assert_eq!(listing.prefixes, vec!["dir/sub/".to_string()]);

        let next = listing.next.unwrap();
        assert_eq!(next.cursor, "page-2");
        assert_eq!(next.prefix, "dir/");
        assert_eq!(next.delimiter, "/");
    }

    #[tokio::test]
    async fn test_list_objects_empty() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_json(StatusCode::OK, json!({"kind": "storage#objects"}));

        let listing = bucket.list_objects(&Query::default()).await.unwrap();
        assert!(listing.results.is_empty());
        assert!(listing.prefixes.is_empty());
        assert!(listing.next.is_none());
    }

    #[tokio::test]
    async fn test_list_objects_bad_item() {
        let (mock, bucket) = mock_bucket("some-bucket");
        mock.push_json(
            StatusCode::OK,
            json!({"items": [{"name": "x", "crc32c": "AQID"}]}),
        );

        let err = bucket.list_objects(&Query::default()).await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "{:?}", err);
    }
}
