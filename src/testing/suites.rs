//! Behaviour every [`Bucket`] implementation must show, grouped into suites
//! and registered with [`bucket_test_registry`].

use std::{collections::BTreeMap, io};

use bytes::Bytes;
use futures::{stream, StreamExt};
use time::Duration;
use tokio::io::AsyncReadExt;

use crate::{
    bucket::Bucket,
    model::{
        error::Error,
        object::{AclRule, Object},
        request::{
            CreateObjectRequest, FieldUpdate, Query, ReadObjectRequest, StatObjectRequest,
            UpdateObjectRequest,
        },
    },
    testing::registry::{Registry, SuiteBuilder, TestSuite},
};

pub fn bucket_test_registry() -> Registry {
    Registry::new()
        .register(create_suite())
        .register(read_suite())
        .register(stat_suite())
        .register(update_suite())
        .register(delete_suite())
        .register(list_suite())
}

async fn create(bucket: &dyn Bucket, name: &str, contents: &str) -> Object {
    bucket
        .create_object(CreateObjectRequest::from_bytes(name, contents.to_string()))
        .await
        .unwrap_or_else(|err| panic!("create_object({:?}): {}", name, err))
}

async fn read_all(bucket: &dyn Bucket, name: &str, generation: i64) -> Result<Vec<u8>, Error> {
    let mut reader = bucket
        .new_reader(&ReadObjectRequest {
            name: name.to_string(),
            generation,
        })
        .await?;

    let mut contents = Vec::new();
    reader
        .read_to_end(&mut contents)
        .await
        .map_err(|err| Error::Protocol(format!("reading contents: {}", err)))?;

    Ok(contents)
}

async fn stat(bucket: &dyn Bucket, name: &str) -> Result<Object, Error> {
    bucket.stat_object(&StatObjectRequest::new(name)).await
}

fn create_suite() -> TestSuite {
    SuiteBuilder::new("CreateTest")
        .test("NewObject", |deps| async move {
            let before = deps.clock.now();
            let mut req = CreateObjectRequest::from_bytes("foo/bar", "taco");
            req.attrs.content_type = "text/plain".to_string();
            req.attrs.content_language = "fr".to_string();
            req.attrs.cache_control = "public".to_string();
            req.attrs.metadata = BTreeMap::from([("a".to_string(), "1".to_string())]);

            let o = deps.bucket.create_object(req).await.unwrap();
            assert_eq!(o.bucket, deps.bucket.name());
            assert_eq!(o.name, "foo/bar");
            assert_eq!(o.content_type, "text/plain");
            assert_eq!(o.content_language, "fr");
            assert_eq!(o.cache_control, "public");
            assert_eq!(o.metadata.get("a").map(String::as_str), Some("1"));
            assert_eq!(o.size, 4);
            assert_eq!(o.md5, md5::compute(b"taco").0.to_vec());
            assert!(o.generation > 0);
            assert_eq!(o.meta_generation, 1);
            assert!(o.deleted.is_none());

            let updated = o.updated.expect("updated not set");
            assert!(updated >= before && updated <= deps.clock.now());
        })
        .test("DefaultContentType", |deps| async move {
            let o = create(deps.bucket.as_ref(), "foo", "").await;
            assert_eq!(o.content_type, "application/octet-stream");
            assert_eq!(o.size, 0);
        })
        .test("AclIsKept", |deps| async move {
            let mut req = CreateObjectRequest::from_bytes("foo", "taco");
            req.attrs.acl = vec![AclRule::new("allUsers", "READER")];

            let o = deps.bucket.create_object(req).await.unwrap();
            assert!(o.acl.contains(&AclRule::new("allUsers", "READER")));
        })
        .test("Overwrite", |deps| async move {
            let first = create(deps.bucket.as_ref(), "foo", "taco").await;
            let second = create(deps.bucket.as_ref(), "foo", "burrito").await;

            assert_ne!(first.generation, second.generation);
            assert_eq!(read_all(deps.bucket.as_ref(), "foo", 0).await.unwrap(), b"burrito");
        })
        .test("InvalidNames", |deps| async move {
            for name in ["", ".", "..", "foo\nbar", "foo\rbar"] {
                let err = deps
                    .bucket
                    .create_object(CreateObjectRequest::from_bytes(name, "taco"))
                    .await
                    .unwrap_err();
                assert!(matches!(err, Error::InvalidRequest(_)), "{:?}: {:?}", name, err);
            }

            for name in [".", ".."] {
                let err = deps.bucket.delete_object(name).await.unwrap_err();
                assert!(matches!(err, Error::InvalidRequest(_)), "{:?}: {:?}", name, err);
                let err = stat(deps.bucket.as_ref(), name).await.unwrap_err();
                assert!(matches!(err, Error::InvalidRequest(_)), "{:?}: {:?}", name, err);
            }

            let listing = deps.bucket.list_objects(&Query::default()).await.unwrap();
            assert!(listing.results.is_empty());
        })
        .test("InterestingNames", |deps| async move {
            let names = [
                "foo bar",
                "foo/bar",
                "foo//bar",
                "!$&'()*+,;=:@",
                "100% ~ #?[]",
                "타코",
            ];

            for name in names {
                let o = create(deps.bucket.as_ref(), name, name).await;
                assert_eq!(o.name, name);
                assert_eq!(
                    read_all(deps.bucket.as_ref(), name, 0).await.unwrap(),
                    name.as_bytes()
                );
                assert_eq!(stat(deps.bucket.as_ref(), name).await.unwrap().name, name);
            }
        })
        .test("PreconditionZeroObjectMissing", |deps| async move {
            let o = deps
                .bucket
                .create_object(CreateObjectRequest::from_bytes("foo", "taco").with_precondition(0))
                .await
                .unwrap();
            assert_eq!(o.size, 4);
        })
        .test("PreconditionZeroObjectExists", |deps| async move {
            let existing = create(deps.bucket.as_ref(), "foo", "taco").await;

            let err = deps
                .bucket
                .create_object(
                    CreateObjectRequest::from_bytes("foo", "burrito").with_precondition(0),
                )
                .await
                .unwrap_err();
            assert!(err.is_precondition(), "{:?}", err);

            let current = stat(deps.bucket.as_ref(), "foo").await.unwrap();
            assert_eq!(current.generation, existing.generation);
        })
        .test("PreconditionGenerationMatches", |deps| async move {
            let existing = create(deps.bucket.as_ref(), "foo", "taco").await;

            let o = deps
                .bucket
                .create_object(
                    CreateObjectRequest::from_bytes("foo", "burrito")
                        .with_precondition(existing.generation),
                )
                .await
                .unwrap();
            assert!(o.generation > existing.generation);
        })
        .test("PreconditionGenerationMismatch", |deps| async move {
            let existing = create(deps.bucket.as_ref(), "foo", "taco").await;

            let err = deps
                .bucket
                .create_object(
                    CreateObjectRequest::from_bytes("foo", "burrito")
                        .with_precondition(existing.generation + 1),
                )
                .await
                .unwrap_err();
            assert!(err.is_precondition(), "{:?}", err);
        })
        .test("PreconditionNonZeroObjectMissing", |deps| async move {
            let err = deps
                .bucket
                .create_object(CreateObjectRequest::from_bytes("foo", "taco").with_precondition(17))
                .await
                .unwrap_err();
            assert!(err.is_precondition(), "{:?}", err);
            assert!(stat(deps.bucket.as_ref(), "foo").await.unwrap_err().is_not_found());
        })
        .test("ContentsErrorLeavesNoObject", |deps| async move {
            let contents = stream::iter(vec![
                Ok(Bytes::from_static(b"tac")),
                Err(io::Error::other("reader failed")),
            ])
            .boxed();

            let result = deps
                .bucket
                .create_object(CreateObjectRequest::new("foo", contents))
                .await;
            assert!(result.is_err());
            assert!(stat(deps.bucket.as_ref(), "foo").await.unwrap_err().is_not_found());
        })
        .test("ConcurrentConditionalCreates", |deps| async move {
            let bucket = deps.bucket.clone();
            let other = deps.bucket.clone();
            let first = CreateObjectRequest::from_bytes("foo", "a").with_precondition(0);
            let second = CreateObjectRequest::from_bytes("foo", "b").with_precondition(0);
            let (a, b) = tokio::join!(bucket.create_object(first), other.create_object(second));

            let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
            assert_eq!(successes, 1, "a: {:?}, b: {:?}", a, b);
            for result in [&a, &b] {
                if let Err(err) = result {
                    assert!(err.is_precondition(), "{:?}", err);
                }
            }
        })
        .test("ConcurrentConditionalAndUnconditional", |deps| async move {
            let bucket = deps.bucket.clone();
            let other = deps.bucket.clone();
            let first = CreateObjectRequest::from_bytes("foo", "a").with_precondition(0);
            let second = CreateObjectRequest::from_bytes("foo", "b");
            let (conditional, unconditional) =
                tokio::join!(bucket.create_object(first), other.create_object(second));

            let unconditional = unconditional.unwrap();
            match conditional {
                // Only possible if it landed first, before the overwrite.
                Ok(o) => assert!(o.generation < unconditional.generation),
                Err(err) => assert!(err.is_precondition(), "{:?}", err),
            }
        })
        .build()
}

fn read_suite() -> TestSuite {
    SuiteBuilder::new("ReadTest")
        .test("ObjectDoesntExist", |deps| async move {
            let err = read_all(deps.bucket.as_ref(), "foo", 0).await.unwrap_err();
            assert!(err.is_not_found(), "{:?}", err);
        })
        .test("EmptyObject", |deps| async move {
            create(deps.bucket.as_ref(), "foo", "").await;
            assert!(read_all(deps.bucket.as_ref(), "foo", 0).await.unwrap().is_empty());
        })
        .test("LatestGeneration", |deps| async move {
            create(deps.bucket.as_ref(), "foo", "taco").await;
            assert_eq!(read_all(deps.bucket.as_ref(), "foo", 0).await.unwrap(), b"taco");
        })
        .test("ParticularGeneration", |deps| async move {
            let o = create(deps.bucket.as_ref(), "foo", "taco").await;
            assert_eq!(
                read_all(deps.bucket.as_ref(), "foo", o.generation).await.unwrap(),
                b"taco"
            );
        })
        .test("GenerationDoesntExist", |deps| async move {
            let o = create(deps.bucket.as_ref(), "foo", "taco").await;
            let err = read_all(deps.bucket.as_ref(), "foo", o.generation + 1)
                .await
                .unwrap_err();
            assert!(err.is_not_found(), "{:?}", err);
        })
        .test("PartialReadThenDrop", |deps| async move {
            create(deps.bucket.as_ref(), "foo", "taco burrito enchilada").await;

            let mut reader = deps
                .bucket
                .new_reader(&ReadObjectRequest::new("foo"))
                .await
                .unwrap();
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"taco");
            drop(reader);

            assert_eq!(
                read_all(deps.bucket.as_ref(), "foo", 0).await.unwrap(),
                b"taco burrito enchilada"
            );
        })
        .build()
}

fn stat_suite() -> TestSuite {
    SuiteBuilder::new("StatTest")
        .test("ObjectDoesntExist", |deps| async move {
            let err = stat(deps.bucket.as_ref(), "foo").await.unwrap_err();
            assert!(err.is_not_found(), "{:?}", err);
        })
        .test("MatchesCreate", |deps| async move {
            let mut req = CreateObjectRequest::from_bytes("foo", "taco");
            req.attrs.content_type = "image/png".to_string();
            req.attrs.metadata = BTreeMap::from([("k".to_string(), "v".to_string())]);
            req.attrs.acl = vec![AclRule::new("allUsers", "READER")];
            let created = deps.bucket.create_object(req).await.unwrap();

            let o = stat(deps.bucket.as_ref(), "foo").await.unwrap();
            assert_eq!(o.name, created.name);
            assert_eq!(o.content_type, created.content_type);
            assert_eq!(o.metadata, created.metadata);
            assert_eq!(o.acl, created.acl);
            assert_eq!(o.generation, created.generation);
            assert_eq!(o.md5, created.md5);
            assert_eq!(o.crc32c, created.crc32c);
        })
        .build()
}

fn update_suite() -> TestSuite {
    SuiteBuilder::new("UpdateTest")
        .test("ObjectDoesntExist", |deps| async move {
            let req = UpdateObjectRequest {
                content_type: FieldUpdate::set("text/plain"),
                ..UpdateObjectRequest::new("foo")
            };
            let err = deps.bucket.update_object(&req).await.unwrap_err();
            assert!(err.is_not_found(), "{:?}", err);
        })
        .test("FieldPresence", |deps| async move {
            let mut req = CreateObjectRequest::from_bytes("foo", "taco");
            req.attrs.content_type = "image/png".to_string();
            req.attrs.content_encoding = "gzip".to_string();
            req.attrs.content_language = "fr".to_string();
            req.attrs.cache_control = "public".to_string();
            let created = deps.bucket.create_object(req).await.unwrap();

            let req = UpdateObjectRequest {
                content_type: FieldUpdate::from_ptr(Some("text/plain".to_string())),
                content_encoding: FieldUpdate::from_ptr(Some(String::new())),
                content_language: FieldUpdate::from_ptr(None),
                ..UpdateObjectRequest::new("foo")
            };
            let o = deps.bucket.update_object(&req).await.unwrap();

            assert_eq!(o.content_type, "text/plain");
            assert_eq!(o.content_encoding, "");
            assert_eq!(o.content_language, "fr");
            assert_eq!(o.cache_control, "public");
            assert_eq!(o.generation, created.generation);
            assert!(o.meta_generation > created.meta_generation);

            assert_eq!(stat(deps.bucket.as_ref(), "foo").await.unwrap(), o);
        })
        .test("ClearContentType", |deps| async move {
            let mut req = CreateObjectRequest::from_bytes("foo", "taco");
            req.attrs.content_type = "image/png".to_string();
            let created = deps.bucket.create_object(req).await.unwrap();

            // The service refuses to leave an object without a content type.
            let req = UpdateObjectRequest {
                content_type: FieldUpdate::from_ptr(Some(String::new())),
                ..UpdateObjectRequest::new("foo")
            };
            let err = deps.bucket.update_object(&req).await.unwrap_err();
            assert!(
                matches!(&err, Error::Service(e) if e.code == reqwest::StatusCode::BAD_REQUEST),
                "{:?}",
                err
            );

            let o = stat(deps.bucket.as_ref(), "foo").await.unwrap();
            assert_eq!(o.content_type, "image/png");
            assert_eq!(o.meta_generation, created.meta_generation);
        })
        .test("UserMetadata", |deps| async move {
            let mut req = CreateObjectRequest::from_bytes("foo", "taco");
            req.attrs.metadata = BTreeMap::from([
                ("keep".to_string(), "1".to_string()),
                ("change".to_string(), "2".to_string()),
                ("remove".to_string(), "3".to_string()),
            ]);
            deps.bucket.create_object(req).await.unwrap();

            let req = UpdateObjectRequest {
                metadata: Some(BTreeMap::from([
                    ("change".to_string(), Some("20".to_string())),
                    ("remove".to_string(), None),
                    ("add".to_string(), Some("4".to_string())),
                ])),
                ..UpdateObjectRequest::new("foo")
            };
            let o = deps.bucket.update_object(&req).await.unwrap();

            let expected = BTreeMap::from([
                ("keep".to_string(), "1".to_string()),
                ("change".to_string(), "20".to_string()),
                ("add".to_string(), "4".to_string()),
            ]);
            assert_eq!(o.metadata, expected);
        })
        .test("UpdatedTimeAdvances", |deps| async move {
            let created = create(deps.bucket.as_ref(), "foo", "taco").await;
            let before = deps.clock.now();

            let req = UpdateObjectRequest {
                cache_control: FieldUpdate::set("no-cache"),
                ..UpdateObjectRequest::new("foo")
            };
            let o = deps.bucket.update_object(&req).await.unwrap();

            let updated = o.updated.expect("updated not set");
            assert!(updated >= before);
            assert!(updated >= created.updated.expect("updated not set"));
            assert!(updated <= deps.clock.now() + Duration::seconds(1));
        })
        .build()
}

fn delete_suite() -> TestSuite {
    SuiteBuilder::new("DeleteTest")
        .test("ObjectDoesntExist", |deps| async move {
            let err = deps.bucket.delete_object("foo").await.unwrap_err();
            assert!(err.is_not_found(), "{:?}", err);
        })
        .test("Successful", |deps| async move {
            create(deps.bucket.as_ref(), "foo", "taco").await;
            deps.bucket.delete_object("foo").await.unwrap();

            assert!(stat(deps.bucket.as_ref(), "foo").await.unwrap_err().is_not_found());
            assert!(read_all(deps.bucket.as_ref(), "foo", 0)
                .await
                .unwrap_err()
                .is_not_found());

            let err = deps.bucket.delete_object("foo").await.unwrap_err();
            assert!(err.is_not_found(), "{:?}", err);
        })
        .test("LeavesOthersAlone", |deps| async move {
            create(deps.bucket.as_ref(), "a", "taco").await;
            create(deps.bucket.as_ref(), "b", "burrito").await;
            deps.bucket.delete_object("a").await.unwrap();

            assert_eq!(read_all(deps.bucket.as_ref(), "b", 0).await.unwrap(), b"burrito");
        })
        .build()
}

fn list_suite() -> TestSuite {
    SuiteBuilder::new("ListTest")
        .test("EmptyBucket", |deps| async move {
            let listing = deps.bucket.list_objects(&Query::default()).await.unwrap();
            assert!(listing.results.is_empty());
            assert!(listing.prefixes.is_empty());
            assert!(listing.next.is_none());
        })
        .test("PrefixAndDelimiter", |deps| async move {
            for name in ["a", "b/1", "b/2", "b/c/3", "d"] {
                create(deps.bucket.as_ref(), name, "").await;
            }

            let listing = deps
                .bucket
                .list_objects(&Query {
                    delimiter: "/".to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
            let names: Vec<_> = listing.results.iter().map(|o| o.name.as_str()).collect();
            assert_eq!(names, vec!["a", "d"]);
            assert_eq!(listing.prefixes, vec!["b/".to_string()]);

            let listing = deps
                .bucket
                .list_objects(&Query {
                    prefix: "b/".to_string(),
                    delimiter: "/".to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
            let names: Vec<_> = listing.results.iter().map(|o| o.name.as_str()).collect();
            assert_eq!(names, vec!["b/1", "b/2"]);
            assert_eq!(listing.prefixes, vec!["b/c/".to_string()]);
        })
        .test("Paging", |deps| async move {
            for name in ["a", "b", "c"] {
                create(deps.bucket.as_ref(), name, "").await;
            }

            let mut query = Query {
                max_results: 2,
                ..Default::default()
            };
            let mut names = Vec::new();
            let mut pages = 0;
            loop {
                let listing = deps.bucket.list_objects(&query).await.unwrap();
                pages += 1;
                names.extend(listing.results.into_iter().map(|o| o.name));
                match listing.next {
                    Some(next) => query = next,
                    None => break,
                }
            }

            assert_eq!(names, vec!["a", "b", "c"]);
            assert_eq!(pages, 2);
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_layout() {
        let registry = bucket_test_registry();
        let names: Vec<_> = registry.suites().iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["CreateTest", "ReadTest", "StatTest", "UpdateTest", "DeleteTest", "ListTest"]
        );

        for suite in registry.suites() {
            assert!(!suite.functions.is_empty(), "empty suite: {}", suite.name);
        }
    }
}
