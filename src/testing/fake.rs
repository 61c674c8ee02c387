//! An in-memory stand-in for the JSON API endpoints used by [`GcsBucket`].
//!
//! It speaks the same wire format as the real service (resumable uploads,
//! direct reads, get/patch/delete on the object resource, listing), keeps a
//! single live generation per object, and takes timestamps from a [`Clock`].
//!
//! [`GcsBucket`]: crate::bucket::GcsBucket

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures::{future::BoxFuture, stream, StreamExt};
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, LOCATION},
    Method, StatusCode, Url,
};
use serde::Serialize;
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    adapters::{collect_body, Body, HttpRequest, HttpResponse, Transport, TransportError},
    bucket::{new_bucket, Bucket},
    config::BucketConfig,
    model::raw::{RawAcl, RawErrorBody, RawErrorDetail, RawInt, RawObject, RawObjects, RawOwner},
    testing::clock::Clock,
    util::path::{decode_segment, encode_segment, expand_template_var},
};

pub const STORAGE_HOST: &str = "storage.fake.test";
pub const UPLOAD_HOST: &str = "upload.fake.test";
pub const API_BASE: &str = "https://api.fake.test/storage/v1/";
const API_HOST: &str = "api.fake.test";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone, Debug)]
struct StoredObject {
    content_type: String,
    content_language: String,
    content_encoding: String,
    cache_control: String,
    metadata: BTreeMap<String, String>,
    acl: Vec<RawAcl>,
    contents: Bytes,
    generation: i64,
    meta_generation: i64,
    created: OffsetDateTime,
    updated: OffsetDateTime,
}

struct PendingUpload {
    bucket: String,
    metadata: RawObject,
    precondition: Option<i64>,
}

#[derive(Default)]
struct State {
    next_generation: i64,
    next_upload: u64,
    objects: BTreeMap<(String, String), StoredObject>,
    uploads: HashMap<String, PendingUpload>,
}

pub struct FakeGcs {
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl FakeGcs {
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            state: Mutex::new(State {
                next_generation: 1,
                ..Default::default()
            }),
        })
    }

    pub fn bucket_config(name: &str) -> BucketConfig {
        BucketConfig::new("fake-project", name)
            .with_storage_host(STORAGE_HOST)
            .with_upload_host(UPLOAD_HOST)
            .with_api_base(API_BASE)
    }

    /// A bucket handle backed by this fake. Buckets spring into existence
    /// empty the first time they are named.
    pub fn bucket(self: &Arc<Self>, name: &str) -> Arc<dyn Bucket> {
        new_bucket(Self::bucket_config(name), self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn handle(&self, method: Method, url: &Url, headers: &HeaderMap, body: Bytes) -> HttpResponse {
        let host = url.host_str().unwrap_or_default();
        let path = url.path();

        let route = match host {
            STORAGE_HOST => path_segments(path, "/"),
            UPLOAD_HOST => path_segments(path, "/upload/storage/v1/b/"),
            API_HOST => path_segments(path, "/storage/v1/b/"),
            _ => None,
        };

        let Some(segments) = route else {
            return error_response(StatusCode::NOT_FOUND, &format!("unknown endpoint: {}", url));
        };

        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        match (host, method.as_str(), segments.as_slice()) {
            (STORAGE_HOST, "GET", [bucket, object]) => self.read(bucket, object, &params),
            (UPLOAD_HOST, "POST", [bucket, "o"]) => {
                self.initiate_upload(bucket, headers, &params, &body)
            }
            (UPLOAD_HOST, "PUT", [_, "o"]) => self.finish_upload(headers, &params, body),
            (API_HOST, "GET", [bucket, "o"]) => self.list(bucket, &params),
            (API_HOST, "GET", [bucket, "o", object]) => self.stat(bucket, object),
            (API_HOST, "PATCH", [bucket, "o", object]) => self.patch(bucket, object, &body),
            (API_HOST, "DELETE", [bucket, "o", object]) => self.delete(bucket, object),
            _ => error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &format!("unsupported request: {} {}", method, url),
            ),
        }
    }

    fn read(&self, bucket: &str, object: &str, params: &HashMap<String, String>) -> HttpResponse {
        let state = self.lock();
        let Some(o) = state.objects.get(&key(bucket, object)) else {
            return no_such_object(bucket, object);
        };

        if let Some(generation) = params.get("generation") {
            if generation.parse::<i64>().ok() != Some(o.generation) {
                return no_such_object(bucket, object);
            }
        }

        response(StatusCode::OK, HeaderMap::new(), o.contents.clone())
    }

    fn initiate_upload(
        &self,
        bucket: &str,
        headers: &HeaderMap,
        params: &HashMap<String, String>,
        body: &[u8],
    ) -> HttpResponse {
        if params.get("uploadType").map(String::as_str) != Some("resumable") {
            return error_response(StatusCode::BAD_REQUEST, "only resumable uploads are supported");
        }

        let mut metadata: RawObject = match serde_json::from_slice(body) {
            Ok(m) => m,
            Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        };

        if metadata.name.is_empty() {
            return error_response(StatusCode::BAD_REQUEST, "Required: name");
        }

        if metadata.content_type.is_empty() {
            if let Some(t) = headers.get("x-upload-content-type").and_then(|v| v.to_str().ok()) {
                metadata.content_type = t.to_string();
            }
        }

        let precondition = match params.get("ifGenerationMatch").map(|v| v.parse::<i64>()) {
            None => None,
            Some(Ok(g)) => Some(g),
            Some(Err(_)) => {
                return error_response(StatusCode::BAD_REQUEST, "invalid ifGenerationMatch")
            }
        };

        let mut state = self.lock();
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                metadata,
                precondition,
            },
        );

        let location = format!(
            "https://{}/upload/storage/v1/b/{}/o?uploadType=resumable&upload_id={}",
            UPLOAD_HOST,
            encode_segment(bucket),
            upload_id
        );

        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&location) {
            headers.insert(LOCATION, value);
        }

        response(StatusCode::OK, headers, Bytes::new())
    }

    fn finish_upload(
        &self,
        headers: &HeaderMap,
        params: &HashMap<String, String>,
        contents: Bytes,
    ) -> HttpResponse {
        let now = self.clock.now();
        let mut state = self.lock();

        let Some(upload) = params
            .get("upload_id")
            .and_then(|id| state.uploads.remove(id))
        else {
            return error_response(StatusCode::NOT_FOUND, "no such upload session");
        };

        let object_key = key(&upload.bucket, &upload.metadata.name);
        let current = state
            .objects
            .get(&object_key)
            .map(|o| o.generation)
            .unwrap_or(0);

        if let Some(expected) = upload.precondition {
            if expected != current {
                return error_response(StatusCode::PRECONDITION_FAILED, "Precondition Failed");
            }
        }

        let content_type = if !upload.metadata.content_type.is_empty() {
            upload.metadata.content_type.clone()
        } else {
            headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string()
        };

        let generation = state.next_generation;
        state.next_generation += 1;

        let stored = StoredObject {
            content_type,
            content_language: upload.metadata.content_language,
            content_encoding: upload.metadata.content_encoding,
            cache_control: upload.metadata.cache_control,
            metadata: upload.metadata.metadata.unwrap_or_default(),
            acl: upload.metadata.acl.unwrap_or_default(),
            contents,
            generation,
            meta_generation: 1,
            created: now,
            updated: now,
        };

        let raw = to_raw(&upload.bucket, &upload.metadata.name, &stored);
        state.objects.insert(object_key, stored);

        json_response(StatusCode::OK, &raw)
    }

    fn stat(&self, bucket: &str, object: &str) -> HttpResponse {
        let state = self.lock();
        match state.objects.get(&key(bucket, object)) {
            Some(o) => json_response(StatusCode::OK, &to_raw(bucket, object, o)),
            None => no_such_object(bucket, object),
        }
    }

    fn patch(&self, bucket: &str, object: &str, body: &[u8]) -> HttpResponse {
        let patch: serde_json::Map<String, Value> = match serde_json::from_slice(body) {
            Ok(p) => p,
            Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        };

        let now = self.clock.now();
        let mut state = self.lock();
        let Some(o) = state.objects.get_mut(&key(bucket, object)) else {
            return no_such_object(bucket, object);
        };

        let mut updated = o.clone();
        for (field, value) in &patch {
            let target = match field.as_str() {
                "contentType" => &mut updated.content_type,
                "contentEncoding" => &mut updated.content_encoding,
                "contentLanguage" => &mut updated.content_language,
                "cacheControl" => &mut updated.cache_control,
                "metadata" => {
                    let Value::Object(delta) = value else {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            "metadata must be an object",
                        );
                    };
                    for (k, v) in delta {
                        match v {
                            Value::Null => {
                                updated.metadata.remove(k);
                            }
                            Value::String(s) => {
                                updated.metadata.insert(k.clone(), s.clone());
                            }
                            _ => {
                                return error_response(
                                    StatusCode::BAD_REQUEST,
                                    "metadata values must be strings",
                                )
                            }
                        }
                    }
                    continue;
                }
                _ => continue,
            };

            match value {
                Value::Null => target.clear(),
                Value::String(s) => *target = s.clone(),
                _ => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        &format!("{} must be a string", field),
                    )
                }
            }
        }

        if updated.content_type.is_empty() {
            return error_response(StatusCode::BAD_REQUEST, "Required: contentType");
        }

        updated.meta_generation += 1;
        updated.updated = now;
        *o = updated;

        json_response(StatusCode::OK, &to_raw(bucket, object, o))
    }

    fn delete(&self, bucket: &str, object: &str) -> HttpResponse {
        let mut state = self.lock();
        match state.objects.remove(&key(bucket, object)) {
            Some(_) => response(StatusCode::NO_CONTENT, HeaderMap::new(), Bytes::new()),
            None => no_such_object(bucket, object),
        }
    }

    fn list(&self, bucket: &str, params: &HashMap<String, String>) -> HttpResponse {
        let prefix = params.get("prefix").map(String::as_str).unwrap_or("");
        let delimiter = params.get("delimiter").map(String::as_str).unwrap_or("");
        let offset: usize = params
            .get("pageToken")
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);
        let max_results: usize = params
            .get("maxResults")
            .and_then(|m| m.parse().ok())
            .filter(|&m| m > 0)
            .unwrap_or(1000);

        enum Entry {
            Item(RawObject),
            Prefix(String),
        }

        let state = self.lock();
        let mut entries = Vec::new();
        let mut last_prefix: Option<String> = None;
        for ((b, name), o) in state.objects.iter() {
            if b != bucket || !name.starts_with(prefix) {
                continue;
            }

            let rest = &name[prefix.len()..];
            if !delimiter.is_empty() {
                if let Some(idx) = rest.find(delimiter) {
                    let collapsed = format!("{}{}", prefix, &rest[..idx + delimiter.len()]);
                    if last_prefix.as_deref() != Some(collapsed.as_str()) {
                        last_prefix = Some(collapsed.clone());
                        entries.push(Entry::Prefix(collapsed));
                    }
                    continue;
                }
            }

            entries.push(Entry::Item(to_raw(bucket, name, o)));
        }

        let total = entries.len();
        let mut items = Vec::new();
        let mut prefixes = Vec::new();
        for entry in entries.into_iter().skip(offset).take(max_results) {
            match entry {
                Entry::Item(raw) => items.push(raw),
                Entry::Prefix(p) => prefixes.push(p),
            }
        }

        let end = offset + max_results;
        let listing = RawObjects {
            items: Some(items),
            prefixes: Some(prefixes),
            next_page_token: (end < total).then(|| end.to_string()),
        };

        json_response(StatusCode::OK, &listing)
    }
}

impl Transport for FakeGcs {
    fn execute(&self, req: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            // The whole body must arrive before anything changes, so a failed
            // upload stream never produces an object.
            let body = match req.body {
                Body::Empty => Bytes::new(),
                Body::Full(bytes) => bytes,
                Body::Stream(stream) => collect_body(stream).await?,
            };

            Ok(self.handle(req.method, &req.url, &req.headers, body))
        })
    }
}

fn key(bucket: &str, object: &str) -> (String, String) {
    (bucket.to_string(), object.to_string())
}

fn path_segments(path: &str, prefix: &str) -> Option<Vec<String>> {
    let rest = path.strip_prefix(prefix)?;
    rest.split('/')
        .map(|segment| decode_segment(segment).and_then(|bytes| String::from_utf8(bytes).ok()))
        .collect()
}

fn format_time(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_default()
}

fn to_raw(bucket: &str, name: &str, o: &StoredObject) -> RawObject {
    RawObject {
        bucket: bucket.to_string(),
        name: name.to_string(),
        content_type: o.content_type.clone(),
        content_language: o.content_language.clone(),
        content_encoding: o.content_encoding.clone(),
        cache_control: o.cache_control.clone(),
        acl: Some(o.acl.clone()),
        metadata: (!o.metadata.is_empty()).then(|| o.metadata.clone()),
        owner: Some(RawOwner {
            entity: "user-fake".to_string(),
        }),
        size: Some(RawInt::Text(o.contents.len().to_string())),
        media_link: format!(
            "https://{}/download/storage/v1/b/{}/o/{}?generation={}&alt=media",
            STORAGE_HOST,
            expand_template_var(bucket),
            expand_template_var(name),
            o.generation
        ),
        generation: Some(RawInt::Text(o.generation.to_string())),
        metageneration: Some(RawInt::Text(o.meta_generation.to_string())),
        storage_class: "STANDARD".to_string(),
        md5_hash: STANDARD.encode(md5::compute(&o.contents).0),
        crc32c: STANDARD.encode(crc32c::crc32c(&o.contents).to_be_bytes()),
        time_created: format_time(o.created),
        updated: format_time(o.updated),
        time_deleted: String::new(),
    }
}

fn response(status: StatusCode, headers: HeaderMap, body: Bytes) -> HttpResponse {
    HttpResponse {
        status,
        headers,
        body: stream::iter(vec![Ok(body)]).boxed(),
    }
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let body = serde_json::to_vec(value).unwrap_or_default();
    response(status, headers, Bytes::from(body))
}

fn error_response(status: StatusCode, message: &str) -> HttpResponse {
    json_response(
        status,
        &RawErrorBody {
            error: RawErrorDetail {
                code: status.as_u16(),
                message: message.to_string(),
            },
        },
    )
}

fn no_such_object(bucket: &str, object: &str) -> HttpResponse {
    error_response(
        StatusCode::NOT_FOUND,
        &format!("No such object: {}/{}", bucket, object),
    )
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::{
        model::request::{CreateObjectRequest, ReadObjectRequest, StatObjectRequest},
        testing::clock::RealClock,
    };

    #[test]
    fn test_crc32c() {
        let cases: Vec<(&[u8], u32)> = vec![
            (b"", 0),
            (b"123456789", 0xE306_9283),
            (&[0u8; 32], 0x8A91_36AA),
        ];

        for (input, expected) in cases {
            assert_eq!(crc32c::crc32c(input), expected, "failed for case: {:?}", input);
        }
    }

    #[test]
    fn test_path_segments() {
        let cases = vec![
            ("/b/o", "/", Some(vec!["b", "o"])),
            ("/b/a%2Fb", "/", Some(vec!["b", "a/b"])),
            ("/storage/v1/b/b/o", "/storage/v1/b/", Some(vec!["b", "o"])),
            ("/other", "/storage/v1/b/", None),
            ("/b/%zz", "/", None),
        ];

        for (path, prefix, expected) in cases {
            let expected =
                expected.map(|v: Vec<&str>| v.into_iter().map(str::to_string).collect::<Vec<_>>());
            assert_eq!(path_segments(path, prefix), expected, "failed for case: {}", path);
        }
    }

    #[tokio::test]
    async fn test_round_trip_through_fake() {
        let fake = FakeGcs::new(Arc::new(RealClock));
        let bucket = fake.bucket("some-bucket");

        let created = bucket
            .create_object(CreateObjectRequest::from_bytes("a/b c", "taco"))
            .await
            .unwrap();
        assert_eq!(created.size, 4);
        assert_eq!(created.content_type, "application/octet-stream");
        assert_eq!(created.md5, md5::compute(b"taco").0.to_vec());
        assert_eq!(created.crc32c, crc32c::crc32c(b"taco"));

        let stat = bucket
            .stat_object(&StatObjectRequest::new("a/b c"))
            .await
            .unwrap();
        assert_eq!(stat, created);

        let mut reader = bucket
            .new_reader(&ReadObjectRequest::new("a/b c"))
            .await
            .unwrap();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"taco");
    }
}
