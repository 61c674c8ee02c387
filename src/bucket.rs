use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    header::{HeaderValue, USER_AGENT},
    Method, Url,
};
use tokio_util::io::StreamReader;
use tracing::warn;

use crate::{
    adapters::{collect_body, BodyStream, HttpRequest, HttpResponse, Transport},
    codec,
    config::BucketConfig,
    model::{
        error::{Error, Result},
        object::Object,
        raw::RawObject,
        request::{
            CreateObjectRequest, Objects, Query, ReadObjectRequest, StatObjectRequest,
            UpdateObjectRequest,
        },
    },
    util::path::expand_template_var,
};

mod create;
mod list;
mod read;
mod stat;
mod update;

pub use create::validate_object_name;

/// The contents of one object generation. Dropping the reader releases the
/// connection, including after a partial read or a read error.
pub type ObjectReader = StreamReader<BodyStream, Bytes>;

/// A bucket, pre-bound to a name and whatever transport carries its requests.
///
/// Every operation is a single independent round trip (two for creation).
/// Dropping a returned future aborts the request in flight, so deadlines and
/// cancellation are applied with `tokio::time::timeout` or `tokio::select!`.
/// Nothing is retried.
#[async_trait]
pub trait Bucket: Send + Sync {
    fn name(&self) -> &str;

    /// List the objects matching `query`. Returns a single page; follow
    /// `Objects::next` for more.
    async fn list_objects(&self, query: &Query) -> Result<Objects>;

    /// Open the contents of a particular generation of an object.
    ///
    /// Fails with [`Error::NotFound`] if the object or generation is missing.
    async fn new_reader(&self, req: &ReadObjectRequest) -> Result<ObjectReader>;

    /// Create or overwrite an object. The object exists for reads once this
    /// returns `Ok`, and does not exist before `req.contents` has ended.
    ///
    /// Fails with [`Error::Precondition`] if the generation precondition was
    /// not met.
    async fn create_object(&self, req: CreateObjectRequest) -> Result<Object>;

    /// Fails with [`Error::NotFound`] if the object doesn't exist.
    async fn stat_object(&self, req: &StatObjectRequest) -> Result<Object>;

    /// Patch the metadata of an existing object.
    ///
    /// Fails with [`Error::NotFound`] if the object doesn't exist.
    async fn update_object(&self, req: &UpdateObjectRequest) -> Result<Object>;

    /// Fails with [`Error::NotFound`] if the object doesn't exist.
    async fn delete_object(&self, name: &str) -> Result<()>;
}

/// A [`Bucket`] speaking the JSON API through a [`Transport`].
pub struct GcsBucket {
    config: BucketConfig,
    transport: Arc<dyn Transport>,
}

pub fn new_bucket(config: BucketConfig, transport: Arc<dyn Transport>) -> Arc<dyn Bucket> {
    Arc::new(GcsBucket::new(config, transport))
}

impl GcsBucket {
    pub fn new(config: BucketConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    fn parse_url(&self, url: &str) -> Result<Url> {
        Url::parse(url).map_err(|err| Error::InvalidRequest(format!("bad url {}: {}", url, err)))
    }

    /// The per-object resource URL, `b/{bucket}/o/{object}` expanded against
    /// the API base.
    fn object_resource_url(&self, object: &str, projection_full: bool) -> Result<Url> {
        check_name_segment(object)?;

        let mut url = format!(
            "{}b/{}/o/{}",
            self.config.api_base,
            expand_template_var(&self.config.name),
            expand_template_var(object)
        );
        if projection_full {
            url.push_str("?projection=full");
        }

        self.parse_url(&url)
    }

    fn request(&self, method: Method, url: Url) -> Result<HttpRequest> {
        let user_agent = HeaderValue::from_str(&self.config.user_agent)
            .map_err(|_| Error::InvalidRequest("user agent is not a valid header value".into()))?;

        Ok(HttpRequest::new(method, url).header(USER_AGENT, user_agent))
    }

    async fn execute(&self, req: HttpRequest) -> Result<HttpResponse> {
        Ok(self.transport.execute(req).await?)
    }

    /// Decode a 2xx response whose body is an object resource.
    async fn decode_object(&self, res: HttpResponse) -> Result<Object> {
        let body = collect_body(res.body).await?;
        let raw: RawObject = serde_json::from_slice(&body)?;

        Ok(codec::from_raw_object(&self.config.name, raw)?)
    }
}

/// Names that cannot travel as a single URL path segment. URL parsing
/// collapses `.` and `..` segments, escaped or not, so requests for them
/// would reach a different resource. The service forbids both names.
pub(crate) fn check_name_segment(name: &str) -> Result<()> {
    match name {
        "" => Err(Error::InvalidRequest("invalid object name: empty".into())),
        "." | ".." => Err(Error::InvalidRequest(format!(
            "invalid object name: {:?} is not allowed",
            name
        ))),
        _ => Ok(()),
    }
}

fn log_failure<T>(result: Result<T>, group: &'static str) -> Result<T> {
    if let Err(err) = &result {
        warn!(error_message=%err, error_group=group);
    }

    result
}

#[async_trait]
impl Bucket for GcsBucket {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn list_objects(&self, query: &Query) -> Result<Objects> {
        log_failure(list::list_objects(self, query).await, "list_objects")
    }

    async fn new_reader(&self, req: &ReadObjectRequest) -> Result<ObjectReader> {
        log_failure(read::new_reader(self, req).await, "new_reader")
    }

    async fn create_object(&self, req: CreateObjectRequest) -> Result<Object> {
        log_failure(create::create_object(self, req).await, "create_object")
    }

    async fn stat_object(&self, req: &StatObjectRequest) -> Result<Object> {
        log_failure(stat::stat_object(self, req).await, "stat_object")
    }

    async fn update_object(&self, req: &UpdateObjectRequest) -> Result<Object> {
        log_failure(update::update_object(self, req).await, "update_object")
    }

    async fn delete_object(&self, name: &str) -> Result<()> {
        log_failure(stat::delete_object(self, name).await, "delete_object")
    }
}
