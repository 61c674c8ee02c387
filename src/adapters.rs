use std::{error::Error as StdError, fmt, io};

use bytes::{Bytes, BytesMut};
use futures::{future::BoxFuture, stream::BoxStream, TryStreamExt};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method, StatusCode, Url,
};
use thiserror::Error;

pub mod auth;
pub mod client;
#[cfg(test)]
pub mod mock;

/// A stream of body chunks, owned by whoever holds it. Dropping it releases
/// the underlying connection.
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

pub enum Body {
    Empty,
    Full(Bytes),
    Stream(BodyStream),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Body::Stream(_) => f.write_str("Stream"),
        }
    }
}

#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Body,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }
}

pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// The request never produced a response, or the transport itself turned the
/// response into an error.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    /// Set by transports that surface HTTP error statuses as errors.
    pub status: Option<StatusCode>,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self {
            status: None,
            message: format!("body: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

/// Executes HTTP requests on behalf of a bucket. Authentication, retries and
/// connection reuse all live behind this seam.
///
/// Dropping the returned future must abort the request.
pub trait Transport: Send + Sync {
    fn execute(&self, req: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>>;
}

/// Read a response body to the end.
pub async fn collect_body(mut body: BodyStream) -> Result<Bytes, TransportError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.try_next().await? {
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn execute(&self, req: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        (**self).execute(req)
    }
}
