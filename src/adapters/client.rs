use std::io;

use futures::{future::BoxFuture, StreamExt, TryStreamExt};

use crate::adapters::{self, Body, HttpRequest, HttpResponse, TransportError};

impl adapters::Transport for reqwest::Client {
    fn execute(&self, req: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            let mut builder = self.request(req.method, req.url).headers(req.headers);
            builder = match req.body {
                Body::Empty => builder,
                Body::Full(bytes) => builder.body(bytes),
                Body::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
            };

            let res = builder.send().await.map_err(TransportError::from)?;

            let status = res.status();
            let headers = res.headers().clone();
            let body = res.bytes_stream().map_err(io::Error::other).boxed();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status(),
            message: format!("failed to execute request: {}", err),
            source: Some(Box::new(err)),
        }
    }
}
