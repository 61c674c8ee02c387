use std::{collections::VecDeque, sync::Mutex};

use bytes::Bytes;
use futures::{future::BoxFuture, stream, StreamExt};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method, StatusCode, Url,
};

use crate::adapters::{self, collect_body, Body, HttpRequest, HttpResponse, TransportError};

/// A request as seen by [`MockTransport`], with its body fully read.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }
}

enum Scripted {
    Response {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    Error(TransportError),
    Hang,
}

/// Replays scripted responses in order and records every request it sees.
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, status: StatusCode, headers: &[(&str, &str)], body: &str) {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }

        self.script.lock().unwrap().push_back(Scripted::Response {
            status,
            headers: map,
            body: Bytes::copy_from_slice(body.as_bytes()),
        });
    }

    pub fn push_json(&self, status: StatusCode, body: serde_json::Value) {
        self.push_response(status, &[], &body.to_string());
    }

    /// Script a JSON API error response with the standard envelope.
    pub fn push_error(&self, status: StatusCode, message: &str) {
        self.push_json(
            status,
            serde_json::json!({"error": {"code": status.as_u16(), "message": message}}),
        );
    }

    pub fn push_transport_error(&self, err: TransportError) {
        self.script.lock().unwrap().push_back(Scripted::Error(err));
    }

    /// The next request never completes.
    pub fn push_hang(&self) {
        self.script.lock().unwrap().push_back(Scripted::Hang);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl adapters::Transport for MockTransport {
    fn execute(&self, req: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            let body = match req.body {
                Body::Empty => Bytes::new(),
                Body::Full(bytes) => bytes,
                Body::Stream(stream) => collect_body(stream).await?,
            };

            self.requests.lock().unwrap().push(RecordedRequest {
                method: req.method,
                url: req.url,
                headers: req.headers,
                body,
            });

            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted response left");

            match next {
                Scripted::Response {
                    status,
                    headers,
                    body,
                } => Ok(HttpResponse {
                    status,
                    headers,
                    body: stream::iter(vec![Ok(body)]).boxed(),
                }),
                Scripted::Error(err) => Err(err),
                Scripted::Hang => futures::future::pending().await,
            }
        })
    }
}
