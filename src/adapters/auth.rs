use futures::future::BoxFuture;
use reqwest::header::{HeaderValue, AUTHORIZATION};

use crate::adapters::{HttpRequest, HttpResponse, Transport, TransportError};

/// Adds a fixed OAuth2 bearer token to every request before handing it to
/// the wrapped transport. Token refresh is the caller's business.
pub struct AuthorizedTransport<T> {
    inner: T,
    authorization: HeaderValue,
}

impl<T: Transport> AuthorizedTransport<T> {
    pub fn new(inner: T, access_token: &str) -> Result<Self, TransportError> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", access_token))
            .map_err(|_| TransportError::new("access token is not a valid header value"))?;
        authorization.set_sensitive(true);

        Ok(Self {
            inner,
            authorization,
        })
    }
}

impl<T: Transport> Transport for AuthorizedTransport<T> {
    fn execute(&self, mut req: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        req.headers.insert(AUTHORIZATION, self.authorization.clone());
        self.inner.execute(req)
    }
}
