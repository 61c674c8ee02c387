//! Turning HTTP outcomes into domain errors.

use reqwest::StatusCode;

use crate::{
    adapters::{collect_body, HttpResponse, TransportError},
    model::{
        error::{Error, ServiceError},
        raw::RawErrorBody,
    },
};

/// Pass 2xx responses through; read the body of anything else into a
/// [`ServiceError`].
pub async fn check_response(res: HttpResponse) -> Result<HttpResponse, ServiceError> {
    if res.status.is_success() {
        return Ok(res);
    }

    let code = res.status;
    let body = match collect_body(res.body).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => format!("<unreadable body: {}>", err),
    };

    let message = match serde_json::from_str::<RawErrorBody>(&body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ => body.clone(),
    };

    Err(ServiceError {
        code,
        message,
        body,
    })
}

/// Map a non-2xx response onto the domain taxonomy. Statuses with no typed
/// meaning are surfaced as they are.
pub fn classify(err: ServiceError) -> Error {
    match err.code {
        StatusCode::NOT_FOUND => Error::NotFound(Box::new(Error::Service(err))),
        StatusCode::PRECONDITION_FAILED => Error::Precondition(Box::new(Error::Service(err))),
        _ => Error::Service(err),
    }
}

/// Classify an error from the transport itself. Some transports report HTTP
/// error statuses this way instead of returning the response, so a 404 found
/// here still means the object is missing.
pub fn classify_transport_not_found(err: TransportError) -> Error {
    if err.status == Some(StatusCode::NOT_FOUND) {
        return Error::NotFound(Box::new(Error::Transport(err)));
    }

    Error::Transport(err)
}

/// Run a response through [`check_response`] and [`classify`].
pub async fn checked(res: HttpResponse) -> Result<HttpResponse, Error> {
    check_response(res).await.map_err(classify)
}
