//! The user-facing JSON web server that listens for inference requests. This
//! is the "front end": it maps pipeline errors onto HTTP responses that name
//! the failing stage.

use crate::error::Error;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use protocol::FailureResponse;
use tracing::{debug, error};

pub mod protocol;
pub mod routes;

#[derive(Debug)]
pub struct WebError {
    err: Error,
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        let stage = self.err.stage();
        if self.err.is_client_fault() {
            debug!(?stage, reason = %self.err, "request failed");
        } else {
            error!(?stage, reason = %self.err, "internal fault while serving request");
        }

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(FailureResponse {
                stage,
                error: self.err.to_string(),
            })
    }

    fn status_code(&self) -> StatusCode {
        if self.err.is_client_fault() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<Error> for WebError {
    fn from(err: Error) -> WebError {
        WebError { err }
    }
}

/// Malformed request JSON never reaches the pipeline; report it as a
/// validation failure in the same shape as stage errors.
pub fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    _req: &HttpRequest,
) -> actix_web::Error {
    WebError::from(Error::Validation(err.to_string())).into()
}
