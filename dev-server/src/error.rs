// dev-server/src/error.rs
use actix_web::{http::header, http::StatusCode, HttpResponse, ResponseError};
use common::ErrorPayload;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DevServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("rate limit exceeded, try again shortly")]
    RateLimited,

    #[error("{0}")]
    Internal(String),
}

impl ResponseError for DevServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            DevServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DevServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DevServerError::NotFound(_) => StatusCode::NOT_FOUND,
            DevServerError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            DevServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        if matches!(self, DevServerError::RateLimited) {
            response.append_header((header::RETRY_AFTER, "1"));
        }
        response.json(ErrorPayload::new(self.to_string()))
    }
}

impl From<actix::MailboxError> for DevServerError {
    fn from(e: actix::MailboxError) -> Self {
        tracing::error!("Registry unavailable: {}", e);
        DevServerError::Internal("Internal server error".to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for DevServerError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        tracing::error!("Token issue failed: {}", e);
        DevServerError::Internal("Internal server error".to_string())
    }
}
