use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::Error;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }
}

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::AccessDenied => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::AlreadyExists => StatusCode::CONFLICT,
            Error::BadRequest(_)
            | Error::InvalidDialect(_)
            | Error::EmptyOrUnreadableInput(_)
            | Error::InvalidName(_)
            | Error::InvalidPrivilege(_)
            | Error::OwnerGrant
            | Error::Csv(_) => StatusCode::BAD_REQUEST,
            Error::Execution(_) | Error::EstimationFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Io(_) | Error::Database(_) | Error::Config(_) => {
                tracing::error!(error = %err, "request failed");
                return Self::internal("Internal server error");
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "data": null, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::AccessDenied, StatusCode::FORBIDDEN),
            (Error::NotFound, StatusCode::NOT_FOUND),
            (Error::AlreadyExists, StatusCode::CONFLICT),
            (Error::InvalidDialect("x".into()), StatusCode::BAD_REQUEST),
            (Error::OwnerGrant, StatusCode::BAD_REQUEST),
            (Error::Execution("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (Error::EstimationFailure("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (Error::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let err = Error::Io(std::io::Error::other("/srv/secret/path"));
        assert_eq!(ApiError::from(err).message, "Internal server error");
    }

    #[test]
    fn test_execution_text_passes_through() {
        let err = Error::Execution("no such table: orders".into());
        assert_eq!(ApiError::from(err).message, "no such table: orders");
    }
}
