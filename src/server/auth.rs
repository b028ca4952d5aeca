use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::server::AppState;
use crate::types::validate_namespace_name;

/// Header carrying the caller's username, set by the authenticating proxy in
/// front of the server.
pub const PRINCIPAL_HEADER: &str = "x-repobase-user";

/// Extractor that requires a caller identity
pub struct RequirePrincipal {
    pub principal: String,
}

#[derive(Debug)]
pub enum AuthError {
    MissingPrincipal,
    InvalidPrincipal,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingPrincipal => "Authentication required",
            AuthError::InvalidPrincipal => "Invalid principal",
        };

        let body = json!({ "data": null, "error": message });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl FromRequestParts<Arc<AppState>> for RequirePrincipal {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let principal = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .ok_or(AuthError::MissingPrincipal)?
            .to_str()
            .map_err(|_| AuthError::InvalidPrincipal)?
            .trim();

        validate_namespace_name(principal).map_err(|_| AuthError::InvalidPrincipal)?;

        Ok(RequirePrincipal {
            principal: principal.to_string(),
        })
    }
}
