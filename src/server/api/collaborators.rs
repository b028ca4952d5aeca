use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::with_hub;
use crate::error::Error;
use crate::server::AppState;
use crate::server::auth::RequirePrincipal;
use crate::server::dto::{CollaboratorResponse, GrantRequest};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::Privilege;

pub async fn list_collaborators(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo)): Path<(String, String)>,
) -> impl IntoResponse {
    let collaborators = with_hub(&state, move |hub| {
        hub.list_collaborators(&auth.principal, &ns, &repo)
    })
    .await?;

    let response: Vec<CollaboratorResponse> = collaborators
        .into_iter()
        .map(CollaboratorResponse::from)
        .collect();
    Ok::<_, ApiError>(Json(ApiResponse::success(response)))
}

pub async fn add_collaborator(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo, user)): Path<(String, String, String)>,
    Json(req): Json<GrantRequest>,
) -> impl IntoResponse {
    let privileges = match req.privileges {
        Some(names) => Some(Privilege::parse_many(&names).ok_or_else(|| {
            ApiError::from(Error::InvalidPrivilege(names.join(", ")))
        })?),
        None => None,
    };

    let collaborator = with_hub(&state, move |hub| {
        hub.add_collaborator(&auth.principal, &ns, &repo, &user, privileges)
    })
    .await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(CollaboratorResponse::from(
        collaborator,
    ))))
}

pub async fn remove_collaborator(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo, user)): Path<(String, String, String)>,
) -> impl IntoResponse {
    with_hub(&state, move |hub| {
        hub.remove_collaborator(&auth.principal, &ns, &repo, &user)
    })
    .await?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
