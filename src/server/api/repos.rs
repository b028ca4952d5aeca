use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::with_hub;
use crate::server::AppState;
use crate::server::auth::RequirePrincipal;
use crate::server::dto::CreateRepoRequest;
use crate::server::response::{ApiError, ApiResponse};

pub async fn list_repos(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path(ns): Path<String>,
) -> impl IntoResponse {
    let repos = with_hub(&state, move |hub| hub.list_repos(&auth.principal, &ns)).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(repos)))
}

pub async fn create_repo(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path(ns): Path<String>,
    Json(req): Json<CreateRepoRequest>,
) -> impl IntoResponse {
    let repo = with_hub(&state, move |hub| {
        hub.create_repo(&auth.principal, &ns, &req.name)
    })
    .await?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(repo))))
}

pub async fn delete_repo(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo)): Path<(String, String)>,
) -> impl IntoResponse {
    with_hub(&state, move |hub| hub.delete_repo(&auth.principal, &ns, &repo)).await?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
