use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::with_hub;
use crate::server::AppState;
use crate::server::auth::RequirePrincipal;
use crate::server::dto::{PageParams, QueryRequest};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::QualifiedName;

pub async fn list_relations(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo)): Path<(String, String)>,
) -> impl IntoResponse {
    let relations =
        with_hub(&state, move |hub| hub.list_relations(&auth.principal, &ns, &repo)).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(relations)))
}

pub async fn browse_table(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo, table)): Path<(String, String, String)>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let table = QualifiedName::new(&ns, &repo, &table).map_err(ApiError::from)?;
    let page = with_hub(&state, move |hub| {
        hub.browse_table(&auth.principal, &table, params.page)
    })
    .await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

pub async fn drop_table(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo, table)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let table = QualifiedName::new(&ns, &repo, &table).map_err(ApiError::from)?;
    with_hub(&state, move |hub| hub.drop_table(&auth.principal, &table)).await?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn export_table(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo, table)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let table = QualifiedName::new(&ns, &repo, &table).map_err(ApiError::from)?;
    let report = with_hub(&state, move |hub| hub.export_table(&auth.principal, &table)).await?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(report))))
}

pub async fn run_query(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo)): Path<(String, String)>,
    Json(req): Json<QueryRequest>,
) -> impl IntoResponse {
    let page = with_hub(&state, move |hub| {
        hub.run_query(&auth.principal, &ns, &repo, &req.q, req.page)
    })
    .await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}
