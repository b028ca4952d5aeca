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
use crate::server::dto::{CreateCardRequest, PageParams};
use crate::server::response::{ApiError, ApiResponse};

pub async fn list_cards(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo)): Path<(String, String)>,
) -> impl IntoResponse {
    let cards = with_hub(&state, move |hub| hub.list_cards(&auth.principal, &ns, &repo)).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(cards)))
}

pub async fn create_card(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo)): Path<(String, String)>,
    Json(req): Json<CreateCardRequest>,
) -> impl IntoResponse {
    let card = with_hub(&state, move |hub| {
        hub.create_card(&auth.principal, &ns, &repo, &req.name, &req.query)
    })
    .await?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(card))))
}

pub async fn view_card(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo, card)): Path<(String, String, String)>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let page = with_hub(&state, move |hub| {
        hub.view_card(&auth.principal, &ns, &repo, &card, params.page)
    })
    .await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

pub async fn delete_card(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo, card)): Path<(String, String, String)>,
) -> impl IntoResponse {
    with_hub(&state, move |hub| {
        hub.delete_card(&auth.principal, &ns, &repo, &card)
    })
    .await?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn export_card(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo, card)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let report = with_hub(&state, move |hub| {
        hub.export_card(&auth.principal, &ns, &repo, &card)
    })
    .await?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(report))))
}
