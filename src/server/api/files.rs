use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

use super::with_hub;
use crate::dialect::DialectHints;
use crate::files::ArtifactPath;
use crate::server::AppState;
use crate::server::auth::RequirePrincipal;
use crate::server::dto::UploadResponse;
use crate::server::response::{ApiError, ApiResponse};

pub async fn list_files(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo)): Path<(String, String)>,
) -> impl IntoResponse {
    let files = with_hub(&state, move |hub| hub.list_files(&auth.principal, &ns, &repo)).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(files)))
}

pub async fn upload_file(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo, file)): Path<(String, String, String)>,
    body: Bytes,
) -> impl IntoResponse {
    let path = ArtifactPath::new(&ns, &repo, &file).map_err(ApiError::from)?;
    let response = with_hub(&state, move |hub| {
        let bytes_written = hub.upload_file(&auth.principal, &path, &mut body.as_ref())?;
        Ok(UploadResponse {
            path: path.to_string(),
            bytes_written,
        })
    })
    .await?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

pub async fn download_file(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo, file)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let path = ArtifactPath::new(&ns, &repo, &file).map_err(ApiError::from)?;
    let content = with_hub(&state, move |hub| hub.download_file(&auth.principal, &path)).await?;
    Ok::<_, ApiError>((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        content,
    ))
}

pub async fn delete_file(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo, file)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let path = ArtifactPath::new(&ns, &repo, &file).map_err(ApiError::from)?;
    with_hub(&state, move |hub| hub.delete_file(&auth.principal, &path)).await?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn import_file(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path((ns, repo, file)): Path<(String, String, String)>,
    Json(hints): Json<DialectHints>,
) -> impl IntoResponse {
    let path = ArtifactPath::new(&ns, &repo, &file).map_err(ApiError::from)?;
    let report = with_hub(&state, move |hub| {
        hub.import_file(&auth.principal, &path, &hints)
    })
    .await?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(report))))
}
