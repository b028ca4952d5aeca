mod cards;
mod collaborators;
mod files;
mod repos;
mod tables;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

use crate::error::Result;
use crate::hub::Hub;
use crate::server::AppState;
use crate::server::response::ApiError;

/// Largest accepted file upload.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Runs a blocking `Hub` call on tokio's blocking pool.
pub(super) async fn with_hub<T, F>(state: &Arc<AppState>, f: F) -> std::result::Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Hub) -> Result<T> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.hub))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "blocking task failed");
            ApiError::internal("Internal server error")
        })?
        .map_err(ApiError::from)
}

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Repos
        .route("/{ns}/repos", get(repos::list_repos))
        .route("/{ns}/repos", post(repos::create_repo))
        .route("/{ns}/{repo}", delete(repos::delete_repo))
        // Tables and queries
        .route("/{ns}/{repo}/tables", get(tables::list_relations))
        .route("/{ns}/{repo}/tables/{table}", get(tables::browse_table))
        .route("/{ns}/{repo}/tables/{table}", delete(tables::drop_table))
        .route(
            "/{ns}/{repo}/tables/{table}/export",
            post(tables::export_table),
        )
        .route("/{ns}/{repo}/query", post(tables::run_query))
        // Cards
        .route("/{ns}/{repo}/cards", get(cards::list_cards))
        .route("/{ns}/{repo}/cards", post(cards::create_card))
        .route("/{ns}/{repo}/cards/{card}", get(cards::view_card))
        .route("/{ns}/{repo}/cards/{card}", delete(cards::delete_card))
        .route("/{ns}/{repo}/cards/{card}/export", post(cards::export_card))
        // Files
        .route("/{ns}/{repo}/files", get(files::list_files))
        .route(
            "/{ns}/{repo}/files/{file}",
            put(files::upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/{ns}/{repo}/files/{file}", get(files::download_file))
        .route("/{ns}/{repo}/files/{file}", delete(files::delete_file))
        .route("/{ns}/{repo}/files/{file}/import", post(files::import_file))
        // Collaborators
        .route(
            "/{ns}/{repo}/collaborators",
            get(collaborators::list_collaborators),
        )
        .route(
            "/{ns}/{repo}/collaborators/{user}",
            put(collaborators::add_collaborator),
        )
        .route(
            "/{ns}/{repo}/collaborators/{user}",
            delete(collaborators::remove_collaborator),
        )
}
