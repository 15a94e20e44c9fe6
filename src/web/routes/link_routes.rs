use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tracing::info;

use crate::db::models::{LinkPage, LinkQuery};
use crate::db::services as db_services;
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::models::GetLinkResponse;
use crate::web::{AppError, AppState};

async fn search_links_handler(
    State(app_state): State<Arc<AppState>>,
    Json(query): Json<LinkQuery>,
) -> Result<Json<LinkPage>, AppError> {
    let page = db_services::query_links(&app_state.db_pool, &query).await?;
    Ok(Json(page))
}

async fn get_link_handler(
    State(app_state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
) -> Result<Json<GetLinkResponse>, AppError> {
    let link = db_services::get_link(&app_state.db_pool, &link_id).await?;
    Ok(Json(GetLinkResponse { link }))
}

async fn delete_link_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
) -> Result<StatusCode, AppError> {
    db_services::delete_link(&app_state.db_pool, &link_id).await?;
    info!(link_id = %link_id, user = %authenticated_user.email, "Deleted link.");
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/search", post(search_links_handler))
        .route("/links/{id}", get(get_link_handler))
}

pub fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new().route("/links/{id}", delete(delete_link_handler))
}
