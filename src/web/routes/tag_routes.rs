use axum::{Json, Router, extract::State, routing::get};
use std::sync::Arc;

use crate::db::services as db_services;
use crate::web::models::TagsResponse;
use crate::web::{AppError, AppState};

async fn list_tags_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<TagsResponse>, AppError> {
    let tags = db_services::list_tag_ids(&app_state.db_pool).await?;
    Ok(Json(TagsResponse { tags }))
}

pub fn create_tags_router() -> Router<Arc<AppState>> {
    Router::new().route("/tags", get(list_tags_handler))
}
