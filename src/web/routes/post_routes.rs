use axum::{
    Json, Router,
    extract::{Extension, State},
    routing::post,
};
use std::sync::Arc;
use tracing::info;

use crate::publish::{CreatePostRequest, CreatePostResponse};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::{AppError, AppState};

async fn create_post_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<CreatePostResponse>, AppError> {
    info!(slug = %payload.post.meta.slug, user = %authenticated_user.email, "Publishing post.");
    let url = app_state.coordinator.publish(&payload.post).await?;
    Ok(Json(CreatePostResponse { url }))
}

pub fn create_post_router() -> Router<Arc<AppState>> {
    Router::new().route("/post", post(create_post_handler))
}
