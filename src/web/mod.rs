use axum::{
    Router,
    http::Method,
    middleware as axum_middleware,
    routing::get,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::publish::PublishCoordinator;

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

pub use error::AppError;

use middleware::auth::{self, IdentityVerifier};
use routes::{link_routes, post_routes, tag_routes};

pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub coordinator: Arc<PublishCoordinator>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(
    db_pool: DatabaseConnection,
    coordinator: Arc<PublishCoordinator>,
    verifier: Arc<dyn IdentityVerifier>,
) -> Router {
    let app_state = Arc::new(AppState {
        db_pool,
        coordinator,
        verifier,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let protected = link_routes::create_protected_router()
        .merge(post_routes::create_post_router())
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth));

    Router::new()
        .route("/health", get(health_check_handler))
        .merge(link_routes::create_public_router())
        .merge(tag_routes::create_tags_router())
        .merge(protected)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{LinkPage, LinkQuery};
    use crate::db::{connect, schema};
    use crate::publish::{CreatePostRequest, CreatePostResponse, Post, PostMeta};
    use crate::storage::{BlobPublisher, MemoryObjectStore};
    use crate::web::error::ErrorBody;
    use crate::web::middleware::auth::AuthenticatedUser;
    use crate::web::models::{GetLinkResponse, TagsResponse};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    struct StaticVerifier;

    #[async_trait]
    impl IdentityVerifier for StaticVerifier {
        async fn verify(&self, access_token: &str) -> Result<AuthenticatedUser, AppError> {
            if access_token == "good-token" {
                Ok(AuthenticatedUser {
                    email: "admin@example.com".to_string(),
                })
            } else {
                Err(AppError::Unauthorized("unknown token".to_string()))
            }
        }
    }

    async fn app() -> (Router, Arc<MemoryObjectStore>) {
        let db = connect("sqlite::memory:", 1).await.unwrap();
        schema::create_tables(&db).await.unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        let coordinator = Arc::new(PublishCoordinator::new(
            db.clone(),
            BlobPublisher::new(store.clone()),
            "https://blog.example",
        ));
        (create_axum_router(db, coordinator, Arc::new(StaticVerifier)), store)
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: &impl serde::Serialize) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn create_post(slug: &str, tags: &[&str]) -> CreatePostRequest {
        CreatePostRequest {
            post: Post {
                meta: PostMeta {
                    title: format!("About {slug}"),
                    slug: slug.to_string(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    date: "2024-05-01".to_string(),
                    ..Default::default()
                },
                post_html: "<p>hi</p>".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _) = app().await;
        let response = app
            .oneshot(empty_request(Method::GET, "/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn publishing_requires_a_valid_token() {
        let (app, store) = app().await;

        let missing = app
            .clone()
            .oneshot(json_request(Method::POST, "/post", None, &create_post("a", &[])))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .oneshot(json_request(Method::POST, "/post", Some("bad"), &create_post("a", &[])))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        let body: ErrorBody = read_json(wrong).await;
        assert_eq!(body.error_type, "Unauthorized");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn publish_then_read_back() {
        let (app, _) = app().await;

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/post",
                Some("good-token"),
                &create_post("hello", &["rust", "web"]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created: CreatePostResponse = read_json(response).await;
        assert_eq!(created.url, "https://blog.example/posts/hello.html");

        let response = app
            .clone()
            .oneshot(empty_request(Method::GET, "/links/hello", None))
            .await
            .unwrap();
        let fetched: GetLinkResponse = read_json(response).await;
        assert_eq!(fetched.link.unwrap().title, "About hello");

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/search",
                None,
                &LinkQuery::default().with_tags(["web"]),
            ))
            .await
            .unwrap();
        let page: LinkPage = read_json(response).await;
        assert_eq!(page.links.len(), 1);
        assert!(page.is_last_page);

        let response = app
            .oneshot(empty_request(Method::GET, "/tags", None))
            .await
            .unwrap();
        let tags: TagsResponse = read_json(response).await;
        assert_eq!(tags.tags, vec!["rust", "web"]);
    }

    #[tokio::test]
    async fn unknown_link_is_null_not_an_error() {
        let (app, _) = app().await;
        let response = app
            .oneshot(empty_request(Method::GET, "/links/nope", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: GetLinkResponse = read_json(response).await;
        assert!(fetched.link.is_none());
    }

    #[tokio::test]
    async fn delete_is_protected_and_reports_missing_links() {
        let (app, _) = app().await;
        app.clone()
            .oneshot(json_request(Method::POST, "/post", Some("good-token"), &create_post("gone", &[])))
            .await
            .unwrap();

        let anonymous = app
            .clone()
            .oneshot(empty_request(Method::DELETE, "/links/gone", None))
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let deleted = app
            .clone()
            .oneshot(empty_request(Method::DELETE, "/links/gone", Some("good-token")))
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let again = app
            .oneshot(empty_request(Method::DELETE, "/links/gone", Some("good-token")))
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_query_is_a_bad_request() {
        let (app, _) = app().await;
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/search",
                None,
                &LinkQuery::default().between(Some("yesterday"), None),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error_type, "InvalidInput");
    }
}
