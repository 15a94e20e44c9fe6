//! HTTP clients for the identity provider, the renderer and the librarian service.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Authenticator, Credentials, PostPublisher, Renderer, TokenPair};
use crate::db::models::{Link, LinkPage, LinkQuery};
use crate::publish::{CreatePostRequest, CreatePostResponse, Post};
use crate::web::error::{AppError, ErrorBody};
use crate::web::middleware::auth::{AuthenticatedUser, IdentityVerifier};
use crate::web::models::{GetLinkResponse, TagsResponse};

/// Decodes a success body into `T`, or an error body into an [`AppError`].
pub(crate) async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.bytes().await?;
    let message = match serde_json::from_slice::<ErrorBody>(&body) {
        Ok(typed) => format!("{status} {}: {}", typed.error_type, typed.error),
        Err(_) => format!("{status}: {}", String::from_utf8_lossy(&body)),
    };
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::BAD_REQUEST => AppError::InvalidInput(message),
        _ => AppError::UpstreamError(message),
    })
}

fn endpoint_url(endpoint: &str, path: &str) -> String {
    format!("{}{path}", endpoint.trim_end_matches('/'))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPairResponse {
    token_pair: TokenPair,
}

#[derive(Deserialize)]
struct GetUserResponse {
    user: AuthenticatedUser,
}

/// Client for the identity provider.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    endpoint: String,
}

impl AuthClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<TokenPair, AppError> {
        let response = self
            .client
            .post(endpoint_url(&self.endpoint, "/token"))
            .json(credentials)
            .send()
            .await?;
        handle_response::<TokenPairResponse>(response)
            .await
            .map(|r| r.token_pair)
    }

    pub async fn get_user(&self, access_token: &str) -> Result<AuthenticatedUser, AppError> {
        let response = self
            .client
            .post(endpoint_url(&self.endpoint, "/user"))
            .bearer_auth(access_token)
            .send()
            .await?;
        handle_response::<GetUserResponse>(response)
            .await
            .map(|r| r.user)
    }
}

#[async_trait]
impl Authenticator for AuthClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<TokenPair, AppError> {
        self.login(credentials).await
    }
}

#[async_trait]
impl IdentityVerifier for AuthClient {
    async fn verify(&self, access_token: &str) -> Result<AuthenticatedUser, AppError> {
        self.get_user(access_token).await
    }
}

#[derive(Serialize)]
struct GeneratePostRequest<'a> {
    markdown: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratePostResponse {
    generated_post: Post,
}

/// Client for the markdown renderer.
#[derive(Clone)]
pub struct RendererClient {
    client: Client,
    endpoint: String,
}

impl RendererClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Renderer for RendererClient {
    async fn render(&self, access_token: &str, markdown: &str) -> Result<Post, AppError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(access_token)
            .json(&GeneratePostRequest { markdown })
            .send()
            .await?;
        handle_response::<GeneratePostResponse>(response)
            .await
            .map(|r| r.generated_post)
    }
}

/// Client for the librarian's HTTP surface.
#[derive(Clone)]
pub struct LibrarianClient {
    client: Client,
    endpoint: String,
}

impl LibrarianClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub async fn upload_post(&self, access_token: &str, post: &Post) -> Result<String, AppError> {
        let response = self
            .client
            .post(endpoint_url(&self.endpoint, "/post"))
            .bearer_auth(access_token)
            .json(&CreatePostRequest { post: post.clone() })
            .send()
            .await?;
        handle_response::<CreatePostResponse>(response)
            .await
            .map(|r| r.url)
    }

    pub async fn search_links(&self, query: &LinkQuery) -> Result<LinkPage, AppError> {
        let response = self
            .client
            .post(endpoint_url(&self.endpoint, "/search"))
            .json(query)
            .send()
            .await?;
        handle_response(response).await
    }

    /// `None` when the librarian has no link with this id.
    pub async fn get_link(&self, link_id: &str) -> Result<Option<Link>, AppError> {
        let response = self
            .client
            .get(endpoint_url(&self.endpoint, &format!("/links/{link_id}")))
            .send()
            .await?;
        handle_response::<GetLinkResponse>(response)
            .await
            .map(|r| r.link)
    }

    pub async fn delete_link(&self, access_token: &str, link_id: &str) -> Result<(), AppError> {
        let response = self
            .client
            .delete(endpoint_url(&self.endpoint, &format!("/links/{link_id}")))
            .bearer_auth(access_token)
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        handle_response::<serde_json::Value>(response).await.map(|_| ())
    }

    pub async fn list_tags(&self) -> Result<Vec<String>, AppError> {
        let response = self
            .client
            .get(endpoint_url(&self.endpoint, "/tags"))
            .send()
            .await?;
        handle_response::<TagsResponse>(response)
            .await
            .map(|r| r.tags)
    }
}

#[async_trait]
impl PostPublisher for LibrarianClient {
    async fn publish(&self, access_token: &str, post: &Post) -> Result<String, AppError> {
        self.upload_post(access_token, post).await
    }
}
