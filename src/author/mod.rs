//! Bulk authoring: authenticate once, then render and publish many markdown files
//! through a bounded worker pool.
//!
//! The identity provider, the renderer and the publish endpoint are collaborators
//! behind the traits below; [`clients`] has their HTTP implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::publish::{Post, PublishCoordinator};
use crate::web::error::AppError;

pub mod clients;
pub mod config;
pub mod driver;

pub use clients::{AuthClient, LibrarianClient, RendererClient};
pub use config::AuthorConfig;
pub use driver::{BatchReport, BulkPublisher, DriverState, ItemOutcome};

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Exchanges credentials for tokens.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<TokenPair, AppError>;
}

/// Turns markdown into a rendered post with its metadata.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, access_token: &str, markdown: &str) -> Result<Post, AppError>;
}

/// Publishes a rendered post and returns its public URL.
#[async_trait]
pub trait PostPublisher: Send + Sync {
    async fn publish(&self, access_token: &str, post: &Post) -> Result<String, AppError>;
}

/// In-process publishing; the caller is trusted, so the token is not checked.
#[async_trait]
impl PostPublisher for PublishCoordinator {
    async fn publish(&self, _access_token: &str, post: &Post) -> Result<String, AppError> {
        PublishCoordinator::publish(self, post).await
    }
}
