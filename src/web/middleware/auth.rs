use async_trait::async_trait;
use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::web::{AppState, error::AppError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    #[serde(default)]
    pub email: String,
}

/// Resolves a bearer token to the identity it was issued for.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, access_token: &str) -> Result<AuthenticatedUser, AppError>;
}

pub async fn auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let authenticated_user = state.verifier.verify(&token).await.map_err(|e| {
        warn!(error = %e, "Token verification failed during auth middleware.");
        match e {
            AppError::Unauthorized(_) | AppError::NotFound(_) | AppError::InvalidInput(_) => {
                AppError::Unauthorized("Invalid bearer token".to_string())
            }
            other => other,
        }
    })?;

    req.extensions_mut().insert(authenticated_user);
    Ok(next.run(req).await)
}
