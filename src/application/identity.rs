//! Seam to the external identity collaborator.
//!
//! Login, logout and sessions live outside this service. Each request only
//! asks the provider who is calling; the answer is either a provisioned user
//! or anonymous.

use async_trait::async_trait;
use axum::http::HeaderMap;

use crate::application::repos::RepoError;
use crate::domain::entities::UserRecord;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the caller from request headers. `Ok(None)` means anonymous.
    async fn identify(&self, headers: &HeaderMap) -> Result<Option<UserRecord>, RepoError>;
}
