use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::Credential;
use crate::models::{
    FallbackConfiguration, Identity, IdentityUpdate, OptionsCatalog, WorkspaceConfiguration,
};

use super::ApiError;

/// Successful `POST /auth/login` body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Identity,
}

/// Outcome of `GET /config`, classified at the HTTP boundary so callers
/// match on it instead of probing error payloads.
#[derive(Debug)]
pub enum ConfigFetch {
    /// The workspace configuration was returned.
    Success(WorkspaceConfiguration),
    /// The backend refused with 403: the subscription is not valid. Carries
    /// whatever fallback fields the denial body had.
    Denied(FallbackConfiguration),
    /// Anything else: network failure, server error, unparseable body.
    Transient(ApiError),
}

/// The backend operations the session and entitlement authorities use.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /auth/me`
    async fn me(&self, credential: &Credential) -> Result<Identity, ApiError>;

    /// `POST /auth/login`
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// `PUT /auth/profile`, returning the partial identity the backend stored.
    async fn update_profile(
        &self,
        credential: &Credential,
        update: &IdentityUpdate,
    ) -> Result<IdentityUpdate, ApiError>;

    /// `GET /config`
    async fn fetch_config(&self, credential: &Credential) -> ConfigFetch;

    /// `GET /options`
    async fn fetch_options(&self, credential: &Credential) -> Result<OptionsCatalog, ApiError>;
}
