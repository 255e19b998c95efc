//! API client for communicating with the workspace REST API.
//!
//! This module provides the `ApiClient` struct, the production `Backend`.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::Credential;
use crate::models::{
    FallbackConfiguration, Identity, IdentityUpdate, OptionsCatalog, WorkspaceConfiguration,
};

use super::{ApiError, Backend, ConfigFetch, LoginResponse};

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const ME_PATH: &str = "/auth/me";
const LOGIN_PATH: &str = "/auth/login";
const PROFILE_PATH: &str = "/auth/profile";
const CONFIG_PATH: &str = "/config";
const OPTIONS_PATH: &str = "/options";

/// Standard `{ success, data, message }` wrapper around successful bodies.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// API client for the workspace backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url` (e.g. `https://host/api`).
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, retrying with exponential backoff while the server
    /// answers 429. Any other status is returned to the caller unchecked.
    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().send().await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2; // Exponential backoff
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e)))
    }

    /// Unwrap the `data` field of an enveloped body.
    async fn parse_envelope<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        let envelope: Envelope<T> = Self::parse_json(response, url).await?;
        if !envelope.success {
            return Err(ApiError::InvalidResponse(
                envelope.message.unwrap_or_else(|| format!("{} reported failure", url)),
            ));
        }
        envelope
            .data
            .ok_or_else(|| ApiError::InvalidResponse(format!("Missing data in response from {}", url)))
    }

    async fn get_enveloped<T: DeserializeOwned>(
        &self,
        path: &str,
        credential: &Credential,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self
            .send_with_retry(&url, || self.client.get(&url).bearer_auth(credential.expose()))
            .await?;
        let response = Self::check_response(response).await?;
        Self::parse_envelope(response, &url).await
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn me(&self, credential: &Credential) -> Result<Identity, ApiError> {
        self.get_enveloped(ME_PATH, credential).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = self.url(LOGIN_PATH);
        let body = LoginRequest { username, password };

        let response = self
            .send_with_retry(&url, || self.client.post(&url).json(&body))
            .await?;
        let response = Self::check_response(response).await?;

        let login: LoginResponse = Self::parse_json(response, &url).await?;
        debug!(user_id = %login.user.id, "Login accepted");
        Ok(login)
    }

    async fn update_profile(
        &self,
        credential: &Credential,
        update: &IdentityUpdate,
    ) -> Result<IdentityUpdate, ApiError> {
        let url = self.url(PROFILE_PATH);
        let response = self
            .send_with_retry(&url, || {
                self.client
                    .put(&url)
                    .bearer_auth(credential.expose())
                    .json(update)
            })
            .await?;
        let response = Self::check_response(response).await?;
        Self::parse_envelope(response, &url).await
    }

    async fn fetch_config(&self, credential: &Credential) -> ConfigFetch {
        let url = self.url(CONFIG_PATH);
        let response = match self
            .send_with_retry(&url, || self.client.get(&url).bearer_auth(credential.expose()))
            .await
        {
            Ok(response) => response,
            Err(e) => return ConfigFetch::Transient(e),
        };

        // Read the whole denial body: the fallback fields live in it.
        if response.status() == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            debug!("Configuration fetch denied with 403");
            return ConfigFetch::Denied(FallbackConfiguration::from_denial_body(&body));
        }

        let result: Result<WorkspaceConfiguration, ApiError> = async {
            let response = Self::check_response(response).await?;
            Self::parse_envelope(response, &url).await
        }
        .await;

        match result {
            Ok(config) => ConfigFetch::Success(config),
            Err(e) => ConfigFetch::Transient(e),
        }
    }

    async fn fetch_options(&self, credential: &Credential) -> Result<OptionsCatalog, ApiError> {
        self.get_enveloped(OPTIONS_PATH, credential).await
    }
}
