//! Scripted backend and fixtures shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::api::{ApiError, Backend, ConfigFetch, LoginResponse};
use crate::auth::Credential;
use crate::models::{
    BrandingMeta, Identity, IdentityUpdate, OptionsCatalog, Role, WorkspaceConfiguration,
};

enum Step<T> {
    Ready(T),
    Gated(oneshot::Receiver<T>),
}

/// Backend whose responses are queued by the test. Calls with nothing
/// queued fail.
#[derive(Default)]
pub struct FakeBackend {
    me: Mutex<VecDeque<Step<Result<Identity, ApiError>>>>,
    login: Mutex<VecDeque<Result<LoginResponse, ApiError>>>,
    profile: Mutex<VecDeque<Result<IdentityUpdate, ApiError>>>,
    config: Mutex<VecDeque<Step<ConfigFetch>>>,
    options: Mutex<VecDeque<Result<OptionsCatalog, ApiError>>>,
    me_calls: AtomicUsize,
    login_calls: AtomicUsize,
    config_calls: AtomicUsize,
    options_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_me(&self, result: Result<Identity, ApiError>) {
        self.me.lock().unwrap().push_back(Step::Ready(result));
    }

    pub fn push_gated_me(&self) -> oneshot::Sender<Result<Identity, ApiError>> {
        let (tx, rx) = oneshot::channel();
        self.me.lock().unwrap().push_back(Step::Gated(rx));
        tx
    }

    pub fn push_login(&self, result: Result<LoginResponse, ApiError>) {
        self.login.lock().unwrap().push_back(result);
    }

    pub fn push_profile(&self, result: Result<IdentityUpdate, ApiError>) {
        self.profile.lock().unwrap().push_back(result);
    }

    pub fn push_config(&self, fetch: ConfigFetch) {
        self.config.lock().unwrap().push_back(Step::Ready(fetch));
    }

    /// Queue a configuration response that is held until the returned
    /// sender fires.
    pub fn push_gated_config(&self) -> oneshot::Sender<ConfigFetch> {
        let (tx, rx) = oneshot::channel();
        self.config.lock().unwrap().push_back(Step::Gated(rx));
        tx
    }

    pub fn push_options(&self, result: Result<OptionsCatalog, ApiError>) {
        self.options.lock().unwrap().push_back(result);
    }

    pub fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn config_calls(&self) -> usize {
        self.config_calls.load(Ordering::SeqCst)
    }

    pub fn options_calls(&self) -> usize {
        self.options_calls.load(Ordering::SeqCst)
    }
}

fn unscripted(call: &str) -> ApiError {
    ApiError::ServerError(format!("no scripted response for {}", call))
}

#[async_trait]
impl Backend for FakeBackend {
    async fn me(&self, _credential: &Credential) -> Result<Identity, ApiError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.me.lock().unwrap().pop_front();
        match step {
            Some(Step::Ready(result)) => result,
            Some(Step::Gated(rx)) => rx.await.unwrap_or_else(|_| Err(unscripted("me"))),
            None => Err(unscripted("me")),
        }
    }

    async fn login(&self, _username: &str, _password: &str) -> Result<LoginResponse, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.login.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unscripted("login")))
    }

    async fn update_profile(
        &self,
        _credential: &Credential,
        _update: &IdentityUpdate,
    ) -> Result<IdentityUpdate, ApiError> {
        let next = self.profile.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unscripted("profile")))
    }

    async fn fetch_config(&self, _credential: &Credential) -> ConfigFetch {
        self.config_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.config.lock().unwrap().pop_front();
        match step {
            Some(Step::Ready(fetch)) => fetch,
            Some(Step::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| ConfigFetch::Transient(unscripted("config"))),
            None => ConfigFetch::Transient(unscripted("config")),
        }
    }

    async fn fetch_options(&self, _credential: &Credential) -> Result<OptionsCatalog, ApiError> {
        self.options_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.options.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unscripted("options")))
    }
}

pub fn config_expiring(expiry: DateTime<Utc>) -> WorkspaceConfiguration {
    WorkspaceConfiguration {
        company_name: "Lahore Knits".to_string(),
        subscription_expiry: expiry,
        branding: BrandingMeta::default(),
    }
}

pub fn options(seasons: &[&str]) -> OptionsCatalog {
    OptionsCatalog {
        seasons: seasons.iter().map(|s| s.to_string()).collect(),
        categories: vec!["Knitwear".to_string()],
        sizes: vec!["M".to_string()],
    }
}

pub fn identity(id: &str, role: Role) -> Identity {
    Identity {
        id: id.to_string(),
        display_name: format!("User {}", id),
        role,
        username: Some(id.to_string()),
        extra: Default::default(),
    }
}

pub fn login_response(token: &str, user: Identity) -> LoginResponse {
    LoginResponse {
        token: token.to_string(),
        user,
    }
}

/// Yield until the backend has seen `n` configuration requests.
pub async fn wait_for_config_calls(backend: &FakeBackend, n: usize) {
    while backend.config_calls() < n {
        tokio::task::yield_now().await;
    }
}

/// Yield until the backend has seen `n` identity requests.
pub async fn wait_for_me_calls(backend: &FakeBackend, n: usize) {
    while backend.me_calls() < n {
        tokio::task::yield_now().await;
    }
}
