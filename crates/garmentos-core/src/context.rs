//! Composition root.
//!
//! `AuthorityContext` builds the session and entitlement authorities over a
//! shared backend and credential store, and drives the triggers between
//! them: startup validation, rechecks on route changes and after login, and
//! shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::{ApiClient, Backend};
use crate::auth::{AuthError, CredentialReader, CredentialStore, SessionAuthority};
use crate::config::Config;
use crate::entitlement::{EntitlementAuthority, RecheckOutcome, TransientErrorPolicy};
use crate::models::Identity;
use crate::navigation::{NavigationGuard, Route};

#[derive(Clone)]
pub struct AuthorityContext {
    session: SessionAuthority,
    entitlement: EntitlementAuthority,
}

impl AuthorityContext {
    /// Wire everything against the real backend described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ApiClient::new(config.api_url(), config.request_timeout_secs)
            .context("Failed to create API client")?;
        let store = config
            .credential_store()
            .context("Failed to open credential store")?;
        info!(api = %config.api_url(), backend = ?config.credential_backend, "Authority context ready");
        Ok(Self::with_parts(
            Arc::new(client),
            store,
            config.transient_error_policy,
        ))
    }

    pub fn with_parts(
        backend: Arc<dyn Backend>,
        store: Arc<dyn CredentialStore>,
        policy: TransientErrorPolicy,
    ) -> Self {
        let entitlement = EntitlementAuthority::new(
            Arc::clone(&backend),
            CredentialReader::new(Arc::clone(&store)),
            policy,
        );
        let session = SessionAuthority::new(backend, store, entitlement.clone());
        Self {
            session,
            entitlement,
        }
    }

    pub fn session(&self) -> &SessionAuthority {
        &self.session
    }

    pub fn entitlement(&self) -> &EntitlementAuthority {
        &self.entitlement
    }

    pub fn guard(&self) -> NavigationGuard {
        NavigationGuard::new(self.session.subscribe(), self.entitlement.subscribe())
    }

    /// Startup: validate the stored credential and run the first recheck
    /// concurrently.
    pub async fn bootstrap(&self) -> Option<Identity> {
        let (identity, outcome) =
            future::join(self.session.validate(), self.entitlement.recheck()).await;
        debug!(?outcome, signed_in = identity.is_some(), "Bootstrap finished");

        // The recheck may have raced a credential that failed validation.
        if identity.is_none() && !matches!(outcome, RecheckOutcome::NoCredential) {
            self.entitlement.reset();
        }
        identity
    }

    /// Recheck trigger for the routing layer. Runs in the background when a
    /// user is signed in and the new route is not the login route.
    pub fn on_route_change(&self, route: &Route) -> Option<JoinHandle<RecheckOutcome>> {
        if *route == Route::Login || !self.session.is_authenticated() {
            return None;
        }
        debug!(route = %route, "Route changed, rechecking entitlement");
        let entitlement = self.entitlement.clone();
        Some(tokio::spawn(async move { entitlement.recheck().await }))
    }

    pub async fn login_and_recheck(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let identity = self.session.login(username, password).await?;
        self.entitlement.recheck().await;
        Ok(identity)
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.session.logout()
    }

    /// Stop both authorities. Responses still in flight are discarded.
    pub fn teardown(&self) {
        self.session.teardown();
        self.entitlement.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Mutex};

    use chrono::{Duration, Utc};

    use crate::api::{ApiError, ConfigFetch};
    use crate::auth::{Credential, MemoryCredentialStore};
    use crate::entitlement::{EntitlementPhase, EntitlementStatus};
    use crate::models::Role;
    use crate::navigation::GuardDecision;
    use crate::testing::{config_expiring, identity, login_response, options, FakeBackend};

    fn context(
        stored: Option<&str>,
        policy: TransientErrorPolicy,
    ) -> (Arc<FakeBackend>, Arc<dyn CredentialStore>, AuthorityContext) {
        let backend = Arc::new(FakeBackend::new());
        let store: Arc<dyn CredentialStore> = match stored {
            Some(token) => Arc::new(MemoryCredentialStore::with_credential(Credential::new(token))),
            None => Arc::new(MemoryCredentialStore::new()),
        };
        let ctx = AuthorityContext::with_parts(backend.clone(), Arc::clone(&store), policy);
        (backend, store, ctx)
    }

    /// Memory store whose next `load()` reads the credential and then blocks
    /// until released.
    struct GatedStore {
        inner: MemoryCredentialStore,
        gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    }

    impl GatedStore {
        fn new() -> Self {
            Self {
                inner: MemoryCredentialStore::new(),
                gate: Mutex::new(None),
            }
        }

        /// Returns (entered, release).
        fn arm(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            *self.gate.lock().unwrap() = Some((entered_tx, release_rx));
            (entered_rx, release_tx)
        }
    }

    impl CredentialStore for GatedStore {
        fn load(&self) -> anyhow::Result<Option<Credential>> {
            let loaded = self.inner.load();
            let gate = self.gate.lock().unwrap().take();
            if let Some((entered, release)) = gate {
                entered.send(()).unwrap();
                release.recv().unwrap();
            }
            loaded
        }

        fn store(&self, credential: &Credential) -> anyhow::Result<()> {
            self.inner.store(credential)
        }

        fn clear(&self) -> anyhow::Result<()> {
            self.inner.clear()
        }
    }

    fn valid_config() -> ConfigFetch {
        ConfigFetch::Success(config_expiring(Utc::now() + Duration::days(30)))
    }

    #[tokio::test]
    async fn test_bootstrap_with_valid_credential() {
        let (backend, _store, ctx) = context(Some("tok"), TransientErrorPolicy::Retain);
        backend.push_me(Ok(identity("u1", Role::Staff)));
        backend.push_config(valid_config());
        backend.push_options(Ok(options(&["SS26"])));

        let signed_in = ctx.bootstrap().await;

        assert!(signed_in.is_some());
        assert_eq!(ctx.entitlement().snapshot().phase(), EntitlementPhase::Active);
        let mut guard = ctx.guard();
        assert_eq!(guard.decide(&Route::Dashboard), GuardDecision::Stay);
        assert_eq!(guard.decide(&Route::Login), GuardDecision::Redirect(Route::Dashboard));
    }

    #[tokio::test]
    async fn test_bootstrap_without_credential() {
        let (backend, _store, ctx) = context(None, TransientErrorPolicy::Retain);

        assert!(ctx.bootstrap().await.is_none());

        assert_eq!(backend.me_calls(), 0);
        assert_eq!(backend.config_calls(), 0);
        assert_eq!(ctx.entitlement().snapshot().phase(), EntitlementPhase::Idle);
        assert_eq!(
            ctx.guard().decide(&Route::Dashboard),
            GuardDecision::Redirect(Route::Login)
        );
    }

    #[tokio::test]
    async fn test_bootstrap_rejected_credential_drops_configuration() {
        let (backend, store, ctx) = context(Some("stale"), TransientErrorPolicy::Retain);
        backend.push_me(Err(ApiError::Unauthorized(String::new())));
        backend.push_config(valid_config());
        backend.push_options(Ok(options(&["SS26"])));

        assert!(ctx.bootstrap().await.is_none());

        assert!(store.load().expect("load").is_none());
        let snapshot = ctx.entitlement().snapshot();
        assert_eq!(snapshot.phase(), EntitlementPhase::Idle);
        assert!(snapshot.configuration.is_none());
    }

    #[tokio::test]
    async fn test_route_change_rechecks_only_when_signed_in() {
        let (backend, _store, ctx) = context(None, TransientErrorPolicy::Retain);
        ctx.bootstrap().await;
        assert!(ctx.on_route_change(&Route::Dashboard).is_none());

        backend.push_login(Ok(login_response("tok", identity("u1", Role::Staff))));
        ctx.session().login("sana", "pw").await.expect("login");
        assert!(ctx.on_route_change(&Route::Login).is_none());

        backend.push_config(valid_config());
        backend.push_options(Ok(options(&["SS26"])));
        let handle = ctx.on_route_change(&Route::Articles).expect("recheck spawned");
        let outcome = handle.await.expect("recheck task");

        assert_eq!(outcome, RecheckOutcome::Applied(EntitlementStatus::Active));
        assert_eq!(backend.config_calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_workspace_after_login() {
        let (backend, _store, ctx) = context(None, TransientErrorPolicy::Retain);
        ctx.bootstrap().await;

        backend.push_login(Ok(login_response("tok", identity("u1", Role::Staff))));
        backend.push_config(ConfigFetch::Success(config_expiring(
            Utc::now() - Duration::days(1),
        )));
        ctx.login_and_recheck("sana", "pw").await.expect("login");

        let snapshot = ctx.entitlement().snapshot();
        assert!(snapshot.expired());
        assert!(snapshot.options.is_none());
        assert_eq!(backend.options_calls(), 0);
        assert_eq!(
            ctx.guard().decide(&Route::Dashboard),
            GuardDecision::Redirect(Route::SubscriptionExpired)
        );
    }

    #[tokio::test]
    async fn test_stale_state_survives_network_error() {
        let (backend, _store, ctx) = context(Some("tok"), TransientErrorPolicy::Retain);
        backend.push_me(Ok(identity("u1", Role::Staff)));
        backend.push_config(valid_config());
        backend.push_options(Ok(options(&["SS26"])));
        ctx.bootstrap().await;

        backend.push_config(ConfigFetch::Transient(ApiError::ServerError("offline".into())));
        let outcome = ctx
            .on_route_change(&Route::Options)
            .expect("recheck spawned")
            .await
            .expect("recheck task");

        assert_eq!(outcome, RecheckOutcome::Retained);
        let snapshot = ctx.entitlement().snapshot();
        assert_eq!(snapshot.phase(), EntitlementPhase::Active);
        assert_eq!(
            snapshot.options.map(|o| o.seasons),
            Some(vec!["SS26".to_string()])
        );
    }

    #[tokio::test]
    async fn test_logout_from_expired_then_login_starts_idle() {
        let (backend, _store, ctx) = context(Some("tok"), TransientErrorPolicy::Retain);
        backend.push_me(Ok(identity("u1", Role::Staff)));
        backend.push_config(ConfigFetch::Denied(Default::default()));
        ctx.bootstrap().await;
        assert!(ctx.entitlement().is_expired());

        ctx.logout().expect("logout");
        backend.push_login(Ok(login_response("tok2", identity("u2", Role::Admin))));
        ctx.session().login("ali", "pw").await.expect("login");

        assert_eq!(ctx.entitlement().snapshot().phase(), EntitlementPhase::Idle);
        assert_eq!(
            ctx.guard().decide(&Route::Login),
            GuardDecision::Redirect(Route::Dashboard)
        );
    }

    #[tokio::test]
    async fn test_teardown_stops_rechecks() {
        let (backend, _store, ctx) = context(Some("tok"), TransientErrorPolicy::Retain);
        backend.push_me(Ok(identity("u1", Role::Staff)));
        backend.push_config(valid_config());
        backend.push_options(Ok(options(&["SS26"])));
        ctx.bootstrap().await;

        ctx.teardown();

        assert!(!ctx.session().is_authenticated());
        assert_eq!(ctx.entitlement().recheck().await, RecheckOutcome::Closed);
        assert_eq!(backend.config_calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_logout_during_route_recheck_discards_response() {
        let backend = Arc::new(FakeBackend::new());
        let store = Arc::new(GatedStore::new());
        let ctx = AuthorityContext::with_parts(
            backend.clone(),
            store.clone(),
            TransientErrorPolicy::Retain,
        );
        ctx.bootstrap().await;

        backend.push_login(Ok(login_response("tok", identity("u1", Role::Staff))));
        ctx.session().login("sana", "pw").await.expect("login");

        backend.push_config(valid_config());
        backend.push_options(Ok(options(&["PREV-SESSION"])));
        let (entered, release) = store.arm();
        let handle = ctx.on_route_change(&Route::Articles).expect("recheck spawned");

        // The recheck has read the credential and is parked inside the store.
        tokio::task::spawn_blocking(move || entered.recv())
            .await
            .expect("join")
            .expect("store entered");
        ctx.logout().expect("logout");
        release.send(()).expect("release");

        let outcome = handle.await.expect("recheck task");

        assert_eq!(outcome, RecheckOutcome::Superseded);
        assert!(ctx.session().identity().is_none());
        assert!(store.load().expect("load").is_none());
        let snapshot = ctx.entitlement().snapshot();
        assert_eq!(snapshot.phase(), EntitlementPhase::Idle);
        assert!(snapshot.configuration.is_none());
        assert!(snapshot.options.is_none());
    }
}
