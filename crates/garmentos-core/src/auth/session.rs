use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, Backend};
use crate::entitlement::EntitlementAuthority;
use crate::models::{Identity, IdentityUpdate};

use super::{AuthError, Credential, CredentialStore};

/// Message shown when the backend rejects a login without saying why.
const DEFAULT_LOGIN_ERROR: &str = "Invalid credentials";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub resolving: bool,
    pending: usize,
}

impl SessionSnapshot {
    fn initial() -> Self {
        Self {
            identity: None,
            // Startup validation has not run yet.
            resolving: true,
            pending: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

struct Inner {
    backend: Arc<dyn Backend>,
    store: Arc<dyn CredentialStore>,
    entitlement: EntitlementAuthority,
    state: watch::Sender<SessionSnapshot>,
    /// Bumped by every login/logout/invalidation; a validation that started
    /// under an older epoch must not overwrite the newer session.
    epoch: AtomicU64,
    closed: AtomicBool,
}

/// Resolves the stored credential into an `Identity` and owns the
/// credential/identity pair.
///
/// Cloning yields another handle to the same authority.
#[derive(Clone)]
pub struct SessionAuthority {
    inner: Arc<Inner>,
}

/// Keeps the resolving flag raised for the lifetime of one operation.
struct ResolvingScope<'a> {
    state: &'a watch::Sender<SessionSnapshot>,
}

impl<'a> ResolvingScope<'a> {
    fn enter(state: &'a watch::Sender<SessionSnapshot>) -> Self {
        state.send_modify(|s| {
            s.pending += 1;
            s.resolving = true;
        });
        Self { state }
    }
}

impl Drop for ResolvingScope<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| {
            s.pending = s.pending.saturating_sub(1);
            s.resolving = s.pending > 0;
        });
    }
}

impl SessionAuthority {
    /// `entitlement` is reset on logout so one session's workspace data
    /// never survives into the next.
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn CredentialStore>,
        entitlement: EntitlementAuthority,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::initial());
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                entitlement,
                state,
                epoch: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().identity.is_some()
    }

    pub fn is_resolving(&self) -> bool {
        self.inner.state.borrow().resolving
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    fn bump_epoch(&self) -> u64 {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn set_identity(&self, identity: Option<Identity>) {
        self.inner.state.send_modify(|s| s.identity = identity);
    }

    /// Clear credential and identity if nothing changed the session since
    /// `epoch` was read.
    fn invalidate_since(&self, epoch: u64) {
        if self
            .inner
            .epoch
            .compare_exchange(epoch, epoch + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Session changed during request, not invalidating");
            return;
        }
        if let Err(e) = self.inner.store.clear() {
            error!(error = %e, "Failed to clear rejected credential");
        }
        self.set_identity(None);
        self.inner.entitlement.reset();
    }

    /// Resolve the stored credential into an identity. Run once at startup.
    ///
    /// Any failure, including network errors, clears the stored credential.
    pub async fn validate(&self) -> Option<Identity> {
        let _resolving = ResolvingScope::enter(&self.inner.state);
        if self.is_closed() {
            return None;
        }
        let epoch = self.epoch();

        let credential = match self.inner.store.load() {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                debug!("No stored credential");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Stored credential unreadable, discarding");
                self.invalidate_since(epoch);
                return None;
            }
        };

        match self.inner.backend.me(&credential).await {
            Ok(identity) => {
                if self.epoch() != epoch {
                    debug!("Session changed during validation, discarding result");
                    return self.identity();
                }
                info!(user_id = %identity.id, role = identity.role.as_str(), "Session validated");
                self.set_identity(Some(identity.clone()));
                Some(identity)
            }
            Err(e) => {
                warn!(error = %e, "Stored credential rejected, clearing session");
                self.invalidate_since(epoch);
                None
            }
        }
    }

    /// Exchange a username/password pair for a credential and identity.
    ///
    /// Does not recheck the entitlement; callers do that explicitly.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        if self.is_closed() {
            return Err(AuthError::Closed);
        }
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Authentication(
                "Username and password required".to_string(),
            ));
        }

        let _resolving = ResolvingScope::enter(&self.inner.state);

        let response = self
            .inner
            .backend
            .login(username, password)
            .await
            .map_err(|e| {
                if e.is_credential_rejection() {
                    AuthError::Authentication(
                        e.server_message()
                            .unwrap_or_else(|| DEFAULT_LOGIN_ERROR.to_string()),
                    )
                } else {
                    error!(error = %e, "Login request failed");
                    AuthError::Transport(e)
                }
            })?;

        let credential = Credential::new(response.token);
        self.inner.store.store(&credential).map_err(AuthError::Storage)?;
        self.bump_epoch();
        self.set_identity(Some(response.user.clone()));

        info!(user_id = %response.user.id, role = response.user.role.as_str(), "Login successful");
        Ok(response.user)
    }

    /// Clear the credential and identity, and discard entitlement state.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.bump_epoch();
        self.set_identity(None);
        self.inner.entitlement.reset();
        self.inner.store.clear().map_err(|e| {
            error!(error = %e, "Failed to clear stored credential");
            AuthError::Storage(e)
        })?;
        info!("Logged out");
        Ok(())
    }

    /// Send a partial profile update and merge the result into the identity.
    pub async fn update_identity(&self, update: IdentityUpdate) -> Result<Identity, AuthError> {
        if self.is_closed() {
            return Err(AuthError::Closed);
        }
        if !self.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }
        let epoch = self.epoch();
        let credential = self
            .inner
            .store
            .load()
            .map_err(AuthError::Storage)?
            .ok_or(AuthError::NotAuthenticated)?;

        let _resolving = ResolvingScope::enter(&self.inner.state);

        match self.inner.backend.update_profile(&credential, &update).await {
            Ok(partial) => {
                if self.epoch() != epoch {
                    return Err(AuthError::NotAuthenticated);
                }
                self.inner.state.send_modify(|s| {
                    if let Some(identity) = s.identity.as_mut() {
                        identity.merge(partial);
                    }
                });
                debug!("Profile updated");
                self.identity().ok_or(AuthError::NotAuthenticated)
            }
            Err(ApiError::Unauthorized(_)) => {
                warn!("Credential rejected during profile update, clearing session");
                self.invalidate_since(epoch);
                Err(AuthError::SessionInvalid)
            }
            Err(e) => Err(AuthError::Transport(e)),
        }
    }

    /// End the session lifecycle. The stored credential is kept so the next
    /// process start can validate it.
    pub fn teardown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.bump_epoch();
        self.set_identity(None);
        info!("Session authority shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::api::ConfigFetch;
    use crate::auth::{CredentialReader, MemoryCredentialStore};
    use crate::entitlement::{EntitlementPhase, TransientErrorPolicy};
    use crate::models::Role;
    use crate::testing::{
        config_expiring, identity, login_response, options, wait_for_me_calls, FakeBackend,
    };

    struct Harness {
        backend: Arc<FakeBackend>,
        store: Arc<dyn CredentialStore>,
        entitlement: EntitlementAuthority,
        session: SessionAuthority,
    }

    fn harness(stored: Option<&str>) -> Harness {
        let backend = Arc::new(FakeBackend::new());
        let store: Arc<dyn CredentialStore> = match stored {
            Some(token) => Arc::new(MemoryCredentialStore::with_credential(Credential::new(token))),
            None => Arc::new(MemoryCredentialStore::new()),
        };
        let entitlement = EntitlementAuthority::new(
            backend.clone(),
            CredentialReader::new(Arc::clone(&store)),
            TransientErrorPolicy::Retain,
        );
        let session = SessionAuthority::new(backend.clone(), Arc::clone(&store), entitlement.clone());
        Harness {
            backend,
            store,
            entitlement,
            session,
        }
    }

    #[tokio::test]
    async fn test_validate_without_credential_settles_signed_out() {
        let h = harness(None);
        assert!(h.session.is_resolving());

        assert!(h.session.validate().await.is_none());

        assert!(!h.session.is_resolving());
        assert!(!h.session.is_authenticated());
        assert_eq!(h.backend.me_calls(), 0);
    }

    #[tokio::test]
    async fn test_validate_success_sets_identity() {
        let h = harness(Some("tok"));
        h.backend.push_me(Ok(identity("u1", Role::Staff)));

        let resolved = h.session.validate().await;

        assert_eq!(resolved.map(|i| i.id).as_deref(), Some("u1"));
        assert!(h.session.is_authenticated());
        assert!(!h.session.is_resolving());
        assert!(h.store.load().expect("load").is_some());
    }

    #[tokio::test]
    async fn test_validate_failure_clears_credential() {
        for failure in [
            ApiError::Unauthorized(String::new()),
            ApiError::ServerError("down".into()),
        ] {
            let h = harness(Some("tok"));
            h.backend.push_me(Err(failure));

            assert!(h.session.validate().await.is_none());

            assert!(!h.session.is_authenticated());
            assert!(!h.session.is_resolving());
            assert!(h.store.load().expect("load").is_none());
        }
    }

    #[tokio::test]
    async fn test_login_persists_credential() {
        let h = harness(None);
        h.backend.push_login(Ok(login_response("fresh", identity("u2", Role::Developer))));

        let user = h.session.login("sana", "pw").await.expect("login should succeed");

        assert!(user.is_developer());
        assert_eq!(h.store.load().expect("load"), Some(Credential::new("fresh")));
        assert_eq!(h.session.identity().map(|i| i.id).as_deref(), Some("u2"));
        assert!(!h.session.is_resolving());
        // Login never rechecks the entitlement by itself
        assert_eq!(h.backend.config_calls(), 0);
    }

    #[tokio::test]
    async fn test_login_rejection_reports_server_message() {
        let h = harness(None);
        h.backend.push_login(Err(ApiError::Unauthorized(
            r#"{"success":false,"message":"Account disabled"}"#.to_string(),
        )));
        h.backend.push_login(Err(ApiError::Unprocessable("{}".to_string())));

        let first = h.session.login("sana", "pw").await.expect_err("login should fail");
        assert!(matches!(first, AuthError::Authentication(ref m) if m == "Account disabled"));

        let second = h.session.login("sana", "pw").await.expect_err("login should fail");
        assert_eq!(second.user_message(), DEFAULT_LOGIN_ERROR);

        assert!(!h.session.is_authenticated());
        assert!(h.store.load().expect("load").is_none());
    }

    #[tokio::test]
    async fn test_login_requires_both_fields() {
        let h = harness(None);
        let err = h.session.login("  ", "pw").await.expect_err("login should fail");
        assert!(matches!(err, AuthError::Authentication(_)));
        assert_eq!(h.backend.login_calls(), 0);
    }

    #[tokio::test]
    async fn test_login_server_error_is_transport() {
        let h = harness(None);
        h.backend.push_login(Err(ApiError::ServerError("down".into())));

        let err = h.session.login("sana", "pw").await.expect_err("login should fail");
        assert!(matches!(err, AuthError::Transport(_)));
    }

    #[tokio::test]
    async fn test_logout_clears_session_and_entitlement() {
        let h = harness(Some("tok"));
        h.backend.push_me(Ok(identity("u1", Role::Staff)));
        h.backend.push_config(ConfigFetch::Denied(Default::default()));
        h.session.validate().await;
        h.entitlement.recheck().await;
        assert_eq!(h.entitlement.snapshot().phase(), EntitlementPhase::Expired);

        h.session.logout().expect("logout");

        assert!(!h.session.is_authenticated());
        assert!(h.store.load().expect("load").is_none());
        let snapshot = h.entitlement.snapshot();
        assert_eq!(snapshot.phase(), EntitlementPhase::Idle);
        assert!(snapshot.configuration.is_none());
    }

    #[tokio::test]
    async fn test_login_after_expired_logout_starts_idle() {
        let h = harness(Some("tok"));
        h.backend.push_me(Ok(identity("u1", Role::Staff)));
        h.backend.push_config(ConfigFetch::Denied(Default::default()));
        h.session.validate().await;
        h.entitlement.recheck().await;
        h.session.logout().expect("logout");

        h.backend.push_login(Ok(login_response("next", identity("u3", Role::Staff))));
        h.session.login("other", "pw").await.expect("login");

        // Nothing from the previous workspace survives until a recheck
        assert_eq!(h.entitlement.snapshot().phase(), EntitlementPhase::Idle);
        assert!(!h.entitlement.is_expired());

        h.backend.push_config(ConfigFetch::Success(config_expiring(Utc::now() + Duration::days(10))));
        h.backend.push_options(Ok(options(&["AW26"])));
        h.entitlement.recheck().await;
        assert_eq!(h.entitlement.snapshot().phase(), EntitlementPhase::Active);
    }

    #[tokio::test]
    async fn test_stale_validation_does_not_clobber_login() {
        let h = harness(Some("old"));
        let release = h.backend.push_gated_me();

        let validating = tokio::spawn({
            let session = h.session.clone();
            async move { session.validate().await }
        });
        wait_for_me_calls(&h.backend, 1).await;

        h.backend.push_login(Ok(login_response("new", identity("u9", Role::Staff))));
        h.session.login("sana", "pw").await.expect("login");

        release
            .send(Err(ApiError::Unauthorized(String::new())))
            .expect("release");
        validating.await.expect("validate task");

        assert_eq!(h.session.identity().map(|i| i.id).as_deref(), Some("u9"));
        assert_eq!(h.store.load().expect("load"), Some(Credential::new("new")));
        assert!(!h.session.is_resolving());
    }

    #[tokio::test]
    async fn test_update_identity_requires_session() {
        let h = harness(None);
        let err = h
            .session
            .update_identity(IdentityUpdate::display_name("X"))
            .await
            .expect_err("update should fail");
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_update_identity_merges_partial() {
        let h = harness(Some("tok"));
        h.backend.push_me(Ok(identity("u1", Role::Staff)));
        h.backend.push_profile(Ok(IdentityUpdate::display_name("Sana Malik")));
        h.session.validate().await;

        let updated = h
            .session
            .update_identity(IdentityUpdate::display_name("Sana Malik"))
            .await
            .expect("update");

        assert_eq!(updated.display_name, "Sana Malik");
        assert_eq!(updated.role, Role::Staff);
        assert_eq!(h.session.identity(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_identity_unauthorized_invalidates() {
        let h = harness(Some("tok"));
        h.backend.push_me(Ok(identity("u1", Role::Staff)));
        h.backend.push_profile(Err(ApiError::Unauthorized(String::new())));
        h.session.validate().await;

        let err = h
            .session
            .update_identity(IdentityUpdate::display_name("X"))
            .await
            .expect_err("update should fail");

        assert!(matches!(err, AuthError::SessionInvalid));
        assert!(!h.session.is_authenticated());
        assert!(h.store.load().expect("load").is_none());
    }

    #[tokio::test]
    async fn test_teardown_keeps_credential() {
        let h = harness(Some("tok"));
        h.backend.push_me(Ok(identity("u1", Role::Staff)));
        h.session.validate().await;

        h.session.teardown();

        assert!(!h.session.is_authenticated());
        assert!(h.store.load().expect("load").is_some());
        assert!(matches!(h.session.login("a", "b").await, Err(AuthError::Closed)));
    }
}
