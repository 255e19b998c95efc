use thiserror::Error;
use tokio::sync::watch;

use crate::auth::SessionSnapshot;
use crate::entitlement::EntitlementSnapshot;
use crate::models::Role;

use super::Route;

/// Upper bound on chained redirects; every chain settles in fewer steps.
const MAX_REDIRECT_HOPS: usize = 4;

/// Everything the guard looks at, apart from the current route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardInputs {
    /// Role of the signed-in user; `None` when signed out.
    pub role: Option<Role>,
    pub expired: bool,
    pub session_resolving: bool,
    pub entitlement_resolving: bool,
}

impl GuardInputs {
    pub fn from_snapshots(session: &SessionSnapshot, entitlement: &EntitlementSnapshot) -> Self {
        Self {
            role: session.identity.as_ref().map(|i| i.role),
            expired: entitlement.expired(),
            session_resolving: session.resolving,
            entitlement_resolving: entitlement.resolving,
        }
    }

    pub fn signed_in(&self) -> bool {
        self.role.is_some()
    }

    pub fn resolving(&self) -> bool {
        self.session_resolving || self.entitlement_resolving
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// An authority is still resolving; render a loading state.
    Wait,
    /// The current route is allowed.
    Stay,
    Redirect(Route),
}

/// Why a route may not be shown in the current session state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Sign in to open {0}")]
    NotAuthenticated(Route),

    #[error("Already signed in")]
    AlreadyAuthenticated,

    #[error("{route} requires the {} role", .required.as_str())]
    RoleRequired { route: Route, required: Role },
}

impl AuthorizationError {
    /// Where the user is sent instead.
    pub fn redirect(&self) -> Route {
        match self {
            AuthorizationError::NotAuthenticated(_) => Route::Login,
            AuthorizationError::AlreadyAuthenticated
            | AuthorizationError::RoleRequired { .. } => Route::DEFAULT_AUTHENTICATED,
        }
    }
}

/// The expiry decision table.
///
/// Inert while either authority is resolving, so no redirect is ever made
/// from half-known state.
pub fn decide(inputs: &GuardInputs, current: &Route) -> GuardDecision {
    if inputs.resolving() {
        return GuardDecision::Wait;
    }
    let on_expired = *current == Route::SubscriptionExpired;
    match (inputs.signed_in(), inputs.expired) {
        (true, true) if !on_expired => GuardDecision::Redirect(Route::SubscriptionExpired),
        (true, false) if on_expired => GuardDecision::Redirect(Route::DEFAULT_AUTHENTICATED),
        (false, _) if on_expired => GuardDecision::Redirect(Route::Login),
        _ => GuardDecision::Stay,
    }
}

/// Route gating by session and role.
pub fn authorize(role: Option<Role>, route: &Route) -> Result<(), AuthorizationError> {
    match role {
        None if route.is_protected() => Err(AuthorizationError::NotAuthenticated(route.clone())),
        None => Ok(()),
        Some(_) if *route == Route::Login => Err(AuthorizationError::AlreadyAuthenticated),
        Some(role) => match route.required_role() {
            Some(required) if !role.satisfies(required) => Err(AuthorizationError::RoleRequired {
                route: route.clone(),
                required,
            }),
            _ => Ok(()),
        },
    }
}

/// One redirect step: path canonicalization, then the expiry table, then
/// authorization.
fn step(inputs: &GuardInputs, current: &Route) -> GuardDecision {
    if inputs.resolving() {
        return GuardDecision::Wait;
    }
    if let Some(target) = current.canonical() {
        return GuardDecision::Redirect(target);
    }
    match decide(inputs, current) {
        GuardDecision::Stay => {}
        other => return other,
    }
    match authorize(inputs.role, current) {
        Ok(()) => GuardDecision::Stay,
        Err(e) => GuardDecision::Redirect(e.redirect()),
    }
}

/// The single route the user should be on, following chained redirects to
/// their end.
pub fn resolve(inputs: &GuardInputs, current: &Route) -> GuardDecision {
    let mut route = current.clone();
    for _ in 0..MAX_REDIRECT_HOPS {
        match step(inputs, &route) {
            GuardDecision::Wait => return GuardDecision::Wait,
            GuardDecision::Stay => break,
            GuardDecision::Redirect(next) => route = next,
        }
    }
    if route == *current {
        GuardDecision::Stay
    } else {
        GuardDecision::Redirect(route)
    }
}

/// Observes both authorities and yields a decision for the current route
/// whenever either changes.
pub struct NavigationGuard {
    session: watch::Receiver<SessionSnapshot>,
    entitlement: watch::Receiver<EntitlementSnapshot>,
}

impl NavigationGuard {
    pub fn new(
        session: watch::Receiver<SessionSnapshot>,
        entitlement: watch::Receiver<EntitlementSnapshot>,
    ) -> Self {
        Self {
            session,
            entitlement,
        }
    }

    /// Current inputs; marks both as seen.
    pub fn inputs(&mut self) -> GuardInputs {
        let session = self.session.borrow_and_update();
        let entitlement = self.entitlement.borrow_and_update();
        GuardInputs::from_snapshots(&session, &entitlement)
    }

    pub fn decide(&mut self, current: &Route) -> GuardDecision {
        resolve(&self.inputs(), current)
    }

    /// Wait until either authority publishes a change. Returns `false` once
    /// an authority is gone.
    pub async fn changed(&mut self) -> bool {
        tokio::select! {
            res = self.session.changed() => res.is_ok(),
            res = self.entitlement.changed() => res.is_ok(),
        }
    }
}
