//! Routes and the navigation guard.
//!
//! `decide` is the expiry decision table, `authorize` gates routes by session
//! and role, and `resolve` combines both into the single route the user
//! should be on. `NavigationGuard` observes both authorities so a routing
//! layer can reconcile on every change.

pub mod guard;
pub mod route;

pub use guard::{authorize, decide, resolve, AuthorizationError, GuardDecision, GuardInputs, NavigationGuard};
pub use route::Route;
