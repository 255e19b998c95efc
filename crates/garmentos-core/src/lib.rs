//! Core library for the GarmentsOS client.
//!
//! This crate owns the session and entitlement authority of the client:
//!
//! - `api`: REST client for the workspace backend and the `Backend` seam
//! - `auth`: credential stores and the `SessionAuthority`
//! - `entitlement`: workspace configuration and subscription expiry
//! - `navigation`: routes, the guard decision table and route authorization
//! - `config`: persisted client settings and environment overrides
//! - `context`: the composition root wiring everything together
//!
//! Front-ends consume three signals only: the current identity (or none),
//! the entitlement status, and whether either authority is still resolving.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod entitlement;
pub mod models;
pub mod navigation;

#[cfg(test)]
pub(crate) mod testing;

pub use context::AuthorityContext;
