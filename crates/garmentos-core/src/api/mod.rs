//! REST API client module for the workspace backend.
//!
//! This module provides the `ApiClient` for talking to the backend and the
//! `Backend` trait the authorities depend on, so they can be driven by a
//! scripted backend in tests.
//!
//! Every call except login carries the stored credential as a bearer token.
//! Successful bodies are wrapped as `{ success, data, message? }`.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::{Backend, ConfigFetch, LoginResponse};
pub use client::ApiClient;
pub use error::ApiError;
