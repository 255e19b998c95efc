//! Authentication module for managing the session credential and identity.
//!
//! This module provides:
//! - `CredentialStore`: durable storage for the opaque session token (file,
//!   OS keychain, or in-memory), plus a read-only `CredentialReader`
//! - `SessionAuthority`: resolves the stored token into an `Identity` and
//!   owns login, logout and profile updates
//!
//! Only the session authority ever writes the credential.

pub mod credentials;
pub mod error;
pub mod session;

pub use credentials::{
    Credential, CredentialReader, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    MemoryCredentialStore,
};
pub use error::AuthError;
pub use session::{SessionAuthority, SessionSnapshot};
