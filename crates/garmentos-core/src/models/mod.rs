//! Data models for the workspace backend.
//!
//! - `Identity`, `Role`, `IdentityUpdate`: the signed-in user
//! - `WorkspaceConfiguration`, `FallbackConfiguration`, `WorkspaceConfig`:
//!   workspace settings and subscription expiry
//! - `OptionsCatalog`: reference lists used by article forms

pub mod identity;
pub mod options;
pub mod workspace;

pub use identity::{Identity, IdentityUpdate, Role};
pub use options::OptionsCatalog;
pub use workspace::{
    subscription_expired, BrandingMeta, DeveloperMeta, FallbackConfiguration, WorkspaceConfig,
    WorkspaceConfiguration, DEFAULT_COMPANY_NAME,
};
