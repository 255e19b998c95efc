//! Workspace entitlement tracking.
//!
//! The `EntitlementAuthority` fetches the workspace configuration, decides
//! whether the subscription has lapsed, and loads the options catalog while
//! it is valid. Overlapping rechecks are fenced by sequence number so a slow
//! response never overwrites a newer one.

pub mod authority;

pub use authority::{
    EntitlementAuthority, EntitlementPhase, EntitlementSnapshot, EntitlementStatus,
    RecheckOutcome, TransientErrorPolicy,
};
