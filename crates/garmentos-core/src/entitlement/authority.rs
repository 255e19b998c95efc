use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{Backend, ConfigFetch};
use crate::auth::CredentialReader;
use crate::models::{subscription_expired, OptionsCatalog, WorkspaceConfig};

/// What a configuration fetch failure other than a 403 does to the state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransientErrorPolicy {
    /// Keep whatever was held before and only log the failure.
    #[default]
    Retain,
    /// Treat an unconfirmable entitlement as expired.
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementStatus {
    /// No credential, nothing held.
    Idle,
    /// Subscription valid; configuration and options populated.
    Active,
    /// Subscription lapsed or denied; options cleared.
    Expired,
}

/// `EntitlementStatus` with the in-flight state folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementPhase {
    Idle,
    Resolving,
    Active,
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitlementSnapshot {
    pub status: EntitlementStatus,
    pub resolving: bool,
    pub configuration: Option<WorkspaceConfig>,
    pub options: Option<OptionsCatalog>,
}

impl EntitlementSnapshot {
    fn initial() -> Self {
        Self {
            status: EntitlementStatus::Idle,
            // Nothing has been checked yet; keep consumers waiting.
            resolving: true,
            configuration: None,
            options: None,
        }
    }

    pub fn expired(&self) -> bool {
        self.status == EntitlementStatus::Expired
    }

    pub fn phase(&self) -> EntitlementPhase {
        if self.resolving {
            return EntitlementPhase::Resolving;
        }
        match self.status {
            EntitlementStatus::Idle => EntitlementPhase::Idle,
            EntitlementStatus::Active => EntitlementPhase::Active,
            EntitlementStatus::Expired => EntitlementPhase::Expired,
        }
    }
}

/// How a single `recheck()` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecheckOutcome {
    /// The response was applied and produced this status.
    Applied(EntitlementStatus),
    /// A newer recheck (or a reset) was applied first; this response was discarded.
    Superseded,
    /// A transient failure left the previous state in place.
    Retained,
    /// No credential is stored; state was cleared to idle.
    NoCredential,
    /// The authority has been torn down.
    Closed,
}

/// Sequence bookkeeping shared by every recheck.
#[derive(Debug, Default)]
struct Fence {
    /// Highest sequence number handed out.
    dispatched: u64,
    /// Highest sequence number whose response was applied (or reset to).
    applied: u64,
    in_flight: usize,
    checked: bool,
    closed: bool,
}

impl Fence {
    fn resolving(&self) -> bool {
        !self.checked || (self.in_flight > 0 && self.dispatched > self.applied)
    }
}

struct Inner {
    backend: Arc<dyn Backend>,
    credentials: CredentialReader,
    policy: TransientErrorPolicy,
    state: watch::Sender<EntitlementSnapshot>,
    fence: Mutex<Fence>,
}

/// Owns workspace configuration, options and subscription expiry.
///
/// Cloning yields another handle to the same authority.
#[derive(Clone)]
pub struct EntitlementAuthority {
    inner: Arc<Inner>,
}

/// Marks one recheck as in flight; settling happens on drop so every exit
/// path clears the resolving flag.
struct Ticket<'a> {
    authority: &'a EntitlementAuthority,
    seq: u64,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        let mut fence = self.authority.fence();
        fence.in_flight = fence.in_flight.saturating_sub(1);
        fence.checked = true;
        self.authority.publish_resolving(&fence);
    }
}

impl EntitlementAuthority {
    pub fn new(
        backend: Arc<dyn Backend>,
        credentials: CredentialReader,
        policy: TransientErrorPolicy,
    ) -> Self {
        let (state, _) = watch::channel(EntitlementSnapshot::initial());
        Self {
            inner: Arc::new(Inner {
                backend,
                credentials,
                policy,
                state,
                fence: Mutex::new(Fence::default()),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<EntitlementSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> EntitlementSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn is_expired(&self) -> bool {
        self.inner.state.borrow().expired()
    }

    pub fn is_resolving(&self) -> bool {
        self.inner.state.borrow().resolving
    }

    pub fn policy(&self) -> TransientErrorPolicy {
        self.inner.policy
    }

    fn fence(&self) -> MutexGuard<'_, Fence> {
        self.inner.fence.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish_resolving(&self, fence: &Fence) {
        let resolving = fence.resolving();
        self.inner.state.send_if_modified(|s| {
            if s.resolving == resolving {
                false
            } else {
                s.resolving = resolving;
                true
            }
        });
    }

    fn dispatch(&self) -> Option<Ticket<'_>> {
        let mut fence = self.fence();
        if fence.closed {
            return None;
        }
        fence.dispatched += 1;
        fence.in_flight += 1;
        let seq = fence.dispatched;
        self.publish_resolving(&fence);
        Some(Ticket { authority: self, seq })
    }

    fn is_superseded(&self, seq: u64) -> bool {
        let fence = self.fence();
        fence.closed || seq <= fence.applied
    }

    /// Apply `update` if `seq` is newer than anything applied so far.
    fn apply<F>(&self, seq: u64, update: F) -> bool
    where
        F: FnOnce(&mut EntitlementSnapshot),
    {
        let mut fence = self.fence();
        if fence.closed || seq <= fence.applied {
            debug!(seq, applied = fence.applied, "Discarding out-of-order entitlement response");
            return false;
        }
        fence.applied = seq;
        let resolving = fence.resolving();
        self.inner.state.send_modify(|s| {
            update(s);
            s.resolving = resolving;
        });
        true
    }

    fn clear_locked(&self, fence: &mut Fence) {
        fence.applied = fence.dispatched;
        fence.checked = true;
        let resolving = fence.resolving();
        self.inner.state.send_modify(|s| {
            s.status = EntitlementStatus::Idle;
            s.configuration = None;
            s.options = None;
            s.resolving = resolving;
        });
    }

    /// Drop all held state and fence out every request still in flight.
    pub fn reset(&self) {
        let mut fence = self.fence();
        self.clear_locked(&mut fence);
        debug!("Entitlement state reset");
    }

    /// Reset and refuse further rechecks.
    pub fn teardown(&self) {
        let mut fence = self.fence();
        fence.closed = true;
        self.clear_locked(&mut fence);
        info!("Entitlement authority shut down");
    }

    /// Fetch configuration and re-derive the entitlement status.
    pub async fn recheck(&self) -> RecheckOutcome {
        // The sequence number is taken before the credential is read, so a
        // reset() landing during the read fences this recheck out.
        let Some(ticket) = self.dispatch() else {
            return RecheckOutcome::Closed;
        };
        let seq = ticket.seq;

        let credential = match self.inner.credentials.load() {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                debug!(seq, "No stored credential, entitlement idle");
                return match self.applied_or_superseded(seq, EntitlementStatus::Idle, |s| {
                    s.status = EntitlementStatus::Idle;
                    s.configuration = None;
                    s.options = None;
                }) {
                    RecheckOutcome::Applied(_) => RecheckOutcome::NoCredential,
                    outcome => outcome,
                };
            }
            Err(e) => {
                warn!(error = %e, seq, "Failed to read stored credential, keeping entitlement state");
                return RecheckOutcome::Retained;
            }
        };
        debug!(seq, "Rechecking entitlement");

        match self.inner.backend.fetch_config(&credential).await {
            ConfigFetch::Success(config) => {
                if subscription_expired(Utc::now(), config.subscription_expiry) {
                    info!(expiry = %config.subscription_expiry, "Subscription expired");
                    self.applied_or_superseded(seq, EntitlementStatus::Expired, |s| {
                        s.status = EntitlementStatus::Expired;
                        s.configuration = Some(WorkspaceConfig::Full(config));
                        s.options = None;
                    })
                } else {
                    if self.is_superseded(seq) {
                        debug!(seq, "Skipping options fetch for superseded recheck");
                        return RecheckOutcome::Superseded;
                    }
                    let options = match self.inner.backend.fetch_options(&credential).await {
                        Ok(options) => Some(options),
                        Err(e) => {
                            warn!(error = %e, "Failed to fetch options, keeping previous catalog");
                            None
                        }
                    };
                    self.applied_or_superseded(seq, EntitlementStatus::Active, |s| {
                        s.status = EntitlementStatus::Active;
                        s.configuration = Some(WorkspaceConfig::Full(config));
                        if options.is_some() {
                            s.options = options;
                        }
                    })
                }
            }
            ConfigFetch::Denied(fallback) => {
                info!(company = %fallback.company_name, "Workspace entitlement denied");
                self.applied_or_superseded(seq, EntitlementStatus::Expired, |s| {
                    s.status = EntitlementStatus::Expired;
                    s.configuration = Some(WorkspaceConfig::Fallback(fallback));
                    s.options = None;
                })
            }
            ConfigFetch::Transient(e) => match self.inner.policy {
                TransientErrorPolicy::Retain => {
                    warn!(error = %e, seq, "Configuration fetch failed, keeping previous entitlement state");
                    RecheckOutcome::Retained
                }
                TransientErrorPolicy::Deny => {
                    warn!(error = %e, seq, "Configuration fetch failed, denying entitlement");
                    self.applied_or_superseded(seq, EntitlementStatus::Expired, |s| {
                        s.status = EntitlementStatus::Expired;
                        s.options = None;
                    })
                }
            },
        }
    }

    fn applied_or_superseded<F>(&self, seq: u64, status: EntitlementStatus, update: F) -> RecheckOutcome
    where
        F: FnOnce(&mut EntitlementSnapshot),
    {
        if self.apply(seq, update) {
            RecheckOutcome::Applied(status)
        } else {
            RecheckOutcome::Superseded
        }
    }
}
