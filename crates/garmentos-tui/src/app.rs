//! Application state for the GarmentsOS terminal client.
//!
//! `App` is the routing layer over the core: it holds the current route,
//! asks the navigation guard where the user may be after every tick, and
//! forwards route changes to the authority context so the entitlement is
//! rechecked.

use tracing::{debug, error, info, warn};

use garmentos_core::auth::AuthError;
use garmentos_core::config::Config;
use garmentos_core::entitlement::EntitlementSnapshot;
use garmentos_core::models::{Identity, IdentityUpdate};
use garmentos_core::navigation::{authorize, GuardDecision, NavigationGuard, Route};
use garmentos_core::AuthorityContext;

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for a display name edited in Settings.
const MAX_DISPLAY_NAME_LENGTH: usize = 60;

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    EditingName,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

/// Next shell route to the right, wrapping. Users is skipped for
/// non-developers.
pub fn next_shell_route(current: &Route, developer: bool) -> Route {
    cycle_shell_route(current, developer, true)
}

/// Previous shell route, wrapping.
pub fn prev_shell_route(current: &Route, developer: bool) -> Route {
    cycle_shell_route(current, developer, false)
}

fn cycle_shell_route(current: &Route, developer: bool, forward: bool) -> Route {
    let visible: Vec<&Route> = Route::SHELL
        .iter()
        .filter(|r| developer || r.required_role().is_none())
        .collect();
    let len = visible.len();
    let next = match visible.iter().position(|r| *r == shell_section(current)) {
        Some(i) if forward => (i + 1) % len,
        Some(i) => (i + len - 1) % len,
        // Off the shell (e.g. the expired screen): start at the first tab
        None => 0,
    };
    visible[next].clone()
}

/// The shell tab a route belongs to.
pub fn shell_section(route: &Route) -> &Route {
    match route {
        Route::ArticleNew | Route::ArticleEdit(_) | Route::ArticleView(_) => &Route::Articles,
        other => other,
    }
}

pub struct App {
    pub config: Config,
    pub ctx: AuthorityContext,
    guard: NavigationGuard,

    pub state: AppState,
    pub route: Route,
    /// The guard is waiting on an authority; show the loader.
    pub waiting: bool,

    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    pub name_input: String,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(config: Config, ctx: AuthorityContext) -> Self {
        let guard = ctx.guard();
        let login_username = config.last_username.clone().unwrap_or_default();
        Self {
            config,
            ctx,
            guard,
            state: AppState::Normal,
            route: Route::Root,
            waiting: true,
            login_username,
            login_password: String::new(),
            login_focus: LoginFocus::Username,
            login_error: None,
            name_input: String::new(),
            status_message: None,
        }
    }

    // =========================================================================
    // Signals
    // =========================================================================

    pub fn identity(&self) -> Option<Identity> {
        self.ctx.session().identity()
    }

    pub fn entitlement(&self) -> EntitlementSnapshot {
        self.ctx.entitlement().snapshot()
    }

    pub fn is_developer(&self) -> bool {
        self.identity().map(|i| i.is_developer()).unwrap_or(false)
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Start validating the stored credential in the background. The loader
    /// shows until the guard settles.
    pub fn start_bootstrap(&self) {
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            ctx.bootstrap().await;
        });
    }

    /// Apply the guard's decision for the current route.
    pub fn reconcile(&mut self) {
        match self.guard.decide(&self.route) {
            GuardDecision::Wait => self.waiting = true,
            GuardDecision::Stay => self.waiting = false,
            GuardDecision::Redirect(target) => {
                self.waiting = false;
                debug!(from = %self.route, to = %target, "Guard redirect");
                self.set_route(target);
            }
        }
    }

    /// User-initiated navigation.
    pub fn navigate(&mut self, route: Route) {
        let role = self.identity().map(|i| i.role);
        if let Err(e) = authorize(role, &route) {
            self.status_message = Some(e.to_string());
        }
        self.set_route(route);
    }

    fn set_route(&mut self, route: Route) {
        if route == self.route {
            return;
        }
        info!(route = %route, "Route changed");
        self.route = route;
        if self.route == Route::Login {
            self.start_login();
        }
        // Detached; the guard picks the result up from the watch channel.
        let _ = self.ctx.on_route_change(&self.route);
    }

    pub fn next_tab(&mut self) {
        let next = next_shell_route(&self.route, self.is_developer());
        self.navigate(next);
    }

    pub fn prev_tab(&mut self) {
        let prev = prev_shell_route(&self.route, self.is_developer());
        self.navigate(prev);
    }

    /// Recheck the entitlement without changing route.
    pub fn refresh(&mut self) {
        let _ = self.ctx.on_route_change(&self.route);
        self.status_message = Some("Refreshing workspace...".to_string());
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn start_login(&mut self) {
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.login_password.clear();
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) {
        self.login_error = None;
        let username = self.login_username.trim().to_string();

        match self.ctx.login_and_recheck(&username, &self.login_password).await {
            Ok(identity) => {
                self.login_password.clear();
                self.status_message = Some(format!("Welcome, {}", identity.display_name));
                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
            }
            Err(e) => {
                if !matches!(e, AuthError::Authentication(_)) {
                    error!(error = %e, "Login failed");
                }
                self.login_error = Some(e.user_message());
            }
        }
    }

    pub fn logout(&mut self) {
        match self.ctx.logout() {
            Ok(()) => self.status_message = Some("Signed out".to_string()),
            Err(e) => {
                error!(error = %e, "Logout failed");
                self.status_message = Some(e.to_string());
            }
        }
    }

    // =========================================================================
    // Profile
    // =========================================================================

    pub fn start_name_edit(&mut self) {
        self.name_input = self.identity().map(|i| i.display_name).unwrap_or_default();
        self.state = AppState::EditingName;
    }

    pub async fn submit_name(&mut self) {
        let name = self.name_input.trim().to_string();
        self.state = AppState::Normal;
        if name.is_empty() {
            self.status_message = Some("Name cannot be empty".to_string());
            return;
        }
        match self
            .ctx
            .session()
            .update_identity(IdentityUpdate::display_name(name))
            .await
        {
            Ok(identity) => {
                self.status_message = Some(format!("Profile updated: {}", identity.display_name));
            }
            Err(e) => {
                warn!(error = %e, "Profile update failed");
                self.status_message = Some(e.user_message());
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.ctx.teardown();
        self.state = AppState::Quitting;
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

pub fn can_add_name_char(current_len: usize, c: char) -> bool {
    current_len < MAX_DISPLAY_NAME_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Shell Navigation Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_next_shell_route_developer() {
        assert_eq!(next_shell_route(&Route::Dashboard, true), Route::Articles);
        assert_eq!(next_shell_route(&Route::Options, true), Route::Users);
        assert_eq!(next_shell_route(&Route::Users, true), Route::Settings);
        assert_eq!(next_shell_route(&Route::Settings, true), Route::Dashboard); // Wraps around
    }

    #[test]
    fn test_shell_routes_skip_users_for_staff() {
        assert_eq!(next_shell_route(&Route::Options, false), Route::Settings);
        assert_eq!(prev_shell_route(&Route::Settings, false), Route::Options);
        assert_eq!(prev_shell_route(&Route::Dashboard, false), Route::Settings);
    }

    #[test]
    fn test_prev_shell_route() {
        assert_eq!(prev_shell_route(&Route::Dashboard, true), Route::Settings);
        assert_eq!(prev_shell_route(&Route::Users, true), Route::Options);
        assert_eq!(prev_shell_route(&Route::Articles, true), Route::Dashboard);
    }

    #[test]
    fn test_article_routes_belong_to_articles_tab() {
        assert_eq!(shell_section(&Route::ArticleView("9".into())), &Route::Articles);
        assert_eq!(
            next_shell_route(&Route::ArticleEdit("9".into()), false),
            Route::Options
        );
    }

    #[test]
    fn test_non_shell_route_cycles_from_start() {
        assert_eq!(next_shell_route(&Route::SubscriptionExpired, false), Route::Dashboard);
        assert_eq!(prev_shell_route(&Route::Login, true), Route::Dashboard);
    }

    // -------------------------------------------------------------------------
    // Input Validation Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_can_add_username_char() {
        assert!(can_add_username_char(0, 'a'));
        assert!(can_add_username_char(49, 'z'));
        assert!(!can_add_username_char(50, 'a'));
        assert!(!can_add_username_char(0, '\x00'));
        assert!(!can_add_username_char(0, '\n'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\r'));
    }

    #[test]
    fn test_can_add_name_char() {
        assert!(can_add_name_char(0, 'Ä'));
        assert!(!can_add_name_char(60, 'a'));
        assert!(!can_add_name_char(0, '\t'));
    }
}
