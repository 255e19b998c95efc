use std::fmt;

use crate::models::Role;

/// A location in the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    SubscriptionExpired,
    /// `/`; only ever redirects.
    Root,
    Dashboard,
    Articles,
    ArticleNew,
    ArticleEdit(String),
    ArticleView(String),
    Options,
    Users,
    Settings,
    /// Any path the client does not know.
    NotFound(String),
}

impl Route {
    /// Where an authenticated user lands by default.
    pub const DEFAULT_AUTHENTICATED: Route = Route::Dashboard;

    /// Routes shown in the shell navigation, in display order.
    pub const SHELL: [Route; 5] = [
        Route::Dashboard,
        Route::Articles,
        Route::Options,
        Route::Users,
        Route::Settings,
    ];

    pub fn parse(path: &str) -> Route {
        let trimmed = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::Root,
            ["login"] => Route::Login,
            ["subscription-expired"] => Route::SubscriptionExpired,
            ["dashboard"] => Route::Dashboard,
            ["articles"] => Route::Articles,
            ["articles", "new"] => Route::ArticleNew,
            ["articles", "edit", id] => Route::ArticleEdit(id.to_string()),
            ["articles", "view", id] => Route::ArticleView(id.to_string()),
            ["options"] => Route::Options,
            ["users"] => Route::Users,
            ["settings"] => Route::Settings,
            _ => Route::NotFound(path.to_string()),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::SubscriptionExpired => "/subscription-expired".to_string(),
            Route::Root => "/".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Articles => "/articles".to_string(),
            Route::ArticleNew => "/articles/new".to_string(),
            Route::ArticleEdit(id) => format!("/articles/edit/{}", id),
            Route::ArticleView(id) => format!("/articles/view/{}", id),
            Route::Options => "/options".to_string(),
            Route::Users => "/users".to_string(),
            Route::Settings => "/settings".to_string(),
            Route::NotFound(path) => path.clone(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Sign in",
            Route::SubscriptionExpired => "Subscription expired",
            Route::Root | Route::Dashboard => "Dashboard",
            Route::Articles => "Articles",
            Route::ArticleNew => "New article",
            Route::ArticleEdit(_) => "Edit article",
            Route::ArticleView(_) => "Article",
            Route::Options => "Options",
            Route::Users => "Users",
            Route::Settings => "Settings",
            Route::NotFound(_) => "Not found",
        }
    }

    /// Whether the route needs a signed-in user.
    pub fn is_protected(&self) -> bool {
        !matches!(
            self,
            Route::Login | Route::SubscriptionExpired | Route::NotFound(_)
        )
    }

    pub fn required_role(&self) -> Option<Role> {
        match self {
            Route::Users => Some(Role::Developer),
            _ => None,
        }
    }

    /// Where a path-only redirect sends this route, independent of session
    /// state.
    pub fn canonical(&self) -> Option<Route> {
        match self {
            Route::Root | Route::NotFound(_) => Some(Route::DEFAULT_AUTHENTICATED),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_paths() {
        assert_eq!(Route::parse("/login"), Route::Login);
        assert_eq!(Route::parse("/subscription-expired"), Route::SubscriptionExpired);
        assert_eq!(Route::parse("/dashboard/"), Route::Dashboard);
        assert_eq!(Route::parse("/articles/new"), Route::ArticleNew);
        assert_eq!(Route::parse("/articles/edit/42"), Route::ArticleEdit("42".into()));
        assert_eq!(Route::parse("/articles/view/a1?tab=cost"), Route::ArticleView("a1".into()));
        assert_eq!(Route::parse("/users"), Route::Users);
        assert_eq!(Route::parse("/"), Route::Root);
        assert_eq!(Route::parse(""), Route::Root);
    }

    #[test]
    fn test_parse_unknown_paths() {
        assert_eq!(Route::parse("/reports"), Route::NotFound("/reports".into()));
        assert_eq!(Route::parse("/articles/edit"), Route::NotFound("/articles/edit".into()));
    }

    #[test]
    fn test_path_roundtrip() {
        for route in [
            Route::Login,
            Route::SubscriptionExpired,
            Route::Dashboard,
            Route::ArticleEdit("7".into()),
            Route::ArticleView("7".into()),
            Route::Settings,
        ] {
            assert_eq!(Route::parse(&route.path()), route);
        }
    }

    #[test]
    fn test_protection_and_roles() {
        assert!(!Route::Login.is_protected());
        assert!(!Route::SubscriptionExpired.is_protected());
        assert!(Route::Dashboard.is_protected());
        assert!(Route::ArticleNew.is_protected());
        assert_eq!(Route::Users.required_role(), Some(Role::Developer));
        assert_eq!(Route::Settings.required_role(), None);
    }

    #[test]
    fn test_canonical_redirects() {
        assert_eq!(Route::Root.canonical(), Some(Route::Dashboard));
        assert_eq!(Route::parse("/nope").canonical(), Some(Route::Dashboard));
        assert_eq!(Route::Dashboard.canonical(), None);
    }
}
