//! Content panes for the shell routes.

use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use garmentos_core::config::CredentialBackend;
use garmentos_core::entitlement::EntitlementPhase;
use garmentos_core::models::{BrandingMeta, OptionsCatalog, Role};

use crate::app::App;

use super::styles;

/// Human-readable subscription state relative to `now`.
pub fn expiry_label(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(expiry) = expiry else {
        return "Expiry unknown".to_string();
    };
    let date = expiry.format("%Y-%m-%d");
    if garmentos_core::models::subscription_expired(now, expiry) {
        return format!("Expired on {}", date);
    }
    match (expiry - now).num_days() {
        0 => format!("Expires today ({})", date),
        1 => format!("Expires tomorrow ({})", date),
        days => format!("Expires in {} days ({})", days, date),
    }
}

/// Support contact lines from the workspace branding.
pub fn contact_lines(branding: &BrandingMeta) -> Vec<Line<'static>> {
    [
        ("Phone", branding.phone.as_deref()),
        ("Email", branding.email.as_deref()),
        ("Address", branding.address.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, value)| {
        let value = value.filter(|v| !v.trim().is_empty())?;
        Some(Line::from(vec![
            Span::styled(format!("  {:<9}", label), styles::muted_style()),
            Span::styled(value.to_string(), styles::list_item_style()),
        ]))
    })
    .collect()
}

/// Renewal contacts of the vendor, shown on the expired screen whatever the
/// workspace branding says.
const VENDOR_CONTACTS: [(&str, &str); 3] = [
    ("Support", "support@sparkpair.dev"),
    ("Sales", "+92 316 5825495"),
    ("Billing", "https://sparkpair.dev"),
];

/// Contact lines for the expired screen: workspace support (when the
/// configuration carries branding) followed by the vendor renewal contacts.
pub fn expired_contact_lines(branding: Option<&BrandingMeta>) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let workspace = branding.map(contact_lines).unwrap_or_default();
    if !workspace.is_empty() {
        lines.push(section("Workspace support"));
        lines.extend(workspace);
        lines.push(Line::from(""));
    }
    lines.push(section("Renew"));
    lines.extend(VENDOR_CONTACTS.iter().map(|(label, value)| {
        Line::from(vec![
            Span::styled(format!("  {:<9}", label), styles::muted_style()),
            Span::styled(value.to_string(), styles::list_item_style()),
        ])
    }));
    lines
}

fn field(label: &str, value: impl Into<String>) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<14}", label), styles::muted_style()),
        Span::styled(value.into(), styles::list_item_style()),
    ])
}

fn section(title: &str) -> Line<'static> {
    Line::from(Span::styled(format!(" {}", title), styles::highlight_style()))
}

fn pane(title: &str) -> Block<'static> {
    Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(styles::border_style(false))
}

fn phase_label(phase: EntitlementPhase) -> &'static str {
    match phase {
        EntitlementPhase::Idle => "Not checked",
        EntitlementPhase::Resolving => "Checking...",
        EntitlementPhase::Active => "Active",
        EntitlementPhase::Expired => "Expired",
    }
}

pub fn render_dashboard(frame: &mut Frame, app: &App, area: Rect) {
    let snapshot = app.entitlement();
    let mut lines = vec![section("Workspace")];

    match snapshot.configuration {
        Some(ref config) => {
            lines.push(field("Company", config.company_name()));
            if let Some(tagline) = config.branding().and_then(|b| b.tagline.clone()) {
                lines.push(field("", tagline));
            }
            lines.push(field(
                "Subscription",
                expiry_label(config.subscription_expiry(), Utc::now()),
            ));
        }
        None => lines.push(field("Company", "Not loaded")),
    }
    lines.push(field("Status", phase_label(snapshot.phase())));

    lines.push(Line::from(""));
    lines.push(section("Signed in as"));
    if let Some(identity) = app.identity() {
        lines.push(field("Name", format!("{} ({})", identity.display_name, identity.initials())));
        lines.push(field("Role", identity.role.as_str()));
    }

    lines.push(Line::from(""));
    lines.push(section("Reference data"));
    match snapshot.options {
        Some(ref options) => {
            lines.push(field("Seasons", options.unique_seasons().len().to_string()));
            lines.push(field("Categories", options.unique_categories().len().to_string()));
            lines.push(field("Sizes", options.unique_sizes().len().to_string()));
        }
        None => lines.push(field("Options", "Not loaded")),
    }

    frame.render_widget(Paragraph::new(lines).block(pane("Dashboard")), area);
}

pub fn render_articles(frame: &mut Frame, app: &App, area: Rect) {
    let snapshot = app.entitlement();
    let mut lines = vec![
        Line::from(Span::styled(
            " Articles are edited in the web console. Filters available here:",
            styles::muted_style(),
        )),
        Line::from(""),
    ];
    match snapshot.options {
        Some(ref options) => {
            lines.push(field("Seasons", options.unique_seasons().join(", ")));
            lines.push(field("Categories", options.unique_categories().join(", ")));
        }
        None => lines.push(field("Filters", "Options not loaded")),
    }
    frame.render_widget(Paragraph::new(lines).block(pane(app.route.title())), area);
}

fn option_list(title: &str, values: Vec<&str>) -> List<'static> {
    let items: Vec<ListItem> = if values.is_empty() {
        vec![ListItem::new(Span::styled(" (none)", styles::muted_style()))]
    } else {
        values
            .into_iter()
            .map(|v| ListItem::new(Span::styled(format!(" {}", v), styles::list_item_style())))
            .collect()
    };
    List::new(items).block(pane(title))
}

pub fn render_options(frame: &mut Frame, app: &App, area: Rect) {
    let options = app.entitlement().options.unwrap_or_else(OptionsCatalog::default);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(area);

    frame.render_widget(option_list("Seasons", options.unique_seasons()), columns[0]);
    frame.render_widget(option_list("Categories", options.unique_categories()), columns[1]);
    frame.render_widget(option_list("Sizes", options.unique_sizes()), columns[2]);
}

pub fn render_users(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![section("Roles")];
    for role in [Role::Staff, Role::Admin, Role::Developer] {
        lines.push(field(role.as_str(), role_summary(role)));
    }
    if let Some(identity) = app.identity() {
        lines.push(Line::from(""));
        lines.push(section("Current user"));
        lines.push(field("ID", identity.id));
        if let Some(username) = identity.username {
            lines.push(field("Username", username));
        }
    }
    frame.render_widget(Paragraph::new(lines).block(pane("Users")), area);
}

fn role_summary(role: Role) -> &'static str {
    match role {
        Role::Staff => "Articles and options",
        Role::Admin => "Articles, options and workspace settings",
        Role::Developer => "Everything, including user management",
        Role::Unknown => "No access",
    }
}

pub fn render_settings(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![section("Profile")];
    if let Some(identity) = app.identity() {
        lines.push(field("Name", identity.display_name));
        if let Some(username) = identity.username {
            lines.push(field("Username", username));
        }
        lines.push(field("Role", identity.role.as_str()));
        lines.push(Line::from(vec![
            Span::styled("  [e]", styles::help_key_style()),
            Span::styled(" edit display name", styles::help_desc_style()),
        ]));
    }

    let snapshot = app.entitlement();
    if let Some(branding) = snapshot.configuration.as_ref().and_then(|c| c.branding()) {
        lines.push(Line::from(""));
        lines.push(section("Workspace contacts"));
        lines.extend(contact_lines(branding));
        lines.push(field("Powered by", branding.powered_by()));
    }

    lines.push(Line::from(""));
    lines.push(section("Client"));
    lines.push(field("API", app.config.api_url().to_string()));
    lines.push(field(
        "Credentials",
        match app.config.credential_backend {
            CredentialBackend::File => "session file",
            CredentialBackend::Keyring => "OS keychain",
        },
    ));
    lines.push(field(
        "On fetch error",
        format!("{:?}", app.config.transient_error_policy).to_lowercase(),
    ));

    frame.render_widget(Paragraph::new(lines).block(pane("Settings")), area);
}
