use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use garmentos_core::navigation::Route;

use crate::app::{shell_section, App, AppState, LoginFocus};

use super::styles;
use super::views;

/// Product name shown in the title bar and dialogs
const PRODUCT_NAME: &str = "GarmentsOS";

pub fn render(frame: &mut Frame, app: &App) {
    if app.waiting {
        render_loader(frame);
    } else {
        match app.route {
            Route::Login => render_login(frame, app),
            Route::SubscriptionExpired => render_expired(frame, app),
            _ => render_shell(frame, app),
        }
    }

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::EditingName => render_name_overlay(frame, app),
        AppState::Normal | AppState::Quitting => {}
    }
}

fn render_loader(frame: &mut Frame) {
    let area = centered_rect_fixed(36, 5, frame.area());
    let lines = vec![
        Line::from(Span::styled(format!("  {}", PRODUCT_NAME), styles::title_style())),
        Line::from(Span::styled("  Checking your session...", styles::muted_style())),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

// ============================================================================
// Shell
// ============================================================================

fn render_shell(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let company = app
        .entitlement()
        .configuration
        .map(|c| c.company_name().to_string())
        .unwrap_or_default();
    let title = if company.is_empty() {
        format!("  {}", PRODUCT_NAME)
    } else {
        format!("  {} | {}", PRODUCT_NAME, company)
    };
    let user_hint = app
        .identity()
        .map(|i| format!("{} ({})  [?] Help", i.display_name, i.role.as_str()))
        .unwrap_or_else(|| "[?] Help".to_string());

    let title_line = Line::from(vec![
        Span::styled(title.clone(), styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.chars().count() + user_hint.chars().count() + 2),
        )),
        Span::styled(user_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let developer = app.is_developer();
    let current = shell_section(&app.route);

    let mut spans = vec![Span::raw(" ")];
    for (i, route) in Route::SHELL.iter().enumerate() {
        if route.required_role().is_some() && !developer {
            continue;
        }
        if spans.len() > 1 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = format!("[{}] {}", i + 1, route.title());
        spans.push(Span::styled(label, styles::tab_style(route == current)));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match shell_section(&app.route) {
        Route::Articles => views::render_articles(frame, app, area),
        Route::Options => views::render_options(frame, app, area),
        Route::Users => views::render_users(frame, app, area),
        Route::Settings => views::render_settings(frame, app, area),
        _ => views::render_dashboard(frame, app, area),
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = "[r]efresh | [L]ogout | [q]uit";
    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None => format!(" {} ", app.route),
    };
    let right_text = format!(" {} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(
        Paragraph::new(status_line).style(styles::status_bar_style()),
        area,
    );
}

// ============================================================================
// Full-screen routes
// ============================================================================

fn render_login(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 12 } else { 10 };
    let area = centered_rect_fixed(46, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled(
            format!("            {}", PRODUCT_NAME),
            styles::title_style(),
        )),
        Line::from(Span::styled("       Sign in to your workspace", styles::muted_style())),
        Line::from(""),
    ];

    let username_focused = app.login_focus == LoginFocus::Username;
    let cursor = if username_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Username: [", styles::muted_style()),
        Span::styled(
            format!("{:<16}{}", app.login_username, cursor),
            field_style(username_focused),
        ),
        Span::styled("]", styles::muted_style()),
    ]));

    let password_focused = app.login_focus == LoginFocus::Password;
    let masked = "*".repeat(app.login_password.chars().count().min(16));
    let cursor = if password_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(format!("{:<16}{}", masked, cursor), field_style(password_focused)),
        Span::styled("]", styles::muted_style()),
    ]));

    let button_focused = app.login_focus == LoginFocus::Button;
    let button = if button_focused { " ▶ Sign in ◀ " } else { "   Sign in   " };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("           ["),
        Span::styled(button, field_style(button_focused)),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_style(focused: bool) -> Style {
    if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    }
}

fn render_expired(frame: &mut Frame, app: &App) {
    let snapshot = app.entitlement();
    let configuration = snapshot.configuration.as_ref();
    let company = configuration
        .map(|c| c.company_name().to_string())
        .unwrap_or_else(|| garmentos_core::models::DEFAULT_COMPANY_NAME.to_string());
    let expiry = views::expiry_label(
        configuration.and_then(|c| c.subscription_expiry()),
        chrono::Utc::now(),
    );

    let mut lines = vec![
        Line::from(Span::styled(" Subscription expired", styles::error_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Workspace: ", styles::muted_style()),
            Span::styled(company, styles::list_item_style()),
        ]),
        Line::from(vec![
            Span::styled(" Status:    ", styles::muted_style()),
            Span::styled(expiry, styles::highlight_style()),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " Access is paused until the subscription is renewed.",
            styles::list_item_style(),
        )),
    ];

    let branding = configuration.and_then(|c| c.branding());
    lines.push(Line::from(""));
    lines.extend(views::expired_contact_lines(branding));
    let powered_by = branding
        .map(|b| b.powered_by().to_string())
        .unwrap_or_else(|| garmentos_core::models::BrandingMeta::default().powered_by().to_string());
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!(" Powered by {}", powered_by),
        styles::muted_style(),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(" [r]", styles::help_key_style()),
        Span::styled(" check again  ", styles::help_desc_style()),
        Span::styled("[l]", styles::help_key_style()),
        Span::styled(" sign out  ", styles::help_desc_style()),
        Span::styled("[q]", styles::help_key_style()),
        Span::styled(" quit", styles::help_desc_style()),
    ]));

    let height = (lines.len() as u16) + 2;
    let area = centered_rect_fixed(60, height, frame.area());
    frame.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

// ============================================================================
// Overlays
// ============================================================================

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 20, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");
    let key = |k: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", k), styles::help_key_style()),
            Span::styled(desc, styles::help_desc_style()),
        ])
    };

    let help_text = vec![
        Line::from(Span::styled(format!("  {}", PRODUCT_NAME), styles::title_style())),
        Line::from(Span::styled(format!("  version {}", version), styles::muted_style())),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        key("1-5", "Switch tabs"),
        key("←/→", "Prev/next tab"),
        Line::from(""),
        Line::from(Span::styled(" Actions", styles::highlight_style())),
        key("r", "Recheck workspace subscription"),
        key("e", "Edit display name (Settings)"),
        key("L", "Sign out"),
        key("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_name_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(50, 6, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(" Display name", styles::highlight_style())),
        Line::from(""),
        Line::from(vec![
            Span::raw(" "),
            Span::styled(format!("{}▌", app.name_input), styles::selected_style()),
        ]),
        Line::from(Span::styled(" Enter to save, Esc to cancel", styles::muted_style())),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
