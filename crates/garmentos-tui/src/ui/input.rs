//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes. Which handler runs depends on the overlay
//! state first and the current route second.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use garmentos_core::navigation::Route;

use crate::app::{
    can_add_name_char, can_add_password_char, can_add_username_char, App, AppState, LoginFocus,
};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return Ok(false);
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.shutdown();
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    if matches!(app.state, AppState::EditingName) {
        handle_name_input(app, key).await;
        return Ok(false);
    }

    // Nothing to interact with until the guard settles
    if app.waiting {
        if key.code == KeyCode::Char('q') {
            app.state = AppState::ConfirmingQuit;
        }
        return Ok(false);
    }

    match app.route {
        Route::Login => handle_login_input(app, key).await,
        Route::SubscriptionExpired => Ok(handle_expired_input(app, key)),
        _ => Ok(handle_shell_input(app, key)),
    }
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.shutdown();
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Username,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Username,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username => app.login_focus = LoginFocus::Password,
            // Enter on the password field submits directly
            LoginFocus::Password | LoginFocus::Button => app.attempt_login().await,
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_username.chars().count(), c) {
                    app.login_username.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    Ok(false)
}

fn handle_expired_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('l') | KeyCode::Char('L') => app.logout(),
        KeyCode::Char('r') => app.refresh(),
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('q') | KeyCode::Esc => app.state = AppState::ConfirmingQuit,
        _ => {}
    }
    false
}

fn handle_shell_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('1') => app.navigate(Route::Dashboard),
        KeyCode::Char('2') => app.navigate(Route::Articles),
        KeyCode::Char('3') => app.navigate(Route::Options),
        KeyCode::Char('4') => app.navigate(Route::Users),
        KeyCode::Char('5') => app.navigate(Route::Settings),
        KeyCode::Right | KeyCode::Tab => app.next_tab(),
        KeyCode::Left | KeyCode::BackTab => app.prev_tab(),
        KeyCode::Char('e') if app.route == Route::Settings => app.start_name_edit(),
        KeyCode::Char('r') => app.refresh(),
        KeyCode::Char('L') => app.logout(),
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Esc => app.status_message = None,
        _ => {}
    }
    false
}

async fn handle_name_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.name_input.clear();
            app.state = AppState::Normal;
        }
        KeyCode::Enter => app.submit_name().await,
        KeyCode::Backspace => {
            app.name_input.pop();
        }
        KeyCode::Char(c) => {
            if can_add_name_char(app.name_input.chars().count(), c) {
                app.name_input.push(c);
            }
        }
        _ => {}
    }
}
