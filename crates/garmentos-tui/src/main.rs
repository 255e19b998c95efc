//! GarmentsOS TUI - a terminal client for the GarmentsOS workspace.
//!
//! This application signs in against the workspace backend, keeps the user
//! on the subscription-expired screen while the workspace is lapsed, and
//! shows the workspace, profile and reference data otherwise.

mod app;
mod commands;
mod ui;

use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use garmentos_core::config::Config;
use garmentos_core::AuthorityContext;

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file written in the cache directory while the TUI owns the terminal
const LOG_FILE: &str = "garmentos.log";

const USAGE: &str = "\
Usage: garmentos [COMMAND]

Without a command, starts the terminal client.

Commands:
  --login     Sign in (reads GARMENTOS_USERNAME / GARMENTOS_PASSWORD if set)
  --logout    Sign out and forget the stored session
  --status    Show the signed-in user and workspace subscription
  --help      Show this message";

fn env_filter() -> EnvFilter {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log to stderr, for headless commands.
fn init_stderr_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter())
        .init();
}

/// Log to a file so output never lands on the alternate screen. The guard
/// must live until shutdown to flush buffered lines.
fn init_file_tracing(dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::never(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter())
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    if let Some(command) = args.get(1) {
        if matches!(command.as_str(), "--help" | "-h") {
            println!("{}", USAGE);
            return Ok(());
        }
        init_stderr_tracing();
        let ctx = AuthorityContext::from_config(&config)?;
        let result = match command.as_str() {
            "--login" => commands::login(&mut config, &ctx).await,
            "--logout" => commands::logout(&ctx),
            "--status" => commands::status(&ctx).await,
            other => {
                eprintln!("Unknown command: {}\n\n{}", other, USAGE);
                std::process::exit(2);
            }
        };
        ctx.teardown();
        return result;
    }

    let _log_guard = init_file_tracing(&config.cache_dir()?)?;
    info!("GarmentsOS TUI starting");

    let ctx = AuthorityContext::from_config(&config)?;
    let mut app = App::new(config, ctx);
    app.start_bootstrap();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    app.ctx.teardown();
    info!("GarmentsOS TUI shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Follow the guard before drawing so a redirect never flashes
        app.reconcile();

        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout so authority updates are picked up
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    app.shutdown();
                    return Ok(());
                }

                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
