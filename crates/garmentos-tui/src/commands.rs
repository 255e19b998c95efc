//! Headless commands: `--login`, `--logout`, `--status`.
//!
//! These run without the terminal UI and report on stdout; logs go to
//! stderr.

use std::io::{self, Write};

use anyhow::{bail, Result};
use chrono::Utc;

use garmentos_core::config::{Config, ENV_PASSWORD, ENV_USERNAME};
use garmentos_core::entitlement::EntitlementSnapshot;
use garmentos_core::AuthorityContext;

use crate::ui::views::expiry_label;

/// Pick the username: environment first, then what was typed, then the
/// last used one.
pub fn choose_username(env: Option<String>, typed: &str, last: Option<&str>) -> Option<String> {
    env.map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| Some(typed.trim().to_string()).filter(|v| !v.is_empty()))
        .or_else(|| last.map(str::to_string).filter(|v| !v.is_empty()))
}

fn prompt_username(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input)
}

pub async fn login(config: &mut Config, ctx: &AuthorityContext) -> Result<()> {
    let env_username = std::env::var(ENV_USERNAME).ok();
    let typed = if env_username.is_some() {
        String::new()
    } else {
        prompt_username(config.last_username.as_deref())?
    };
    let Some(username) = choose_username(env_username, &typed, config.last_username.as_deref())
    else {
        bail!("Username required");
    };

    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ")?,
    };

    println!("\nSigning in...");
    let identity = match ctx.login_and_recheck(&username, &password).await {
        Ok(identity) => identity,
        Err(e) => bail!("{}", e.user_message()),
    };

    config.last_username = Some(username);
    config.save()?;

    println!("Signed in as {} ({})", identity.display_name, identity.role.as_str());
    print_entitlement(&ctx.entitlement().snapshot());
    Ok(())
}

pub fn logout(ctx: &AuthorityContext) -> Result<()> {
    ctx.logout()?;
    println!("Signed out.");
    Ok(())
}

pub async fn status(ctx: &AuthorityContext) -> Result<()> {
    match ctx.bootstrap().await {
        Some(identity) => {
            println!("Signed in as {} ({})", identity.display_name, identity.role.as_str());
            if let Some(username) = identity.username {
                println!("Username:     {}", username);
            }
            print_entitlement(&ctx.entitlement().snapshot());
        }
        None => println!("Not signed in. Run with --login to sign in."),
    }
    Ok(())
}

fn print_entitlement(snapshot: &EntitlementSnapshot) {
    match snapshot.configuration {
        Some(ref config) => {
            println!("Workspace:    {}", config.company_name());
            println!(
                "Subscription: {}",
                expiry_label(config.subscription_expiry(), Utc::now())
            );
        }
        None => println!("Workspace:    unavailable"),
    }
    if let Some(ref options) = snapshot.options {
        println!(
            "Options:      {} seasons, {} categories, {} sizes",
            options.unique_seasons().len(),
            options.unique_categories().len(),
            options.unique_sizes().len()
        );
    }
}
