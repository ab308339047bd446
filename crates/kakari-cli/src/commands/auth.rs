//! Authentication commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};
use kakari_auth::{token, AuthError, BootstrapOutcome, Registration, UserProfile};
use std::io::{self, BufRead, Write};

fn user_label(user: &UserProfile) -> String {
    user.email()
        .map(str::to_string)
        .or_else(|| user.display_name())
        .or_else(|| user.user_id())
        .unwrap_or_else(|| "user".to_string())
}

/// Human-readable token lifetime, e.g. `1h 5m` or `expired`.
fn format_remaining(seconds: i64) -> String {
    match seconds {
        s if s <= 0 => "expired".to_string(),
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m {}s", s / 60, s % 60),
        s => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    }
}

/// Prompts go to stderr so stdout stays parseable under `--format json`.
fn prompt(label: &str) -> Result<String> {
    prompt_with(label, &mut io::stdin().lock(), &mut io::stderr())
}

fn prompt_with(label: &str, input: &mut impl BufRead, out: &mut impl Write) -> Result<String> {
    write!(out, "{label}: ")?;
    out.flush()?;
    let mut value = String::new();
    input.read_line(&mut value)?;
    Ok(value.trim().to_string())
}

/// Check authentication status.
pub async fn status(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let outcome = ctx.bootstrap().await;
    let state = ctx.auth.state();

    let claims = ctx
        .auth
        .session()
        .current_access_token()
        .ok()
        .flatten()
        .and_then(|t| token::decode(&t).ok());
    let expires_at = claims
        .as_ref()
        .and_then(|claims| Utc.timestamp_opt(claims.exp, 0).single());
    let expires_in = claims.as_ref().map(|claims| claims.seconds_remaining().max(0));

    let reason = match &outcome {
        BootstrapOutcome::Anonymous(reason) => Some(reason.to_string()),
        _ => None,
    };

    match format {
        OutputFormat::Text => {
            output::print_row("API", &ctx.config.api_url);
            output::print_row("Auth", &state.phase().to_string());
            if let Some(user) = &state.user {
                output::print_row("User", &user_label(user));
                if let Some(user_id) = user.user_id() {
                    output::print_row("User ID", &user_id);
                }
            } else if let Some(reason) = &reason {
                output::print_row("Reason", reason);
            }
            if let Some(expires_at) = expires_at {
                output::print_row("Expires", &expires_at.to_rfc3339());
            }
            if let Some(expires_in) = expires_in {
                output::print_row("Remaining", &format_remaining(expires_in));
            }
        }
        OutputFormat::Json => {
            output::print_json(&serde_json::json!({
                "api_url": ctx.config.api_url,
                "phase": state.phase(),
                "logged_in": state.is_authenticated,
                "user_id": state.user.as_ref().and_then(UserProfile::user_id),
                "reason": reason,
                "expires_at": expires_at.map(|t| t.to_rfc3339()),
                "expires_in": expires_in,
            }))?;
        }
    }

    Ok(())
}

/// Login with email and password.
pub async fn login(ctx: &Context, email: Option<String>, format: &OutputFormat) -> Result<()> {
    ctx.bootstrap().await;

    if let Some(user) = ctx.auth.current_user() {
        output::print_success(&format!("Already logged in as {}", user_label(&user)), format);
        return Ok(());
    }

    let email = match email {
        Some(email) => email.trim().to_string(),
        None => prompt("Email")?,
    };
    if email.is_empty() {
        bail!("Email is required");
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password is required");
    }

    match ctx.auth.login(&email, &password).await {
        Ok(user) => {
            output::print_success(&format!("Logged in as {}", user_label(&user)), format);
            Ok(())
        }
        Err(AuthError::InvalidCredentials(detail)) => bail!("Login failed: {detail}"),
        Err(e) if e.is_transient() => {
            bail!("Identity service unavailable at {}: {e}", ctx.config.api_url)
        }
        Err(e) => Err(e.into()),
    }
}

/// Logout and clear the persisted session.
pub async fn logout(ctx: &Context, format: &OutputFormat) -> Result<()> {
    ctx.bootstrap().await;
    let was_logged_in = ctx.auth.is_authenticated();

    ctx.auth.logout();

    if was_logged_in {
        output::print_success("Logged out successfully", format);
    } else {
        output::print_success("Not logged in; local session cleared", format);
    }
    Ok(())
}

/// Create an account.
pub async fn register(
    ctx: &Context,
    email: String,
    username: String,
    format: &OutputFormat,
) -> Result<()> {
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password is required");
    }
    if rpassword::prompt_password("Confirm password: ")? != password {
        bail!("Passwords do not match");
    }

    let registration = Registration {
        email,
        username,
        password,
    };
    let user = ctx.auth.register(&registration).await?;

    output::print_success(
        &format!(
            "Account created for {}. Run 'kakari login' to sign in.",
            user_label(&user)
        ),
        format,
    );
    Ok(())
}

/// Print the signed-in user's profile.
pub async fn whoami(ctx: &Context, format: &OutputFormat) -> Result<()> {
    ctx.bootstrap().await;

    let Some(user) = ctx.auth.current_user() else {
        bail!("Not logged in. Run 'kakari login' first.");
    };

    match format {
        OutputFormat::Text => {
            if let Some(name) = user.display_name() {
                output::print_row("Name", &name);
            }
            if let Some(username) = user.username() {
                output::print_row("Username", username);
            }
            if let Some(email) = user.email() {
                output::print_row("Email", email);
            }
            if let Some(user_id) = user.user_id() {
                output::print_row("User ID", &user_id);
            }
        }
        OutputFormat::Json => output::print_json(&user)?,
    }
    Ok(())
}
