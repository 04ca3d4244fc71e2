//! Authentication commands.

use super::describe;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use session_auth::{SessionError, SessionManager};
use std::io::{self, Write};

/// Login with identifier and password, prompting for whatever is missing.
pub async fn login(
    manager: &SessionManager,
    identifier: Option<String>,
    password: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    if let Some(identity) = manager.get_identity() {
        output::print_success(
            &format!("Already logged in as {}", identity.username),
            format,
        );
        return Ok(());
    }

    let identifier = match identifier {
        Some(identifier) => identifier,
        None => {
            print!("Username or email: ");
            io::stdout().flush()?;
            let mut identifier = String::new();
            io::stdin().read_line(&mut identifier)?;
            identifier.trim().to_string()
        }
    };

    if identifier.is_empty() {
        output::print_error("Username or email is required", format);
        return Ok(());
    }

    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };

    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }

    match manager.login_with_password(&identifier, &password).await {
        Ok(identity) => {
            output::print_success(&format!("Logged in as {}", identity.username), format)
        }
        Err(SessionError::InvalidCredentials(_)) => {
            output::print_error("Login failed: invalid credentials", format)
        }
        Err(e) => output::print_error(&format!("Login failed: {}", e), format),
    }

    Ok(())
}

/// Logout and clear the stored session.
pub async fn logout(manager: &SessionManager, format: &OutputFormat) -> Result<()> {
    manager.logout();
    output::print_success("Logged out successfully", format);
    Ok(())
}

/// Show the locally stored session. No network call.
pub async fn status(manager: &SessionManager, format: &OutputFormat) -> Result<()> {
    let snapshot = manager.snapshot();

    match format {
        OutputFormat::Text => match &snapshot.identity {
            Some(identity) => {
                output::print_row("Auth", "logged in");
                output::print_row("User", &identity.username);
                output::print_row("User ID", &identity.id.to_string());
                output::print_row("Role", identity.role.as_deref().unwrap_or("-"));
            }
            None => output::print_row("Auth", "not logged in"),
        },
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "logged_in": snapshot.identity.is_some(),
            "phase": snapshot.phase,
            "loading": snapshot.loading,
            "user": snapshot.identity,
        })),
    }

    Ok(())
}

/// Fetch the profile from the server and update the cached identity.
pub async fn whoami(manager: &SessionManager, format: &OutputFormat) -> Result<()> {
    match manager.refresh_identity().await {
        Ok(identity) => match format {
            OutputFormat::Text => {
                output::print_row("User", &identity.username);
                output::print_row("User ID", &identity.id.to_string());
                output::print_row("Role", identity.role.as_deref().unwrap_or("-"));
                output::print_row("Admin", if identity.is_admin() { "yes" } else { "no" });
            }
            OutputFormat::Json => output::print_json(&identity),
        },
        Err(SessionError::NotLoggedIn) => {
            output::print_error("Not logged in. Run 'storefront login' first.", format)
        }
        Err(e) => output::print_error(&describe(&e), format),
    }

    Ok(())
}
