//! Authenticated API calls.

use super::describe;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use session_auth::SessionManager;
use tracing::debug;

/// Signed GET of an API path. Prints the body, pretty-printed when it is JSON.
pub async fn get(manager: &SessionManager, path: &str, format: &OutputFormat) -> Result<()> {
    let client = manager.client();

    let response = match client.send(client.get(path)?).await {
        Ok(response) => response,
        Err(e) => {
            output::print_error(&describe(&e), format);
            return Ok(());
        }
    };

    let status = response.status();
    let body = response.text().await?;
    debug!(status = %status, bytes = body.len(), "Response received");

    if !status.is_success() {
        output::print_error(&format!("HTTP {}: {}", status, body), format);
        return Ok(());
    }

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => output::print_json(&json),
        Err(_) => println!("{}", body),
    }

    Ok(())
}
