use anyhow::{Context, Result};
use reqwest::Method;
use s7_admin::{ApiClient, ConfirmOptions, ConfirmPreset, ConfirmationService, RequestInit};
use serde_json::{Value, json};
use tracing::info;

use super::print_json;

/// Send an arbitrary request and print the JSON response
pub async fn handle_request(
    client: &ApiClient,
    method: &str,
    path: &str,
    body: Option<String>,
) -> Result<()> {
    let method: Method = method
        .to_uppercase()
        .parse()
        .with_context(|| format!("Invalid HTTP method: {}", method))?;

    let mut init = RequestInit::new(method);
    if let Some(body) = body {
        // Reject malformed JSON before it reaches the backend
        serde_json::from_str::<Value>(&body).context("--body must be valid JSON")?;
        init = init.with_body(body);
    }

    let response: Value = client.fetch(path, init).await?;
    print_json(&response)
}

/// Delete a resource after a confirmation
pub async fn handle_delete(
    client: &ApiClient,
    confirmations: &ConfirmationService,
    path: &str,
) -> Result<()> {
    let outcome = confirmations
        .confirm(
            ConfirmOptions::preset(ConfirmPreset::Delete)
                .description(format!("{} will be deleted. This action cannot be undone.", path)),
        )
        .await;
    if !outcome.is_confirmed() {
        info!("Delete cancelled");
        return Ok(());
    }

    let response: Value = client.delete(path).await?;
    print_json(&response)
}

/// Ban a user after a confirmation that collects the reason
pub async fn handle_ban(
    client: &ApiClient,
    confirmations: &ConfirmationService,
    user_id: &str,
) -> Result<()> {
    let outcome = confirmations
        .confirm(ConfirmOptions::preset(ConfirmPreset::Ban))
        .await;
    let Some(reason) = outcome.reason() else {
        info!("Ban cancelled");
        return Ok(());
    };

    let path = format!("/api/admin/users/{}/ban", user_id);
    let response: Value = client.post(&path, &json!({ "reason": reason })).await?;
    print_json(&response)
}
