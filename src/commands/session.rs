use anyhow::{Context, Result};
use s7_admin::{ApiClient, ConfirmOptions, ConfirmPreset, ConfirmationService, RegisterRequest};
use tracing::info;

use super::print_json;

pub async fn handle_login(client: &ApiClient, email: &str, password: &str) -> Result<()> {
    let response = client
        .login(email, password)
        .await
        .context("Sign-in failed")?;
    print_json(&response.user)
}

pub async fn handle_register(
    client: &ApiClient,
    email: String,
    password: String,
    full_name: Option<String>,
) -> Result<()> {
    let request = RegisterRequest {
        email,
        password,
        full_name,
    };
    let response = client
        .register(&request)
        .await
        .context("Registration failed")?;
    print_json(&response.user)
}

pub async fn handle_logout(client: &ApiClient, confirmations: &ConfirmationService) -> Result<()> {
    if client.session().get_tokens().is_none() {
        info!("No active session");
        return Ok(());
    }

    let outcome = confirmations
        .confirm(ConfirmOptions::preset(ConfirmPreset::Logout))
        .await;
    if !outcome.is_confirmed() {
        info!("Sign-out cancelled");
        return Ok(());
    }

    client.logout().await;
    Ok(())
}

pub async fn handle_whoami(client: &ApiClient) -> Result<()> {
    let user = client
        .current_user()
        .await
        .context("Failed to load the current user")?;
    print_json(&user)
}
