//! Session lifecycle against the backend auth routes.

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api_client::{ApiClient, RequestInit};
use crate::api_error::ApiError;
use crate::session::Tokens;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const CURRENT_USER_PATH: &str = "/auth/me";

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Body of a successful login or registration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Profile shape is owned by the backend
    #[serde(default)]
    pub user: Value,
}

impl AuthResponse {
    pub fn tokens(&self) -> Tokens {
        Tokens::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest<'a> {
    refresh_token: &'a str,
}

impl ApiClient {
    /// Sign in and persist the issued token pair
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let init = RequestInit::new(Method::POST).with_json(&LoginRequest { email, password })?;
        let response: AuthResponse = self.fetch_anonymous(LOGIN_PATH, init).await?;
        self.session().set_tokens(&response.tokens());
        info!("Signed in as {}", email);
        Ok(response)
    }

    /// Create an account and persist the issued token pair
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let init = RequestInit::new(Method::POST).with_json(request)?;
        let response: AuthResponse = self.fetch_anonymous(REGISTER_PATH, init).await?;
        self.session().set_tokens(&response.tokens());
        info!("Registered {}", request.email);
        Ok(response)
    }

    /// Tell the backend the session is over, then forget it locally.
    /// The backend call is best-effort; local tokens are cleared regardless.
    pub async fn logout(&self) {
        if let Some(tokens) = self.session().get_tokens()
            && let Err(e) = self.notify_logout(&tokens).await
        {
            warn!("Backend logout failed, clearing local session anyway: {}", e);
        }

        self.session().clear_tokens();
        info!("Signed out");
    }

    async fn notify_logout(&self, tokens: &Tokens) -> Result<(), ApiError> {
        let bearer = HeaderValue::from_str(&format!("Bearer {}", tokens.access_token))
            .map_err(|_| ApiError::InvalidRequest("access token is not a valid header".into()))?;
        let init = RequestInit::new(Method::POST)
            .with_header(AUTHORIZATION, bearer)
            .with_json(&LogoutRequest {
                refresh_token: &tokens.refresh_token,
            })?;
        self.fetch_anonymous::<Value>(LOGOUT_PATH, init).await?;
        Ok(())
    }

    /// Profile of the signed-in user
    pub async fn current_user(&self) -> Result<Value, ApiError> {
        self.get(CURRENT_USER_PATH).await
    }
}
