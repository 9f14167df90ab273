use anyhow::{Context, Result};
use reqwest::header::{
    AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api_error::ApiError;
use crate::config::ClientConfig;
use crate::session::{SessionStore, Tokens};

/// Longest body excerpt carried by a decode error
const DECODE_EXCERPT_CHARS: usize = 500;

/// Options for a single API request
#[derive(Debug, Clone)]
pub struct RequestInit {
    pub method: Method,
    /// Pre-serialized JSON body
    pub body: Option<String>,
    pub headers: HeaderMap,
}

impl Default for RequestInit {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
        }
    }
}

impl RequestInit {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `body` as the JSON request body
    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, ApiError> {
        let json = serde_json::to_string(body)
            .map_err(|e| ApiError::InvalidRequest(format!("body is not serializable: {}", e)))?;
        Ok(self.with_body(json))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// JSON client for the admin backend.
///
/// Attaches the stored bearer token to every request and, when a request comes
/// back 401 while a refresh token is held, refreshes the session once and replays
/// the request once. Refreshes are serialized so that concurrent 401s rotate the
/// token pair a single time.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: Arc<ClientConfig>,
    session: Arc<dyn SessionStore>,
    refresh_lock: Arc<Mutex<()>>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: Arc<dyn SessionStore>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;
        Ok(Self::with_client(client, config, session))
    }

    pub fn with_client(
        client: Client,
        config: ClientConfig,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            client,
            config: Arc::new(config),
            session,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// Perform a request and decode the JSON response as `T`
    #[tracing::instrument(skip(self, init), fields(method = %init.method))]
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        init: RequestInit,
    ) -> Result<T, ApiError> {
        // Read fresh on every call; another request may have rotated the pair
        let tokens = self.session.get_tokens();
        let access_token = tokens.as_ref().map(|t| t.access_token.as_str());

        let mut response = self.send(path, &init, access_token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            match tokens {
                Some(seen) => {
                    debug!("Got 401 for {}, attempting token refresh", path);
                    if let Some(fresh) = self.refresh_after_unauthorized(&seen).await {
                        response = self.send(path, &init, Some(&fresh.access_token)).await?;
                    }
                }
                None => debug!("Got 401 for {} with no refresh token", path),
            }
        }

        self.read_response(path, response).await
    }

    /// Perform a request without the stored session: no bearer token, no refresh
    pub async fn fetch_anonymous<T: DeserializeOwned>(
        &self,
        path: &str,
        init: RequestInit,
    ) -> Result<T, ApiError> {
        let response = self.send(path, &init, None).await?;
        self.read_response(path, response).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.fetch(path, RequestInit::new(Method::GET)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.fetch(path, RequestInit::new(Method::POST).with_json(body)?)
            .await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.fetch(path, RequestInit::new(Method::PUT).with_json(body)?)
            .await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.fetch(path, RequestInit::new(Method::PATCH).with_json(body)?)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.fetch(path, RequestInit::new(Method::DELETE)).await
    }

    /// Exchange `refresh_token` for a new pair.
    ///
    /// Tries the primary refresh route, then the fallback route with the same
    /// payload. On success the new pair is persisted before it is returned; `None`
    /// means the session cannot be recovered.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Option<Tokens> {
        metrics::counter!("api.refresh.attempts_total").increment(1);

        let routes = [
            self.config.refresh_path.as_str(),
            self.config.refresh_fallback_path.as_str(),
        ];

        for route in routes {
            match self.post_refresh(route, refresh_token).await {
                Ok(tokens) => {
                    self.session.set_tokens(&tokens);
                    info!("Session refreshed via {}", route);
                    return Some(tokens);
                }
                Err(e) => warn!("Token refresh via {} failed: {}", route, e),
            }
        }

        metrics::counter!("api.refresh.failures_total").increment(1);
        None
    }

    async fn refresh_after_unauthorized(&self, seen: &Tokens) -> Option<Tokens> {
        let _guard = self.refresh_lock.lock().await;

        match self.session.get_tokens() {
            None => {
                debug!("Session was cleared while waiting to refresh");
                None
            }
            Some(current) if current.refresh_token != seen.refresh_token => {
                debug!("Session already refreshed by a concurrent request");
                Some(current)
            }
            Some(_) => self.refresh_tokens(&seen.refresh_token).await,
        }
    }

    async fn post_refresh(&self, route: &str, refresh_token: &str) -> Result<Tokens, ApiError> {
        let url = self.config.resolve_url(route);
        let response = self
            .client
            .post(&url)
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        self.read_response(route, response).await
    }

    async fn send(
        &self,
        path: &str,
        init: &RequestInit,
        access_token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = self.config.resolve_url(path);
        let mut headers = init.headers.clone();

        if init.body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        if let Some(token) = access_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| {
                    ApiError::InvalidRequest("access token is not a valid header".into())
                })?;
            headers.insert(AUTHORIZATION, value);
        }

        if !headers.contains_key(CACHE_CONTROL) {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }

        let mut request = self.client.request(init.method.clone(), &url).headers(headers);
        if let Some(body) = &init.body {
            request = request.body(body.clone());
        }

        debug!("{} {}", init.method, url);
        metrics::counter!("api.requests_total").increment(1);

        Ok(request.send().await?)
    }

    async fn read_response<T: DeserializeOwned>(
        &self,
        path: &str,
        response: Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!("{} responded {}", path, status);
            return Err(ApiError::from_response_body(status, &body));
        }

        decode_body(path, &body)
    }
}

/// Decode a success body; an empty body decodes as JSON `null`
fn decode_body<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ApiError> {
    let decoded = if body.trim().is_empty() {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_str(body)
    };

    decoded.map_err(|source| ApiError::Decode {
        path: path.to_string(),
        excerpt: body.chars().take(DECODE_EXCERPT_CHARS).collect(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: String,
        email: String,
    }

    #[test]
    fn test_decode_body_typed() {
        let users: Vec<User> =
            decode_body("/api/admin/users", r#"[{"id":"1","email":"a@b.com"}]"#).unwrap();
        assert_eq!(
            users,
            vec![User {
                id: "1".to_string(),
                email: "a@b.com".to_string()
            }]
        );
    }

    #[test]
    fn test_decode_body_empty_is_null() {
        assert!(decode_body::<()>("/auth/logout", "").is_ok());
        let none: Option<User> = decode_body("/x", "  ").unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn test_decode_body_shape_mismatch() {
        let err = decode_body::<Vec<User>>("/api/admin/users", r#"{"items":[]}"#).unwrap_err();
        match err {
            ApiError::Decode { path, excerpt, .. } => {
                assert_eq!(path, "/api/admin/users");
                assert_eq!(excerpt, r#"{"items":[]}"#);
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_request_init_builders() {
        let init = RequestInit::new(Method::POST)
            .with_json(&serde_json::json!({"title": "Lego"}))
            .unwrap()
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        assert_eq!(init.method, Method::POST);
        assert_eq!(init.body.as_deref(), Some(r#"{"title":"Lego"}"#));
        assert_eq!(init.headers.get(CONTENT_TYPE).unwrap(), "text/plain");
    }
}
