//! Session token persistence.
//!
//! The token pair lives in two places at once: key-value storage (read first) and
//! cookies (read as a fallback). Both are always written and cleared together
//! under one lock, and every storage failure is logged and swallowed so a broken
//! store reads as "logged out" rather than an error.
//!
//! Each store takes the pair in one batch. A store whose write fails drops
//! whatever it still holds, so a reader sees the new pair or no pair, never half
//! of one.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::cookies::CookieStore;
use crate::storage::{KeyValueStore, StorageResult};

pub const ACCESS_TOKEN_KEY: &str = "s7.accessToken";
pub const REFRESH_TOKEN_KEY: &str = "s7.refreshToken";
const TOKEN_KEYS: [&str; 2] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY];

/// Access/refresh token pair issued by the backend
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl Tokens {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    fn from_parts(access: Option<String>, refresh: Option<String>) -> Option<Self> {
        match (access, refresh) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(Self::new(access, refresh))
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for Tokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Where the API client keeps the current session
pub trait SessionStore: Send + Sync {
    fn get_tokens(&self) -> Option<Tokens>;
    fn set_tokens(&self, tokens: &Tokens);
    fn clear_tokens(&self);
}

/// Session store mirrored across key-value storage and cookies
pub struct DualSessionStore {
    storage: Arc<dyn KeyValueStore>,
    cookies: Arc<CookieStore>,
    write_lock: Mutex<()>,
}

impl DualSessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, cookies: Arc<CookieStore>) -> Self {
        Self {
            storage,
            cookies,
            write_lock: Mutex::new(()),
        }
    }

    /// Token pair as seen through key-value storage alone
    pub fn storage_tokens(&self) -> Option<Tokens> {
        let access = self.storage_get(ACCESS_TOKEN_KEY);
        let refresh = self.storage_get(REFRESH_TOKEN_KEY);
        Tokens::from_parts(access, refresh)
    }

    /// Token pair as seen through cookies alone
    pub fn cookie_tokens(&self) -> Option<Tokens> {
        let access = self.cookie_get(ACCESS_TOKEN_KEY);
        let refresh = self.cookie_get(REFRESH_TOKEN_KEY);
        Tokens::from_parts(access, refresh)
    }

    pub fn cookies(&self) -> &CookieStore {
        &self.cookies
    }

    fn storage_get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).unwrap_or_else(|e| {
            warn!("Failed to read {} from storage: {}", key, e);
            None
        })
    }

    fn cookie_get(&self, key: &str) -> Option<String> {
        self.cookies.get(key).unwrap_or_else(|e| {
            warn!("Failed to read {} cookie: {}", key, e);
            None
        })
    }

    fn write_storage(&self, tokens: Option<&Tokens>) -> StorageResult<()> {
        match tokens {
            Some(t) => self.storage.set_items(&[
                (ACCESS_TOKEN_KEY, t.access_token.as_str()),
                (REFRESH_TOKEN_KEY, t.refresh_token.as_str()),
            ]),
            None => self.storage.remove_items(&TOKEN_KEYS),
        }
    }

    fn write_cookies(&self, tokens: Option<&Tokens>) -> StorageResult<()> {
        match tokens {
            Some(t) => self.cookies.set_many(&[
                (ACCESS_TOKEN_KEY, t.access_token.as_str()),
                (REFRESH_TOKEN_KEY, t.refresh_token.as_str()),
            ]),
            None => self.cookies.remove_many(&TOKEN_KEYS),
        }
    }

    fn write(&self, tokens: Option<&Tokens>) {
        let Ok(_guard) = self.write_lock.lock() else {
            warn!("Session store lock poisoned; leaving session unchanged");
            return;
        };

        let storage_written = self
            .write_storage(tokens)
            .inspect_err(|e| warn!("Failed to write session to storage: {}", e))
            .is_ok();
        let cookies_written = self
            .write_cookies(tokens)
            .inspect_err(|e| warn!("Failed to write session cookies: {}", e))
            .is_ok();

        if tokens.is_some() && !(storage_written && cookies_written) {
            self.discard_failed_write(tokens, storage_written, cookies_written);
        }
    }

    /// A store that missed a new pair may hold half of it or the previous pair.
    /// Drop whatever it holds; if a reader would still see anything other than
    /// `intended`, drop the session from both stores.
    fn discard_failed_write(
        &self,
        intended: Option<&Tokens>,
        storage_ok: bool,
        cookies_ok: bool,
    ) {
        if !storage_ok && let Err(e) = self.write_storage(None) {
            debug!("Could not discard partial session in storage: {}", e);
        }
        if !cookies_ok && let Err(e) = self.write_cookies(None) {
            debug!("Could not discard partial session cookies: {}", e);
        }

        let visible = self.storage_tokens().or_else(|| self.cookie_tokens());
        if visible.is_some() && visible.as_ref() != intended {
            warn!("Session stores disagree after a failed write; signing out locally");
            let _ = self.write_storage(None);
            let _ = self.write_cookies(None);
        }
    }
}

impl SessionStore for DualSessionStore {
    fn get_tokens(&self) -> Option<Tokens> {
        let _guard = self.write_lock.lock().ok()?;
        self.storage_tokens().or_else(|| {
            let from_cookies = self.cookie_tokens();
            if from_cookies.is_some() {
                debug!("Session restored from cookies");
            }
            from_cookies
        })
    }

    fn set_tokens(&self, tokens: &Tokens) {
        self.write(Some(tokens));
    }

    fn clear_tokens(&self) {
        self.write(None);
    }
}
