//! S7 Admin - client library for the S7 Robotics administration backend
//!
//! This library provides an authenticated JSON API client that keeps its session
//! in mirrored key-value and cookie storage and recovers once from an expired
//! access token, plus an await-able confirmation dialog service shared by every
//! admin action that needs a "are you sure?" step.

pub mod api_client;
pub mod api_error;
pub mod auth;
pub mod config;
pub mod confirm;
pub mod cookies;
pub mod log_format;
pub mod metrics;
pub mod session;
pub mod storage;

pub use api_client::{ApiClient, RequestInit};
pub use api_error::ApiError;
pub use auth::{AuthResponse, RegisterRequest};
pub use config::ClientConfig;
pub use confirm::{
    ActiveDialog, ConfirmOptions, ConfirmOutcome, ConfirmPreset, ConfirmVariant,
    ConfirmationService, DialogOptions, DialogResponse, DialogState,
};
pub use cookies::CookieStore;
pub use session::{DualSessionStore, SessionStore, Tokens};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage, StorageError};
