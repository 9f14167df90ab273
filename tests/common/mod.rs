//! Common test utilities for API client integration tests
//!
//! `TestBackend` serves an axum router on an ephemeral localhost port and records
//! every request it receives, so tests can assert exactly which calls the client
//! made and with which headers.
//!
//! # Usage
//!
//! ```no_run
//! use common::TestBackend;
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let backend = TestBackend::start(Router::new().route("/courses", get(list))).await;
//!     let (client, session) = common::client_for(&backend, None);
//!     // ...
//!     assert_eq!(backend.count("/courses"), 1);
//! }
//! ```

#![allow(dead_code)]

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use s7_admin::{ApiClient, ClientConfig, CookieStore, DualSessionStore, MemoryStorage, Tokens};
use std::sync::{Arc, Mutex};

/// One request as seen by the mock backend
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<RecordedRequest>>>);

impl RequestLog {
    pub fn all(&self) -> Vec<RecordedRequest> {
        self.0.lock().unwrap().clone()
    }

    pub fn for_path(&self, path: &str) -> Vec<RecordedRequest> {
        self.all().into_iter().filter(|r| r.path == path).collect()
    }
}

async fn record_request(State(log): State<RequestLog>, request: Request, next: Next) -> Response {
    let recorded = {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let recorded = RecordedRequest {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            authorization: header("authorization"),
            content_type: header("content-type"),
            cache_control: header("cache-control"),
        };
        recorded
    };
    log.0.lock().unwrap().push(recorded);

    next.run(request).await
}

pub struct TestBackend {
    pub base_url: String,
    pub log: RequestLog,
}

impl TestBackend {
    pub async fn start(router: Router) -> Self {
        let log = RequestLog::default();
        let app = router.layer(middleware::from_fn_with_state(log.clone(), record_request));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test backend");
        let addr = listener.local_addr().expect("Failed to read local address");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Test backend stopped unexpectedly");
        });

        Self {
            base_url: format!("http://{}", addr),
            log,
        }
    }

    pub fn count(&self, path: &str) -> usize {
        self.log.for_path(path).len()
    }
}

/// Client against `backend` with an in-memory session, optionally signed in
pub fn client_for(
    backend: &TestBackend,
    tokens: Option<Tokens>,
) -> (ApiClient, Arc<DualSessionStore>) {
    let session = Arc::new(DualSessionStore::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(CookieStore::new()),
    ));
    if let Some(tokens) = tokens {
        use s7_admin::SessionStore;
        session.set_tokens(&tokens);
    }

    let client = ApiClient::new(ClientConfig::new(backend.base_url.clone()), session.clone())
        .expect("Failed to create API client");
    (client, session)
}
