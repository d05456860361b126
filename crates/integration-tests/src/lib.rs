//! Integration tests for the KaayaLife storefront.
//!
//! Tests drive the real router in-process, almost always against the
//! in-memory store seeded from the bundled catalog, so no database or
//! network is required. Tests that need `PostgreSQL` are `#[ignore]`d.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p kaaya-integration-tests
//!
//! # With a database
//! DATABASE_URL=postgres://... cargo test -p kaaya-integration-tests -- --ignored
//! ```
//!
//! # Seeded accounts
//!
//! - user 1, `admin@kaayalife.in`, admin
//! - user 2, `priya@example.com`, customer

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use kaaya_core::UserRole;
use kaaya_storefront::config::StorefrontConfig;
use kaaya_storefront::db::seed;
use kaaya_storefront::routes::build_router;
use kaaya_storefront::services::auth::Claims;
use kaaya_storefront::state::AppState;
use kaaya_storefront::store::{Dataset, FallbackCatalog, Store};

pub const ADMIN_ID: i32 = 1;
pub const CUSTOMER_ID: i32 = 2;

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Parsed JSON, or the raw text as a JSON string when the body is not JSON.
    pub body: Value,
}

impl TestResponse {
    /// `body.data`.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.body["message"].as_str()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A router over a fresh demo store.
pub struct TestContext {
    pub state: AppState,
    router: Router,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StorefrontConfig::demo())
    }

    /// Build against `config`. The store is always the in-memory demo store.
    ///
    /// # Panics
    ///
    /// Panics if the bundled dataset is invalid.
    #[must_use]
    pub fn with_config(config: StorefrontConfig) -> Self {
        let dataset = Dataset::builtin().expect("bundled dataset");
        let store = Store::memory(&dataset).expect("demo store");
        Self::with_store(config, store, None)
    }

    /// Build over an explicit store and fallback catalog.
    ///
    /// # Panics
    ///
    /// Panics if the application state cannot be built.
    #[must_use]
    pub fn with_store(config: StorefrontConfig, store: Store, fallback: Option<FallbackCatalog>) -> Self {
        let state = AppState::new(config, store, fallback).expect("app state");
        let router = build_router(state.clone());
        Self { state, router }
    }

    /// A `PostgreSQL` store whose server never answers. Every query fails
    /// with a database error, so reads exercise the fallback path.
    ///
    /// # Panics
    ///
    /// Panics if the bundled dataset or the connection URL is invalid.
    #[must_use]
    pub fn with_unreachable_database(fallback: bool) -> Self {
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(250))
            .connect_lazy("postgres://kaaya@127.0.0.1:1/kaaya")
            .expect("lazy pool");
        let fallback = fallback.then(|| {
            let dataset = Dataset::builtin().expect("bundled dataset");
            FallbackCatalog::from_dataset(&dataset).expect("fallback catalog")
        });
        Self::with_store(StorefrontConfig::demo(), Store::Postgres(pool), fallback)
    }

    /// Build over the database at `DATABASE_URL`, migrated and seeded.
    ///
    /// # Panics
    ///
    /// Panics if `DATABASE_URL` is unset or the database is unreachable.
    pub async fn with_database() -> Self {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPoolOptions::new().connect(&url).await.expect("database");
        sqlx::migrate!("../storefront/migrations")
            .run(&pool)
            .await
            .expect("migrations");
        let dataset = Dataset::builtin().expect("bundled dataset");
        seed::import(&pool, &dataset, false).await.expect("seed");
        let mut config = StorefrontConfig::demo();
        config.database_url = Some(SecretString::from(url));
        Self::with_store(config, Store::Postgres(pool), None)
    }

    /// Build with signature verification on.
    #[must_use]
    pub fn with_token_secret(secret: &str) -> Self {
        let mut config = StorefrontConfig::demo();
        config.auth.token_secret = Some(SecretString::from(secret.to_owned()));
        Self::with_config(config)
    }

    /// Mint a token the router accepts.
    ///
    /// # Panics
    ///
    /// Panics if the claims cannot be encoded.
    #[must_use]
    pub fn token(&self, claims: &Claims) -> String {
        self.state.tokens().mint(claims).expect("mint token")
    }

    #[must_use]
    pub fn claims(sub: i32, email: &str, name: &str, role: UserRole) -> Claims {
        let now = Utc::now();
        Claims {
            sub,
            email: Some(email.to_owned()),
            name: Some(name.to_owned()),
            role,
            exp: Some((now + Duration::hours(1)).timestamp()),
            iat: Some(now.timestamp()),
        }
    }

    #[must_use]
    pub fn admin_token(&self) -> String {
        self.token(&Self::claims(
            ADMIN_ID,
            "admin@kaayalife.in",
            "Kaaya Admin",
            UserRole::Admin,
        ))
    }

    #[must_use]
    pub fn customer_token(&self) -> String {
        self.token(&Self::claims(
            CUSTOMER_ID,
            "priya@example.com",
            "Priya Raman",
            UserRole::Customer,
        ))
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None, None).await
    }

    pub async fn get_as(&self, uri: &str, token: &str) -> TestResponse {
        self.send(Method::GET, uri, Some(token), None).await
    }

    /// Send a request with an optional bearer token and JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.dispatch(request).await
    }

    /// Send a prepared request.
    ///
    /// # Panics
    ///
    /// Panics if the body cannot be read.
    pub async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Parse a money field serialized as a decimal string.
///
/// # Panics
///
/// Panics if `value` is not a decimal string.
#[must_use]
pub fn money(value: &Value) -> f64 {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("not a money string: {value}"))
}

/// A complete shipping address.
#[must_use]
pub fn address() -> Value {
    serde_json::json!({
        "line1": "14 MG Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "postal_code": "560001"
    })
}
