//! Test harness for driving the storefront router in-process.
//!
//! Builds the full application (in-memory database, real session layer) and
//! exercises it with `tower::ServiceExt::oneshot`, round-tripping session
//! cookies like a browser would.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

use spindle_core::{AlbumId, Price};
use spindle_storefront::config::StorefrontConfig;
use spindle_storefront::db::{self, catalog::AlbumRepository};
use spindle_storefront::state::AppState;

/// A running test application backed by an in-memory database.
#[derive(Clone)]
pub struct TestApp {
    router: Router,
}

impl TestApp {
    /// Spin up the app against a fresh in-memory database.
    ///
    /// Returns the app and the pool for direct seeding/inspection.
    pub async fn spawn() -> (Self, SqlitePool) {
        let config = test_config();
        let pool = db::create_pool(&config.database_url)
            .await
            .expect("create pool");
        db::migrate(&pool).await.expect("run migrations");

        let state = AppState::new(config, pool.clone());
        let router = spindle_storefront::app(state).await.expect("build router");

        (Self { router }, pool)
    }

    /// A client with its own cookie jar (one per simulated browser).
    #[must_use]
    pub fn client(&self) -> TestClient {
        TestClient {
            router: self.router.clone(),
            cookies: HashMap::new(),
        }
    }
}

/// One simulated browser: a cookie jar over the shared router.
pub struct TestClient {
    router: Router,
    cookies: HashMap<String, String>,
}

impl TestClient {
    /// Send a request, round-tripping cookies, and parse the JSON body.
    pub async fn request(
        &mut self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if !self.cookies.is_empty() {
            let cookie_header = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie_header);
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router call");

        let status = response.status();

        for set_cookie in response.headers().get_all(header::SET_COOKIE) {
            let raw = set_cookie.to_str().unwrap_or_default();
            let pair = raw.split(';').next().unwrap_or(raw);
            if let Some((name, value)) = pair.split_once('=') {
                self.cookies
                    .insert(name.trim().to_owned(), value.trim().to_owned());
            }
        }

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        (status, json)
    }

    /// GET a path.
    pub async fn get(&mut self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    /// POST a JSON body.
    pub async fn post(&mut self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    /// PUT a JSON body.
    pub async fn put(&mut self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body)).await
    }

    /// DELETE a path.
    pub async fn delete(&mut self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None).await
    }

    /// Log in as the given user id (the identity provider is stubbed).
    pub async fn login(&mut self, user_id: i64) {
        let (status, _) = self
            .post("/auth/login", serde_json::json!({ "user_id": user_id }))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed");
    }
}

/// Insert a catalog album and return its id.
pub async fn seed_album(
    pool: &SqlitePool,
    title: &str,
    artist: &str,
    price_cents: i64,
    stock: i64,
) -> AlbumId {
    AlbumRepository::new(pool)
        .create(title, artist, Price::from_cents(price_cents), stock)
        .await
        .expect("seed album")
        .id
}

/// Valid billing fields for order payloads.
#[must_use]
pub fn billing_json() -> Value {
    serde_json::json!({
        "address": "Abbey Road 3",
        "city": "London",
        "zip_code": "90210",
        "phone": "03-1234567",
    })
}

fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("sqlite::memory:"),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "http://localhost:3000".to_owned(),
        session_secret: SecretString::from("kN8#vQ2$mL5@wX9!pR4^tY7&zB1*eD3%"),
        sentry_dsn: None,
        sentry_environment: None,
    }
}
