//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::util::ServiceExt;

use library_loans::api::{build_router, AppState};
use library_loans::auth::hash_password;
use library_loans::clock::FixedClock;
use library_loans::domain::{Book, NewBook, User};
use library_loans::store::{MemoryStore, NewUser, Store};

pub const PASSWORD: &str = "pytestpass";

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Router over a fresh in-memory store with the clock pinned to [`today`]
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            store.clone(),
            Arc::new(FixedClock::on(today())),
            chrono::Duration::minutes(30),
        );
        Self {
            router: build_router(state),
            store,
        }
    }

    pub async fn seed_user(&self, username: &str, is_admin: bool) -> User {
        self.store
            .create_user(NewUser {
                username: username.to_string(),
                user_email: format!("{}@example.com", username),
                hashed_password: hash_password(PASSWORD).unwrap(),
                is_admin,
            })
            .await
            .unwrap()
    }

    pub async fn seed_book(&self, name: &str, volumes: i32) -> Book {
        self.store
            .create_book(NewBook {
                book_name: name.to_string(),
                book_genre: "Fiction".to_string(),
                book_year: 1999,
                book_author: "Author".to_string(),
                book_language: "English".to_string(),
                book_description: Some("A test book".to_string()),
                number_available_volumes: volumes,
            })
            .await
            .unwrap()
    }

    /// Log in through `POST /token` and return the bearer token
    pub async fn token_for(&self, username: &str) -> String {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username={}&password={}", username, PASSWORD)))
            .unwrap();
        let response = self.send(request).await;
        assert_eq!(response.status, StatusCode::OK, "login failed for {}", username);
        response.json()["access_token"].as_str().unwrap().to_string()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, token, None)).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(request(Method::POST, uri, token, Some(body))).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(request(Method::PATCH, uri, token, Some(body))).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(request(Method::DELETE, uri, token, None)).await
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Connect to `DATABASE_URL` and empty every table
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query("TRUNCATE TABLE access_tokens, loans, books, users RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}
