#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use ohmnyom_api::config::AppConfig;
use ohmnyom_api::database::MemoryStore;
use ohmnyom_api::state::AppState;
use ohmnyom_api::storage::MemoryMediaStore;

/// The full application over in-memory adapters, driven without a socket.
pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryStore>,
    pub media: Arc<MemoryMediaStore>,
}

/// Tokens and id returned by sign-up or sign-in.
pub struct Session {
    pub id: Uuid,
    pub token: String,
    pub refresh_token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig::development();
        let store = Arc::new(MemoryStore::new());
        let media = Arc::new(MemoryMediaStore::new());

        let state = AppState::new(store.clone(), media.clone(), &config.security)
            .expect("development config has a token secret");
        let router = ohmnyom_api::app_with_layers(state, &config.api, &config.security);

        Self {
            router,
            store,
            media,
        }
    }

    /// Send a JSON request; returns the status and the decoded body (`null` when empty).
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    /// Send raw bytes, as photo uploads do.
    pub async fn upload(
        &self,
        uri: &str,
        token: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(bytes))?;
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };
        Ok((status, body))
    }

    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<Session> {
        let (status, body) = self
            .call(
                Method::POST,
                "/sign/up",
                None,
                Some(json!({ "name": name, "email": email, "password": password })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "sign up failed: {} {}", status, body);
        session(&body)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(StatusCode, Value)> {
        self.call(
            Method::POST,
            "/sign/in",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Create a pet as `session` and return its id.
    pub async fn add_pet(&self, session: &Session, name: &str) -> Result<Uuid> {
        let (status, body) = self
            .call(
                Method::POST,
                "/pets",
                Some(session.token.as_str()),
                Some(json!({ "name": name, "family": "cat", "species": "korean shorthair" })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "add pet failed: {} {}", status, body);
        uuid_at(&body["data"]["id"])
    }
}

pub fn session(body: &Value) -> Result<Session> {
    let data = &body["data"];
    Ok(Session {
        id: uuid_at(&data["account"]["id"])?,
        token: data["token"].as_str().context("token missing")?.to_string(),
        refresh_token: data["refresh_token"]
            .as_str()
            .context("refresh_token missing")?
            .to_string(),
    })
}

pub fn uuid_at(value: &Value) -> Result<Uuid> {
    let raw = value.as_str().with_context(|| format!("not a uuid: {}", value))?;
    Ok(Uuid::parse_str(raw)?)
}

/// Sorted uuid strings from a JSON array.
pub fn ids(value: &Value) -> Vec<String> {
    let mut ids: Vec<String> = value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    ids.sort();
    ids
}
