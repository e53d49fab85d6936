#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Extension, Router,
};
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::Value;
use shopfloor_api::{
    api_v1_routes,
    auth::{AuthConfig, AuthService, Claims},
    config::AppConfig,
    db,
    entities::{downtime_type, machine, part_number, production_order, scrap_type},
    events::{self, EventSender},
    handlers::common::not_found,
    services::{
        catalog::{NewMachine, NewPartNumber},
        orders::CreateOrderInput,
    },
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str =
    "integration_test_secret_for_shopfloor_api_hs256_signing_0123456789abcdef";

/// Application state backed by a throwaway SQLite file plus the `/api/v1` router.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_url = format!("sqlite://{}/shopfloor_test.db?mode=rwc", db_dir.path().display());

        let mut cfg = AppConfig::new(
            db_url,
            JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));
        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&cfg)));

        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));

        let router = Router::new()
            .nest("/api/v1", api_v1_routes())
            .fallback(not_found)
            .layer(Extension(auth_service))
            .with_state(state.clone());

        Self {
            router,
            state,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    /// Bearer token carrying `roles` and `permissions`
    pub fn token(&self, roles: &[&str], permissions: &[&str]) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            name: Some("line-operator".to_string()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            jti: Some(Uuid::new_v4().to_string()),
            iat: now,
            exp: now + 3600,
            iss: self.state.config.jwt_issuer.clone(),
            aud: self.state.config.jwt_audience.clone(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("encode test token")
    }

    pub fn admin_token(&self) -> String {
        self.token(&["admin"], &[])
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
        } else {
            Body::empty()
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request")
    }

    /// Request as an admin
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        let token = self.admin_token();
        self.request(method, uri, body, Some(&token)).await
    }

    pub async fn seed_part_number(&self, code: &str, cycle_time_seconds: i32) -> part_number::Model {
        self.state
            .services
            .catalog
            .create_part_number(NewPartNumber::new(
                code,
                format!("Bucket {}", code),
                cycle_time_seconds,
            ))
            .await
            .expect("seed part number")
    }

    pub async fn seed_machine(&self, number: &str) -> machine::Model {
        self.state
            .services
            .catalog
            .create_machine(NewMachine::new(number))
            .await
            .expect("seed machine")
    }

    pub async fn seed_order(&self, part_number_id: Uuid, quantity: i32) -> production_order::Model {
        self.state
            .services
            .orders
            .create_order(CreateOrderInput {
                part_number_id,
                quantity,
                delivery_date: NaiveDate::from_ymd_opt(2030, 1, 31).expect("valid date"),
            })
            .await
            .expect("seed order")
    }

    /// Seeds the default lookups and returns the first downtime and scrap reason
    pub async fn seed_lookups(&self) -> (downtime_type::Model, scrap_type::Model) {
        let catalog = &self.state.services.catalog;
        catalog.seed_lookups().await.expect("seed lookups");
        let downtime = catalog
            .ensure_downtime_type("SETUP", "Mold change / setup")
            .await
            .expect("downtime type");
        let scrap = catalog
            .ensure_scrap_type("SHORT", "Short shot")
            .await
            .expect("scrap type");
        (downtime, scrap)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
