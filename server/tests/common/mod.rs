// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::test;
use bazaar::models::requests::{CategoryPayload, CreateUserPayload, ProductPayload};
use bazaar::models::{Product, Role, UnitType, UserDto};
use bazaar::storage::InMemoryStore;
use bazaar_server::config::{AppConfig, LogFormat};
use bazaar_server::state::AppState;
use bazaar_server::{build_services, ReportWorker};
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::Level;
use uuid::Uuid;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub const PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> AppConfig {
  let config = AppConfig {
    server_host: "127.0.0.1".to_string(),
    server_port: 0,
    database_url: None,
    database_max_connections: 1,
    jwt_secret: "integration-test-secret-0123456789abcdef".to_string(),
    jwt_access_minutes: 15,
    jwt_refresh_days: 7,
    cache_ttl: Duration::from_secs(60),
    report_delay: Duration::from_millis(10),
    rate_limit_capacity: 3,
    rate_limit_refill: 2,
    rate_limit_period: Duration::from_secs(5),
    cors_allowed_origin: None,
    seed_db: false,
    admin_email: "admin@bazaar.test".to_string(),
    admin_password: String::new(),
    log_format: LogFormat::Pretty,
  };
  config.validate().unwrap();
  config
}

/// State over a fresh in-memory store. The report worker is returned unstarted.
pub fn test_state() -> (AppState, ReportWorker) {
  setup_tracing();
  let config = test_config();
  let (services, worker) = build_services(Arc::new(InMemoryStore::new()), &config);
  (AppState::new(config, services), worker)
}

pub async fn user(state: &AppState, role: Role) -> UserDto {
  state
    .services
    .users
    .create(CreateUserPayload {
      name: format!("Test {}", role.as_str()),
      email: format!("{}-{}@bazaar.test", role.as_str(), Uuid::new_v4().simple()),
      password: PASSWORD.to_string(),
      role,
    })
    .await
    .unwrap()
}

/// `Authorization` header value carrying a fresh access token for `user`.
pub fn bearer(state: &AppState, user: &UserDto) -> (&'static str, String) {
  let pair = state.jwt.issue_pair(user).unwrap();
  ("Authorization", format!("Bearer {}", pair.access_token))
}

pub async fn product(state: &AppState, name: &str, price: &str, stock: &str) -> Product {
  let category = state
    .services
    .categories
    .create(CategoryPayload {
      id: None,
      name: format!("{} shelf", name),
      description: String::new(),
    })
    .await
    .unwrap();
  state
    .services
    .products
    .create(ProductPayload {
      id: None,
      name: name.to_string(),
      description: String::new(),
      price: price.parse().unwrap(),
      unit_type: UnitType::Unit,
      stock: stock.parse().unwrap(),
      category_id: category.id,
      image_url: None,
    })
    .await
    .unwrap()
}

/// Asserts the status and the problem-details shape, and returns the body.
pub async fn assert_problem<B: MessageBody>(resp: ServiceResponse<B>, status: u16, code: &str) -> Value {
  assert_eq!(resp.status().as_u16(), status);
  let content_type = resp
    .headers()
    .get("content-type")
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default()
    .to_string();
  assert_eq!(content_type, "application/problem+json");
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["status"], status);
  assert_eq!(body["code"], code);
  assert!(body["type"].as_str().unwrap().starts_with("/problems/"));
  assert!(body["title"].is_string());
  assert!(body["detail"].is_string());
  body
}
