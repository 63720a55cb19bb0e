// tests/auth_tests.rs

mod common;

use actix_web::{test, App};
use bazaar::models::Role;
use bazaar_server::configure_app;
use common::*;
use serde_json::{json, Value};

#[actix_web::test]
async fn health_is_public() {
  let (state, _worker) = test_state();
  let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, state.clone()))).await;

  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/health").to_request()).await;
  assert!(resp.status().is_success());
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({ "status": "ok" }));
}

#[actix_web::test]
async fn register_login_and_refresh() {
  let (state, _worker) = test_state();
  let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, state.clone()))).await;

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/register")
    .set_json(json!({ "name": "Rita", "email": "Rita@Bazaar.test", "password": PASSWORD }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status().as_u16(), 201);
  let registered: Value = test::read_body_json(resp).await;
  assert_eq!(registered["user"]["role"], "customer");
  assert_eq!(registered["user"]["email"], "rita@bazaar.test");
  assert_eq!(registered["token_type"], "Bearer");
  assert!(registered["user"].get("password_hash").is_none());

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/login")
    .set_json(json!({ "email": "rita@bazaar.test", "password": PASSWORD }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status().as_u16(), 200);
  let logged_in: Value = test::read_body_json(resp).await;
  assert_eq!(logged_in["user"]["id"], registered["user"]["id"]);
  let refresh_token = logged_in["refresh_token"].as_str().unwrap().to_string();

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/refresh")
    .set_json(json!({ "refresh_token": refresh_token }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status().as_u16(), 200);
  let refreshed: Value = test::read_body_json(resp).await;
  assert_ne!(refreshed["access_token"], logged_in["access_token"]);
  assert_eq!(refreshed["user"]["id"], registered["user"]["id"]);
}

#[actix_web::test]
async fn refresh_rejects_access_tokens() {
  let (state, _worker) = test_state();
  let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, state.clone()))).await;
  let customer = user(&state, Role::Customer).await;
  let access = state.jwt.issue_pair(&customer).unwrap().access_token;

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/refresh")
    .set_json(json!({ "refresh_token": access }))
    .to_request();
  let body = assert_problem(test::call_service(&app, req).await, 401, "UNAUTHORIZED").await;
  assert_eq!(body["detail"], "invalid refresh token");
}

#[actix_web::test]
async fn wrong_password_is_unauthorized() {
  let (state, _worker) = test_state();
  let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, state.clone()))).await;
  let customer = user(&state, Role::Customer).await;

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/login")
    .set_json(json!({ "email": customer.email, "password": "not-the-password" }))
    .to_request();
  let body = assert_problem(test::call_service(&app, req).await, 401, "UNAUTHORIZED").await;
  assert_eq!(body["type"], "/problems/unauthorized");
}

#[actix_web::test]
async fn register_validates_and_rejects_duplicates() {
  let (state, _worker) = test_state();
  let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, state.clone()))).await;
  let existing = user(&state, Role::Customer).await;

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/register")
    .set_json(json!({ "name": "Short", "email": "short@bazaar.test", "password": "x" }))
    .to_request();
  assert_problem(test::call_service(&app, req).await, 400, "VALIDATION_FAILED").await;

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/register")
    .set_json(json!({ "name": "Again", "email": existing.email, "password": PASSWORD }))
    .to_request();
  assert_problem(test::call_service(&app, req).await, 409, "DUPLICATE_DATA").await;
}

#[actix_web::test]
async fn fourth_auth_request_in_a_burst_is_throttled() {
  let (state, _worker) = test_state();
  let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, state.clone()))).await;
  let login = || {
    test::TestRequest::post()
      .uri("/api/v1/auth/login")
      .peer_addr("10.1.2.3:5000".parse().unwrap())
      .set_json(json!({ "email": "nobody@bazaar.test", "password": "whatever-it-is" }))
      .to_request()
  };

  for _ in 0..3 {
    let resp = test::call_service(&app, login()).await;
    assert_eq!(resp.status().as_u16(), 401);
  }
  let resp = test::call_service(&app, login()).await;
  assert!(resp.headers().contains_key("retry-after"));
  assert_problem(resp, 429, "RATE_LIMITED").await;

  // Another client still has its own bucket.
  let other = test::TestRequest::post()
    .uri("/api/v1/auth/login")
    .peer_addr("10.9.9.9:5000".parse().unwrap())
    .set_json(json!({ "email": "nobody@bazaar.test", "password": "whatever-it-is" }))
    .to_request();
  assert_eq!(test::call_service(&app, other).await.status().as_u16(), 401);
}

#[actix_web::test]
async fn malformed_json_is_a_bad_request() {
  let (state, _worker) = test_state();
  let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, state.clone()))).await;

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/login")
    .insert_header(("content-type", "application/json"))
    .set_payload("{ not json")
    .to_request();
  let body = assert_problem(test::call_service(&app, req).await, 400, "INCORRECT_FORMAT").await;
  assert!(body["detail"].as_str().unwrap().starts_with("invalid JSON body"));
}
