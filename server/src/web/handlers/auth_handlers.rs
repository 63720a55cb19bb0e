// bazaar_server/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use bazaar::models::requests::{LoginPayload, RegisterPayload};
use bazaar::models::UserDto;
use bazaar::{ContextData, PipelineResult};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::auth::TokenPair;
use crate::errors::ApiError;
use crate::pipelines::common_steps::required;
use crate::pipelines::contexts::{RefreshCtxData, SigninCtxData, SignupCtxData};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequestPayload {
  pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
  pub user: UserDto,
  #[serde(flatten)]
  pub tokens: TokenPair,
}

/// Runs the pipeline registered for `T` and hands the finished context back.
async fn run_pipeline<T>(state: &AppState, data: T, flow: &'static str) -> Result<ContextData<T>, ApiError>
where
  T: Send + Sync + 'static,
{
  let ctx = ContextData::new(data);
  match state.workflows.run(ctx.clone()).await? {
    PipelineResult::Completed => Ok(ctx),
    PipelineResult::Stopped => {
      warn!(flow, "Auth pipeline stopped before completing.");
      Err(ApiError::Internal(format!("{} was halted by an internal step", flow)))
    }
  }
}

#[instrument(name = "handler::register", skip(state, payload), fields(email = %payload.email))]
pub async fn register(state: web::Data<AppState>, payload: web::Json<RegisterPayload>) -> Result<HttpResponse, ApiError> {
  let data = SignupCtxData::new(state.get_ref().clone(), payload.into_inner());
  let ctx = run_pipeline(&state, data, "sign-up").await?;
  let (user, tokens) = ctx.with(|d| (d.user.clone(), d.tokens.clone()));
  let response = AuthResponse {
    user: required(user, "the new user")?,
    tokens: required(tokens, "tokens")?,
  };
  info!(user_id = %response.user.id, "Customer registered.");
  Ok(HttpResponse::Created().json(response))
}

#[instrument(name = "handler::login", skip(state, payload))]
pub async fn login(state: web::Data<AppState>, payload: web::Json<LoginPayload>) -> Result<HttpResponse, ApiError> {
  let data = SigninCtxData::new(state.get_ref().clone(), payload.into_inner());
  let ctx = run_pipeline(&state, data, "sign-in").await?;
  let (user, tokens) = ctx.with(|d| (d.user.clone(), d.tokens.clone()));
  Ok(HttpResponse::Ok().json(AuthResponse {
    user: required(user, "the authenticated user")?,
    tokens: required(tokens, "tokens")?,
  }))
}

#[instrument(name = "handler::refresh", skip_all)]
pub async fn refresh(state: web::Data<AppState>, payload: web::Json<RefreshRequestPayload>) -> Result<HttpResponse, ApiError> {
  let data = RefreshCtxData::new(state.get_ref().clone(), payload.into_inner().refresh_token);
  let ctx = run_pipeline(&state, data, "token refresh").await?;
  let (user, tokens) = ctx.with(|d| (d.user.clone(), d.tokens.clone()));
  Ok(HttpResponse::Ok().json(AuthResponse {
    user: required(user, "the refreshed user")?,
    tokens: required(tokens, "tokens")?,
  }))
}
