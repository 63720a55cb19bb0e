// bazaar_server/src/pipelines/contexts.rs

//! Working data of the auth pipelines. Handlers receive these wrapped in `ContextData`.

use crate::auth::{Claims, TokenPair};
use crate::state::AppState;
use bazaar::models::requests::{LoginPayload, RegisterPayload};
use bazaar::models::UserDto;

pub struct SignupCtxData {
  pub app_state: AppState,
  pub payload: RegisterPayload,
  pub user: Option<UserDto>,
  pub tokens: Option<TokenPair>,
}

impl SignupCtxData {
  pub fn new(app_state: AppState, payload: RegisterPayload) -> Self {
    Self {
      app_state,
      payload,
      user: None,
      tokens: None,
    }
  }
}

pub struct SigninCtxData {
  pub app_state: AppState,
  pub payload: LoginPayload,
  pub user: Option<UserDto>,
  pub tokens: Option<TokenPair>,
}

impl SigninCtxData {
  pub fn new(app_state: AppState, payload: LoginPayload) -> Self {
    Self {
      app_state,
      payload,
      user: None,
      tokens: None,
    }
  }
}

pub struct RefreshCtxData {
  pub app_state: AppState,
  pub refresh_token: String,
  pub claims: Option<Claims>,
  pub user: Option<UserDto>,
  pub tokens: Option<TokenPair>,
}

impl RefreshCtxData {
  pub fn new(app_state: AppState, refresh_token: String) -> Self {
    Self {
      app_state,
      refresh_token,
      claims: None,
      user: None,
      tokens: None,
    }
  }
}
