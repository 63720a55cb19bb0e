// bazaar_server/src/pipelines/common_steps.rs

use crate::auth::{JwtService, TokenPair};
use crate::errors::ApiError;
use bazaar::models::UserDto;
use tracing::{info, instrument};

/// Mints the access/refresh pair every auth pipeline ends with.
#[instrument(name = "common_step::issue_tokens", skip(jwt, user), fields(user_id = %user.id, role = user.role.as_str()), err(Display))]
pub fn issue_tokens(jwt: &JwtService, user: &UserDto) -> Result<TokenPair, ApiError> {
  let pair = jwt
    .issue_pair(user)
    .map_err(|e| ApiError::Internal(format!("could not issue tokens: {}", e)))?;
  info!("Token pair issued.");
  Ok(pair)
}

/// Reads a value a previous step should have stored, or fails the pipeline.
pub fn required<T>(value: Option<T>, what: &str) -> Result<T, ApiError> {
  value.ok_or_else(|| ApiError::Internal(format!("pipeline step did not produce {}", what)))
}
