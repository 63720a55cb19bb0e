// bazaar_server/src/pipelines/refresh_pipeline.rs

use crate::auth::TokenType;
use crate::errors::ApiError;
use crate::pipelines::common_steps::{issue_tokens, required};
use crate::pipelines::contexts::RefreshCtxData;
use bazaar::{ContextData, Pipeline, PipelineControl, Workflows};
use tracing::{info, warn};

/// Trades a refresh token for a new pair. The role is re-read from the store so
/// role changes take effect on the next refresh.
pub fn register_refresh_pipeline(workflows: &Workflows<ApiError>) {
  let mut refresh = Pipeline::<RefreshCtxData, ApiError>::new(&[
    ("verify_refresh_token", false, None),
    ("reload_user", false, None),
    ("issue_refreshed_tokens", false, None),
  ]);

  refresh.on_step("verify_refresh_token", |ctx: ContextData<RefreshCtxData>| async move {
    let mut data = ctx.write();
    let claims = data
      .app_state
      .jwt
      .validate(&data.refresh_token, TokenType::Refresh)
      .map_err(|e| {
        warn!(error = %e, "Refresh token rejected.");
        ApiError::Auth("invalid refresh token".to_string())
      })?;
    data.claims = Some(claims);
    Ok::<_, ApiError>(PipelineControl::Continue)
  });

  refresh.on_step("reload_user", |ctx: ContextData<RefreshCtxData>| async move {
    let (services, claims) = ctx.with(|data| (data.app_state.services.clone(), data.claims.clone()));
    let claims = required(claims, "refresh claims")?;
    let user = services
      .users
      .find(claims.sub)
      .await?
      .ok_or_else(|| ApiError::Auth("account no longer exists".to_string()))?;
    info!(user_id = %user.id, "Refreshing tokens.");
    ctx.write().user = Some(user.into());
    Ok::<_, ApiError>(PipelineControl::Continue)
  });

  refresh.on_step("issue_refreshed_tokens", |ctx: ContextData<RefreshCtxData>| async move {
    let mut data = ctx.write();
    let user = required(data.user.clone(), "the refreshed user")?;
    data.tokens = Some(issue_tokens(&data.app_state.jwt, &user)?);
    Ok::<_, ApiError>(PipelineControl::Continue)
  });

  workflows.register_pipeline(refresh);
  info!("Token refresh pipeline registered.");
}
