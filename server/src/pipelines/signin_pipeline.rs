// bazaar_server/src/pipelines/signin_pipeline.rs

use crate::errors::ApiError;
use crate::pipelines::common_steps::{issue_tokens, required};
use crate::pipelines::contexts::SigninCtxData;
use bazaar::{BazaarError, ContextData, Pipeline, PipelineControl, Workflows};
use tracing::{event, info, Level};
use validator::Validate;

pub fn register_signin_pipeline(workflows: &Workflows<ApiError>) {
  let mut signin = Pipeline::<SigninCtxData, ApiError>::new(&[
    ("validate_signin_input", false, None),
    ("verify_credentials", false, None),
    ("issue_signin_tokens", false, None),
  ]);

  signin.on_step("validate_signin_input", |ctx: ContextData<SigninCtxData>| async move {
    let checked = ctx.with(|data| data.payload.validate());
    checked.map_err(BazaarError::from)?;
    Ok::<_, ApiError>(PipelineControl::Continue)
  });

  signin.on_step("verify_credentials", |ctx: ContextData<SigninCtxData>| async move {
    let (services, email, password) = ctx.with(|data| {
      (
        data.app_state.services.clone(),
        data.payload.email.clone(),
        data.payload.password.clone(),
      )
    });
    event!(Level::DEBUG, "Verifying credentials.");
    let user = services.users.authenticate(&email, &password).await?;
    info!(user_id = %user.id, "Credentials verified.");
    ctx.write().user = Some(user);
    Ok::<_, ApiError>(PipelineControl::Continue)
  });

  signin.on_step("issue_signin_tokens", |ctx: ContextData<SigninCtxData>| async move {
    let mut data = ctx.write();
    let user = required(data.user.clone(), "the authenticated user")?;
    data.tokens = Some(issue_tokens(&data.app_state.jwt, &user)?);
    Ok::<_, ApiError>(PipelineControl::Continue)
  });

  workflows.register_pipeline(signin);
  info!("Sign-in pipeline registered.");
}
