// bazaar_server/src/pipelines/signup_pipeline.rs

use crate::errors::ApiError;
use crate::pipelines::common_steps::{issue_tokens, required};
use crate::pipelines::contexts::SignupCtxData;
use bazaar::{BazaarError, ContextData, Pipeline, PipelineControl, Workflows};
use tracing::{event, info, Level};
use validator::Validate;

/// Customer self-registration: validate, create the account, log the new user in.
pub fn register_signup_pipeline(workflows: &Workflows<ApiError>) {
  let mut signup = Pipeline::<SignupCtxData, ApiError>::new(&[
    ("validate_signup_input", false, None),
    ("create_customer", false, None),
    ("issue_signup_tokens", false, None),
  ]);

  signup.on_step("validate_signup_input", |ctx: ContextData<SignupCtxData>| async move {
    let checked = ctx.with(|data| data.payload.validate());
    checked.map_err(BazaarError::from)?;
    event!(Level::DEBUG, "Signup input is valid.");
    Ok::<_, ApiError>(PipelineControl::Continue)
  });

  signup.on_step("create_customer", |ctx: ContextData<SignupCtxData>| async move {
    let (services, payload) = ctx.with(|data| (data.app_state.services.clone(), data.payload.clone()));
    let user = services.users.register(payload).await?;
    info!(user_id = %user.id, "Customer account created.");
    ctx.write().user = Some(user);
    Ok::<_, ApiError>(PipelineControl::Continue)
  });

  signup.on_step("issue_signup_tokens", |ctx: ContextData<SignupCtxData>| async move {
    let mut data = ctx.write();
    let user = required(data.user.clone(), "the new user")?;
    data.tokens = Some(issue_tokens(&data.app_state.jwt, &user)?);
    Ok::<_, ApiError>(PipelineControl::Continue)
  });

  workflows.register_pipeline(signup);
  info!("Sign-up pipeline registered.");
}
