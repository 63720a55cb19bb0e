// bazaar_server/src/pipelines/mod.rs

//! Auth workflows run through the pipeline engine.

use crate::errors::ApiError;
use bazaar::Workflows;

pub mod common_steps;
pub mod contexts;

pub mod refresh_pipeline;
pub mod signin_pipeline;
pub mod signup_pipeline;

/// Called once at startup.
pub fn register_all_pipelines(workflows: &Workflows<ApiError>) {
  signup_pipeline::register_signup_pipeline(workflows);
  signin_pipeline::register_signin_pipeline(workflows);
  refresh_pipeline::register_refresh_pipeline(workflows);
  tracing::info!("All auth pipelines registered.");
}
