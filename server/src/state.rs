// bazaar_server/src/state.rs

use crate::auth::JwtService;
use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::pipelines;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use bazaar::{Services, Workflows};
use std::sync::Arc;

/// Shared with every handler through `web::Data`.
#[derive(Clone)]
pub struct AppState {
  pub services: Services,
  pub workflows: Arc<Workflows<ApiError>>,
  pub jwt: Arc<JwtService>,
  pub rate_limiter: Arc<RateLimiter>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Composes the state and registers the auth pipelines.
  pub fn new(config: AppConfig, services: Services) -> Self {
    let jwt = JwtService::new(&config.jwt_secret, config.jwt_access_minutes, config.jwt_refresh_days);
    let rate_limiter = RateLimiter::new(RateLimitConfig {
      capacity: config.rate_limit_capacity,
      refill: config.rate_limit_refill,
      period: config.rate_limit_period,
    });
    let workflows = Arc::new(Workflows::<ApiError>::new());
    pipelines::register_all_pipelines(&workflows);

    Self {
      services,
      workflows,
      jwt: Arc::new(jwt),
      rate_limiter: Arc::new(rate_limiter),
      config: Arc::new(config),
    }
  }
}
