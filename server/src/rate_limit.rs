// bazaar_server/src/rate_limit.rs

//! Token bucket per client identity, applied to the public auth routes.

use crate::auth::{JwtService, TokenType};
use crate::errors::ApiError;
use crate::state::AppState;
use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::web;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
  pub capacity: u32,
  /// Tokens added every `period`.
  pub refill: u32,
  pub period: Duration,
}

#[derive(Debug)]
struct Bucket {
  tokens: u32,
  last_refill: Instant,
}

pub struct RateLimiter {
  buckets: DashMap<String, Bucket>,
  config: RateLimitConfig,
}

impl RateLimiter {
  pub fn new(config: RateLimitConfig) -> Self {
    Self {
      buckets: DashMap::new(),
      config,
    }
  }

  /// Whole periods elapsed since the last refill, and the token count they bring the bucket to.
  fn refilled(&self, bucket: &Bucket, now: Instant) -> (u32, u32) {
    let RateLimitConfig {
      capacity,
      refill,
      period,
    } = self.config;
    let elapsed = now.duration_since(bucket.last_refill);
    let periods = u32::try_from(elapsed.as_nanos() / period.as_nanos().max(1)).unwrap_or(u32::MAX);
    let tokens = bucket.tokens.saturating_add(periods.saturating_mul(refill)).min(capacity);
    (periods, tokens)
  }

  /// Takes one token for `key`. On exhaustion returns how long until the next refill.
  pub fn try_acquire(&self, key: &str) -> Result<(), Duration> {
    let now = Instant::now();
    let capacity = self.config.capacity;
    let period = self.config.period;
    let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
      tokens: capacity,
      last_refill: now,
    });

    let (periods, tokens) = self.refilled(&bucket, now);
    if periods > 0 {
      bucket.tokens = tokens;
      bucket.last_refill = if tokens == capacity {
        now
      } else {
        bucket.last_refill + period * periods
      };
    }

    if bucket.tokens > 0 {
      bucket.tokens -= 1;
      Ok(())
    } else {
      Err(period.saturating_sub(now.duration_since(bucket.last_refill)))
    }
  }

  /// Drops buckets untouched for longer than `idle` that would be full by now.
  pub fn purge_idle(&self, idle: Duration) {
    let now = Instant::now();
    let capacity = self.config.capacity;
    self.buckets.retain(|_, bucket| {
      let (_, tokens) = self.refilled(bucket, now);
      !(tokens == capacity && now.duration_since(bucket.last_refill) > idle)
    });
  }

  pub fn tracked_clients(&self) -> usize {
    self.buckets.len()
  }
}

/// Subject of a valid access token when one is sent, otherwise the peer IP.
fn client_key(req: &ServiceRequest, jwt: &JwtService) -> String {
  let subject = req
    .headers()
    .get(header::AUTHORIZATION)
    .and_then(|h| h.to_str().ok())
    .and_then(JwtService::extract_from_header)
    .and_then(|token| jwt.validate(token, TokenType::Access).ok())
    .map(|claims| format!("user:{}", claims.sub));
  subject.unwrap_or_else(|| {
    let ip = req
      .peer_addr()
      .map(|addr| addr.ip().to_string())
      .unwrap_or_else(|| "unknown".to_string());
    format!("ip:{}", ip)
  })
}

/// Rejected requests are answered here with a 429 problem response; the rest
/// continue down the chain.
pub async fn rate_limit<B: MessageBody>(
  req: ServiceRequest,
  next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, actix_web::Error> {
  let state = req
    .app_data::<web::Data<AppState>>()
    .cloned()
    .ok_or_else(|| ApiError::Internal("application state is not configured".to_string()))?;
  let key = client_key(&req, &state.jwt);
  if let Err(wait) = state.rate_limiter.try_acquire(&key) {
    warn!(client = %key, path = %req.path(), "Rate limit exceeded.");
    let rejected = ApiError::RateLimited {
      retry_after_secs: wait.as_secs().max(1),
    };
    return Ok(req.error_response(rejected).map_into_right_body());
  }
  debug!(client = %key, "Rate limit token taken.");
  Ok(next.call(req).await?.map_into_left_body())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn limiter() -> RateLimiter {
    RateLimiter::new(RateLimitConfig {
      capacity: 3,
      refill: 2,
      period: Duration::from_secs(5),
    })
  }

  #[tokio::test(start_paused = true)]
  async fn three_pass_then_two_more_after_a_period() {
    let limiter = limiter();
    for _ in 0..3 {
      assert!(limiter.try_acquire("ip:10.0.0.1").is_ok());
    }
    let wait = limiter.try_acquire("ip:10.0.0.1").unwrap_err();
    assert_eq!(wait, Duration::from_secs(5));

    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(limiter.try_acquire("ip:10.0.0.1").is_ok());
    assert!(limiter.try_acquire("ip:10.0.0.1").is_ok());
    assert!(limiter.try_acquire("ip:10.0.0.1").is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn clients_have_separate_buckets() {
    let limiter = limiter();
    for _ in 0..3 {
      limiter.try_acquire("user:a").unwrap();
    }
    assert!(limiter.try_acquire("user:a").is_err());
    assert!(limiter.try_acquire("user:b").is_ok());
    assert_eq!(limiter.tracked_clients(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn refill_never_exceeds_capacity() {
    let limiter = limiter();
    limiter.try_acquire("ip:10.0.0.2").unwrap();
    tokio::time::advance(Duration::from_secs(60)).await;
    for _ in 0..3 {
      limiter.try_acquire("ip:10.0.0.2").unwrap();
    }
    assert!(limiter.try_acquire("ip:10.0.0.2").is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn idle_buckets_are_purged() {
    let limiter = limiter();
    limiter.try_acquire("ip:idle").unwrap();
    tokio::time::advance(Duration::from_secs(400)).await;
    limiter.try_acquire("ip:busy").unwrap();
    limiter.purge_idle(Duration::from_secs(300));
    assert_eq!(limiter.tracked_clients(), 1);
    assert!(limiter.try_acquire("ip:busy").is_ok());
  }
}
