// bazaar_server/src/errors.rs

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::http::{header, StatusCode};
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use bazaar::{BazaarError, WorkflowError};
use serde::Serialize;
use thiserror::Error;

const GENERIC_DETAIL: &str = "An internal error occurred.";

#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Domain(#[from] BazaarError),

  #[error("Authentication failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Too many requests, retry in {retry_after_secs}s")]
  RateLimited { retry_after_secs: u64 },

  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Workflow error: {source}")]
  Workflow {
    #[from]
    source: WorkflowError,
  },

  #[error("Internal server error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for ApiError {
  fn from(err: anyhow::Error) -> Self {
    let err = match err.downcast::<ApiError>() {
      Ok(api) => return api,
      Err(other) => other,
    };
    match err.downcast::<BazaarError>() {
      Ok(domain) => ApiError::Domain(domain),
      Err(other) => ApiError::Internal(other.to_string()),
    }
  }
}

/// RFC 7807 style body.
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
  #[serde(rename = "type")]
  pub problem_type: String,
  pub title: String,
  pub status: u16,
  pub code: &'static str,
  pub detail: String,
}

impl ApiError {
  pub fn code(&self) -> &'static str {
    match self {
      ApiError::Domain(e) => e.code(),
      ApiError::Auth(_) => "UNAUTHORIZED",
      ApiError::Forbidden(_) => "FORBIDDEN",
      ApiError::RateLimited { .. } => "RATE_LIMITED",
      ApiError::Config(_) | ApiError::Workflow { .. } | ApiError::Internal(_) => "INTERNAL_ERROR",
    }
  }

  fn detail(&self) -> String {
    if self.status_code().is_server_error() && !matches!(self, ApiError::Domain(BazaarError::Cancelled)) {
      return GENERIC_DETAIL.to_string();
    }
    match self {
      ApiError::Domain(BazaarError::Validation(messages)) => messages.join("; "),
      ApiError::Domain(BazaarError::IncorrectFormat(msg))
      | ApiError::Domain(BazaarError::DuplicateData(msg))
      | ApiError::Domain(BazaarError::DomainRule(msg))
      | ApiError::Domain(BazaarError::Unauthorized(msg))
      | ApiError::Auth(msg)
      | ApiError::Forbidden(msg) => msg.clone(),
      other => other.to_string(),
    }
  }

  pub fn problem(&self) -> ProblemDetails {
    let status = self.status_code();
    let code = self.code();
    ProblemDetails {
      problem_type: format!("/problems/{}", code.to_ascii_lowercase().replace('_', "-")),
      title: status.canonical_reason().unwrap_or("Error").to_string(),
      status: status.as_u16(),
      code,
      detail: self.detail(),
    }
  }
}

impl ResponseError for ApiError {
  fn status_code(&self) -> StatusCode {
    match self {
      ApiError::Domain(e) => StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
      ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
      ApiError::Config(_) | ApiError::Workflow { .. } | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with server error.");
    } else {
      tracing::warn!(code = self.code(), error = %self, "Responding with client error.");
    }
    let mut response = HttpResponse::build(status);
    response.insert_header((header::CONTENT_TYPE, "application/problem+json"));
    if let ApiError::RateLimited { retry_after_secs } = self {
      response.insert_header((header::RETRY_AFTER, retry_after_secs.to_string()));
    }
    response.json(self.problem())
  }
}

fn bad_request(detail: String) -> actix_web::Error {
  ApiError::Domain(BazaarError::IncorrectFormat(detail)).into()
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
  bad_request(format!("invalid JSON body: {}", err))
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
  bad_request(format!("invalid query string: {}", err))
}

pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
  bad_request(format!("invalid path parameter: {}", err))
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;
