// bazaar/src/error.rs

use crate::workflow::WorkflowError;
use thiserror::Error;

/// The single domain error of the crate. Every service operation returns it.
#[derive(Debug, Error)]
pub enum BazaarError {
  #[error("{entity} with id {id} was not found")]
  NotFound { entity: &'static str, id: String },

  #[error("Incorrect format: {0}")]
  IncorrectFormat(String),

  #[error("Validation failed: {}", .0.join("; "))]
  Validation(Vec<String>),

  #[error("Duplicate data: {0}")]
  DuplicateData(String),

  #[error("{0}")]
  DomainRule(String),

  #[error("Unknown strategy: {0}")]
  UnknownStrategy(String),

  #[error("Unauthorized: {0}")]
  Unauthorized(String),

  #[error("Operation was cancelled")]
  Cancelled,

  #[error("Storage error: {0}")]
  Storage(sqlx::Error),

  #[error("Workflow error: {source}")]
  Workflow {
    #[from]
    source: WorkflowError,
  },

  #[error("Infrastructure error: {0}")]
  Infrastructure(String),
}

impl BazaarError {
  pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
    BazaarError::NotFound {
      entity,
      id: id.to_string(),
    }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    BazaarError::Validation(vec![message.into()])
  }

  /// Stable machine-readable code carried in problem-details bodies.
  pub fn code(&self) -> &'static str {
    match self {
      BazaarError::NotFound { .. } => "NOT_FOUND",
      BazaarError::IncorrectFormat(_) => "INCORRECT_FORMAT",
      BazaarError::Validation(_) => "VALIDATION_FAILED",
      BazaarError::DuplicateData(_) => "DUPLICATE_DATA",
      BazaarError::DomainRule(_) => "DOMAIN_RULE",
      BazaarError::UnknownStrategy(_) => "UNKNOWN_STRATEGY",
      BazaarError::Unauthorized(_) => "UNAUTHORIZED",
      BazaarError::Cancelled => "CANCELLED",
      BazaarError::Storage(_) | BazaarError::Workflow { .. } | BazaarError::Infrastructure(_) => "INTERNAL_ERROR",
    }
  }

  pub fn status_code(&self) -> u16 {
    match self {
      BazaarError::NotFound { .. } => 404,
      BazaarError::IncorrectFormat(_) | BazaarError::Validation(_) | BazaarError::UnknownStrategy(_) => 400,
      BazaarError::DuplicateData(_) => 409,
      BazaarError::DomainRule(_) => 422,
      BazaarError::Unauthorized(_) => 401,
      BazaarError::Cancelled => 503,
      BazaarError::Storage(_) | BazaarError::Workflow { .. } | BazaarError::Infrastructure(_) => 500,
    }
  }

  pub fn is_internal(&self) -> bool {
    self.status_code() >= 500 && !matches!(self, BazaarError::Cancelled)
  }
}

impl From<sqlx::Error> for BazaarError {
  fn from(err: sqlx::Error) -> Self {
    if let sqlx::Error::Database(db_err) = &err {
      match db_err.kind() {
        sqlx::error::ErrorKind::UniqueViolation => {
          return BazaarError::DuplicateData(db_err.constraint().unwrap_or("unique constraint").to_string());
        }
        sqlx::error::ErrorKind::ForeignKeyViolation => {
          return BazaarError::DomainRule(format!(
            "referenced record is missing or still in use ({})",
            db_err.constraint().unwrap_or("foreign key")
          ));
        }
        sqlx::error::ErrorKind::CheckViolation => {
          return BazaarError::Validation(vec![db_err.message().to_string()]);
        }
        _ => {}
      }
    }
    BazaarError::Storage(err)
  }
}

impl From<validator::ValidationErrors> for BazaarError {
  fn from(errors: validator::ValidationErrors) -> Self {
    let mut messages: Vec<String> = errors
      .field_errors()
      .iter()
      .flat_map(|(field, errs)| {
        errs.iter().map(move |e| match &e.message {
          Some(message) => format!("{}: {}", field, message),
          None => format!("{}: {}", field, e.code),
        })
      })
      .collect();
    messages.sort();
    BazaarError::Validation(messages)
  }
}

impl From<anyhow::Error> for BazaarError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<BazaarError>() {
      Ok(domain) => domain,
      Err(other) => BazaarError::Infrastructure(other.to_string()),
    }
  }
}

pub type BazaarResult<T, E = BazaarError> = std::result::Result<T, E>;
