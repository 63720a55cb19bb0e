// bazaar_server/src/auth/extractor.rs

//! Bearer-token extractors. `CurrentUser` only authenticates; `Authorized<P>`
//! also enforces a role policy.

use crate::auth::jwt::{JwtError, JwtService, TokenType};
use crate::errors::ApiError;
use crate::state::AppState;
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpMessage, HttpRequest};
use bazaar::models::Role;
use futures_util::future::{ready, Ready};
use std::marker::PhantomData;
use std::ops::Deref;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
  pub id: Uuid,
  pub email: String,
  pub role: Role,
}

fn authenticate(req: &HttpRequest) -> Result<CurrentUser, ApiError> {
  if let Some(user) = req.extensions().get::<CurrentUser>() {
    return Ok(user.clone());
  }
  let state = req
    .app_data::<web::Data<AppState>>()
    .ok_or_else(|| ApiError::Internal("application state is not configured".to_string()))?;

  let token = req
    .headers()
    .get(header::AUTHORIZATION)
    .and_then(|h| h.to_str().ok())
    .ok_or_else(|| ApiError::Auth("missing bearer token".to_string()))
    .and_then(|h| JwtService::extract_from_header(h).ok_or_else(|| ApiError::Auth("malformed authorization header".to_string())))?;

  let claims = state.jwt.validate(token, TokenType::Access).map_err(|e| {
    warn!(error = %e, path = %req.path(), "Rejected bearer token.");
    match e {
      JwtError::ExpiredToken => ApiError::Auth("token has expired".to_string()),
      _ => ApiError::Auth("invalid token".to_string()),
    }
  })?;

  let user = CurrentUser {
    id: claims.sub,
    email: claims.email,
    role: claims.role,
  };
  req.extensions_mut().insert(user.clone());
  Ok(user)
}

impl FromRequest for CurrentUser {
  type Error = ApiError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(authenticate(req))
  }
}

/// Which roles may call a route.
pub trait Policy {
  const DESCRIPTION: &'static str;

  fn allows(role: Role) -> bool;
}

pub struct AdminOnly;

impl Policy for AdminOnly {
  const DESCRIPTION: &'static str = "administrators";

  fn allows(role: Role) -> bool {
    role == Role::Admin
  }
}

/// Employees, and admins who pass every employee check.
pub struct StaffOnly;

impl Policy for StaffOnly {
  const DESCRIPTION: &'static str = "employees";

  fn allows(role: Role) -> bool {
    matches!(role, Role::Employee | Role::Admin)
  }
}

pub struct CustomerOnly;

impl Policy for CustomerOnly {
  const DESCRIPTION: &'static str = "customers";

  fn allows(role: Role) -> bool {
    role == Role::Customer
  }
}

pub struct Authorized<P: Policy> {
  pub user: CurrentUser,
  _policy: PhantomData<P>,
}

impl<P: Policy> Deref for Authorized<P> {
  type Target = CurrentUser;

  fn deref(&self) -> &CurrentUser {
    &self.user
  }
}

impl<P: Policy> FromRequest for Authorized<P> {
  type Error = ApiError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let result = authenticate(req).and_then(|user| {
      if P::allows(user.role) {
        Ok(Authorized {
          user,
          _policy: PhantomData,
        })
      } else {
        warn!(user_id = %user.id, role = user.role.as_str(), path = %req.path(), "Role not allowed on route.");
        Err(ApiError::Forbidden(format!("only {} may do this", P::DESCRIPTION)))
      }
    });
    ready(result)
  }
}

pub type Admin = Authorized<AdminOnly>;
pub type Staff = Authorized<StaffOnly>;
pub type Customer = Authorized<CustomerOnly>;
