// bazaar/src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Employee,
  Customer,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Role::Admin => "admin",
      Role::Employee => "employee",
      Role::Customer => "customer",
    }
  }

  pub fn parse(token: &str) -> Option<Self> {
    match token.to_ascii_lowercase().as_str() {
      "admin" => Some(Role::Admin),
      "employee" => Some(Role::Employee),
      "customer" => Some(Role::Customer),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
  pub id: Uuid,
  pub name: String,
  pub email: String,
  #[serde(skip_serializing, default)]
  pub password_hash: String,
  pub role: Role,
  pub created_at: DateTime<Utc>,
}

/// What leaves the service layer for a user: everything but the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
  pub id: Uuid,
  pub name: String,
  pub email: String,
  pub role: Role,
  pub created_at: DateTime<Utc>,
}

impl From<User> for UserDto {
  fn from(user: User) -> Self {
    UserDto {
      id: user.id,
      name: user.name,
      email: user.email,
      role: user.role,
      created_at: user.created_at,
    }
  }
}
