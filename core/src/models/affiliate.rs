// bazaar/src/models/affiliate.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Affiliate {
  pub id: Uuid,
  pub name: String,
  pub email: String,
  pub points: i64,
  pub joined_at: DateTime<Utc>,
}
