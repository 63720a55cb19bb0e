// bazaar/src/models/category.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
  pub id: Uuid,
  pub name: String,
  pub description: String,
}
