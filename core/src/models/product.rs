// bazaar/src/models/product.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How a product is sold. `Unit` products only accept whole amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "unit_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
  Unit,
  Kilogram,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
  pub id: Uuid,
  pub name: String,
  pub description: String,
  pub price: Decimal,
  pub unit_type: UnitType,
  pub stock: Decimal,
  pub category_id: Uuid,
  pub image_url: Option<String>,
}
