// bazaar/src/models/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Processing,
  Finished,
  Cancelled,
}

impl OrderStatus {
  /// Finished and cancelled orders accept no further changes.
  pub fn is_terminal(self) -> bool {
    matches!(self, OrderStatus::Finished | OrderStatus::Cancelled)
  }

  pub fn can_transition_to(self, next: OrderStatus) -> bool {
    matches!(
      (self, next),
      (OrderStatus::Pending, OrderStatus::Processing)
        | (OrderStatus::Processing, OrderStatus::Finished)
        | (OrderStatus::Pending, OrderStatus::Cancelled)
        | (OrderStatus::Processing, OrderStatus::Cancelled)
    )
  }

  pub fn parse(token: &str) -> Option<Self> {
    match token.to_ascii_lowercase().as_str() {
      "pending" => Some(OrderStatus::Pending),
      "processing" => Some(OrderStatus::Processing),
      "finished" => Some(OrderStatus::Finished),
      "cancelled" => Some(OrderStatus::Cancelled),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
  pub id: Uuid,
  pub user_id: Uuid,
  pub created_at: DateTime<Utc>,
  pub status: OrderStatus,
  pub total_value: Decimal,
  #[sqlx(skip)]
  #[serde(default)]
  pub lines: Vec<LineItem>,
}

/// One product of an order with the unit price it was sold at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LineItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub amount: Decimal,
  pub unit_price: Decimal,
}
