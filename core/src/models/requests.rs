// bazaar/src/models/requests.rs

//! Payloads accepted by the services. Field rules are declared with `validator`
//! and checked by the service before anything touches the store.

use crate::models::order::OrderStatus;
use crate::models::product::UnitType;
use crate::models::user::Role;
use crate::models::decimal_places;
use crate::reports::ReportType;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
  if value.is_sign_negative() && !value.is_zero() {
    return Err(ValidationError::new("non_negative").with_message("must not be negative".into()));
  }
  Ok(())
}

/// Largest price a NUMERIC(12, 2) column holds.
pub const MAX_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);
/// Largest stock a NUMERIC(12, 3) column holds.
pub const MAX_STOCK: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 3);

fn fits(value: &Decimal, places: u32, max: Decimal) -> Result<(), ValidationError> {
  if decimal_places(*value) > places {
    return Err(
      ValidationError::new("precision").with_message(format!("at most {} decimal places are allowed", places).into()),
    );
  }
  if value.abs() > max {
    return Err(ValidationError::new("range").with_message(format!("must not exceed {}", max).into()));
  }
  Ok(())
}

fn valid_price(value: &Decimal) -> Result<(), ValidationError> {
  non_negative(value)?;
  fits(value, 2, MAX_PRICE)
}

fn valid_stock(value: &Decimal) -> Result<(), ValidationError> {
  non_negative(value)?;
  fits(value, 3, MAX_STOCK)
}

fn positive(value: &Decimal) -> Result<(), ValidationError> {
  if *value <= Decimal::ZERO {
    return Err(ValidationError::new("positive").with_message("must be greater than zero".into()));
  }
  Ok(())
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
  if value.trim().is_empty() {
    return Err(ValidationError::new("not_blank").with_message("must not be blank".into()));
  }
  Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CategoryPayload {
  /// Must match the path id when present on updates.
  pub id: Option<Uuid>,
  #[validate(length(max = 100), custom(function = "not_blank"))]
  pub name: String,
  #[validate(length(max = 500))]
  #[serde(default)]
  pub description: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductPayload {
  pub id: Option<Uuid>,
  #[validate(length(max = 150), custom(function = "not_blank"))]
  pub name: String,
  #[validate(length(max = 1000))]
  #[serde(default)]
  pub description: String,
  #[validate(custom(function = "valid_price"))]
  pub price: Decimal,
  pub unit_type: UnitType,
  #[validate(custom(function = "valid_stock"))]
  pub stock: Decimal,
  pub category_id: Uuid,
  #[validate(length(max = 500))]
  pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderLinePayload {
  pub product_id: Uuid,
  #[validate(custom(function = "positive"))]
  pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderPayload {
  pub user_id: Uuid,
  #[validate(length(min = 1, message = "an order needs at least one line"), nested)]
  pub lines: Vec<OrderLinePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderStatusPayload {
  pub status: OrderStatus,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserPayload {
  #[validate(length(max = 100), custom(function = "not_blank"))]
  pub name: String,
  #[validate(email)]
  pub email: String,
  #[validate(length(min = 8, message = "must be at least 8 characters long"))]
  pub password: String,
  pub role: Role,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterPayload {
  #[validate(length(max = 100), custom(function = "not_blank"))]
  pub name: String,
  #[validate(email)]
  pub email: String,
  #[validate(length(min = 8, message = "must be at least 8 characters long"))]
  pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginPayload {
  #[validate(email)]
  pub email: String,
  #[validate(length(min = 1))]
  pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserPayload {
  pub id: Option<Uuid>,
  #[validate(length(max = 100), custom(function = "not_blank"))]
  pub name: String,
  #[validate(email)]
  pub email: String,
  pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AffiliatePayload {
  pub id: Option<Uuid>,
  #[validate(length(max = 100), custom(function = "not_blank"))]
  pub name: String,
  #[validate(email)]
  pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AwardPointsPayload {
  pub delta: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItemPayload {
  pub product_id: Uuid,
  pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartAmountPayload {
  pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "range_is_ordered"))]
pub struct ReportRequestPayload {
  pub report_type: ReportType,
  pub from: NaiveDate,
  pub to: NaiveDate,
}

fn range_is_ordered(payload: &ReportRequestPayload) -> Result<(), ValidationError> {
  if payload.from > payload.to {
    return Err(ValidationError::new("date_range").with_message("'from' must not be after 'to'".into()));
  }
  Ok(())
}
