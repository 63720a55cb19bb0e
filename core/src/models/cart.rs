// bazaar/src/models/cart.rs

use crate::error::{BazaarError, BazaarResult};
use crate::models::product::{Product, UnitType};
use crate::models::round2;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user's cart. `total_value` and `products_count` are kept in sync with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ShoppingCart {
  pub id: Uuid,
  pub user_id: Uuid,
  pub total_value: Decimal,
  pub products_count: i32,
}

impl ShoppingCart {
  pub fn new(user_id: Uuid) -> Self {
    ShoppingCart {
      id: Uuid::new_v4(),
      user_id,
      total_value: Decimal::ZERO,
      products_count: 0,
    }
  }
}

/// One cart line. Unique per (cart_id, product_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ShoppingCartProduct {
  pub cart_id: Uuid,
  pub product_id: Uuid,
  pub checked: bool,
  pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartEntry {
  pub product: Product,
  pub checked: bool,
  pub amount: Decimal,
}

/// Read model of a cart together with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingCartProductInfo {
  pub cart: ShoppingCart,
  pub products: Vec<CartEntry>,
}

impl ShoppingCartProductInfo {
  pub fn entry(&self, product_id: Uuid) -> Option<&CartEntry> {
    self.products.iter().find(|e| e.product.id == product_id)
  }
}

/// One flat row of the cart → lines → products left join. Line and product
/// columns are empty for a cart that has no (matching) lines.
#[derive(Debug, Clone, FromRow)]
pub struct CartRow {
  pub cart_id: Uuid,
  pub user_id: Uuid,
  pub total_value: Decimal,
  pub products_count: i32,
  pub checked: Option<bool>,
  pub amount: Option<Decimal>,
  pub product_id: Option<Uuid>,
  pub product_name: Option<String>,
  pub product_description: Option<String>,
  pub product_price: Option<Decimal>,
  pub product_unit_type: Option<UnitType>,
  pub product_stock: Option<Decimal>,
  pub product_category_id: Option<Uuid>,
  pub product_image_url: Option<String>,
}

impl CartRow {
  fn into_entry(self) -> Option<CartEntry> {
    let product = Product {
      id: self.product_id?,
      name: self.product_name?,
      description: self.product_description.unwrap_or_default(),
      price: self.product_price?,
      unit_type: self.product_unit_type?,
      stock: self.product_stock?,
      category_id: self.product_category_id?,
      image_url: self.product_image_url,
    };
    Some(CartEntry {
      product,
      checked: self.checked.unwrap_or(true),
      amount: self.amount?,
    })
  }
}

/// Folds the flat join rows of one user into the cart read model.
///
/// Cart fields come from the first row. Every row carrying a product becomes one
/// entry, ordered by product name then id. No rows means there is no cart.
pub fn assemble_cart_info(rows: Vec<CartRow>) -> Option<ShoppingCartProductInfo> {
  let first = rows.first()?;
  let cart = ShoppingCart {
    id: first.cart_id,
    user_id: first.user_id,
    total_value: first.total_value,
    products_count: first.products_count,
  };
  let cart_id = cart.id;
  let mut products: Vec<CartEntry> = rows
    .into_iter()
    .filter(|row| row.cart_id == cart_id)
    .filter_map(CartRow::into_entry)
    .collect();
  sort_entries(&mut products);
  Some(ShoppingCartProductInfo { cart, products })
}

pub fn sort_entries(entries: &mut [CartEntry]) {
  entries.sort_by(|a, b| a.product.name.cmp(&b.product.name).then(a.product.id.cmp(&b.product.id)));
}

/// `(round2(Σ price·amount), number of lines)` over the given (price, amount) pairs.
/// A sum that leaves the `Decimal` range is a validation error.
pub fn compute_totals<I>(lines: I) -> BazaarResult<(Decimal, i32)>
where
  I: IntoIterator<Item = (Decimal, Decimal)>,
{
  let mut sum = Decimal::ZERO;
  let mut count = 0i32;
  for (price, amount) in lines {
    sum = line_value(price, amount)
      .and_then(|value| sum.checked_add(value))
      .ok_or_else(|| BazaarError::validation("total value is out of range"))?;
    count += 1;
  }
  Ok((round2(sum), count))
}

/// `price · amount`, or `None` on overflow.
pub fn line_value(price: Decimal, amount: Decimal) -> Option<Decimal> {
  price.checked_mul(amount)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn totals_round_half_away_from_zero() {
    let lines = [
      (Decimal::new(1890, 2), Decimal::new(333, 3)),
      (Decimal::new(115, 2), Decimal::TWO),
    ];
    let (total, count) = compute_totals(lines).unwrap();
    // 6.2937 + 2.30
    assert_eq!(total, Decimal::new(859, 2));
    assert_eq!(count, 2);
  }

  #[test]
  fn overflowing_totals_are_an_error() {
    let overflow = compute_totals([(Decimal::MAX, Decimal::TWO)]);
    assert!(matches!(overflow, Err(BazaarError::Validation(_))));
    let overflow = compute_totals([(Decimal::MAX, Decimal::ONE), (Decimal::MAX, Decimal::ONE)]);
    assert!(matches!(overflow, Err(BazaarError::Validation(_))));
    assert_eq!(compute_totals(Vec::<(Decimal, Decimal)>::new()).unwrap(), (Decimal::ZERO, 0));
  }
}
