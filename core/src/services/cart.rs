// bazaar/src/services/cart.rs

//! Shopping-cart reads and mutations.
//!
//! Every mutation runs under the per-user [`CartLocks`](crate::services::CartLocks)
//! entry and inside one unit of work that row-locks the cart, recomputes the
//! denormalized totals and returns the refreshed aggregate.

use crate::error::{BazaarError, BazaarResult};
use crate::models::cart::compute_totals;
use crate::models::requests::MAX_STOCK;
use crate::models::{decimal_places, Product, ShoppingCart, ShoppingCartProduct, ShoppingCartProductInfo, UnitType};
use crate::services::ServiceContext;
use crate::storage::UnitOfWork;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Recomputes `total_value = round2(Σ price·amount)` and `products_count` over
/// all lines of the cart and stores them. Idempotent.
pub async fn update_total_value_and_product_count(
  uow: &mut dyn UnitOfWork,
  cart_id: Uuid,
) -> BazaarResult<(Decimal, i32)> {
  let lines = uow.carts().line_prices(cart_id).await?;
  let (total_value, products_count) = compute_totals(lines)?;
  uow.carts().save_totals(cart_id, total_value, products_count).await?;
  debug!(%cart_id, %total_value, products_count, "Cart totals recomputed.");
  Ok((total_value, products_count))
}

/// Amount rules shared by carts and orders.
pub(crate) fn validate_amount(product: &Product, amount: Decimal) -> BazaarResult<()> {
  if amount <= Decimal::ZERO {
    return Err(BazaarError::validation("amount: must be greater than zero"));
  }
  if decimal_places(amount) > 3 {
    return Err(BazaarError::validation("amount: at most 3 decimal places are allowed"));
  }
  if amount > MAX_STOCK {
    return Err(BazaarError::validation(format!("amount: must not exceed {}", MAX_STOCK)));
  }
  if product.unit_type == UnitType::Unit && !amount.fract().is_zero() {
    return Err(BazaarError::validation(format!(
      "amount: '{}' is sold per unit and needs a whole amount",
      product.name
    )));
  }
  Ok(())
}

pub(crate) fn ensure_stock(product: &Product, amount: Decimal) -> BazaarResult<()> {
  if amount > product.stock {
    return Err(BazaarError::DomainRule(format!(
      "insufficient stock for '{}': requested {}, available {}",
      product.name, amount, product.stock
    )));
  }
  Ok(())
}

#[derive(Clone)]
pub struct CartService {
  ctx: Arc<ServiceContext>,
}

impl CartService {
  pub fn new(ctx: Arc<ServiceContext>) -> Self {
    Self { ctx }
  }

  async fn load_product(uow: &mut dyn UnitOfWork, product_id: Uuid) -> BazaarResult<Product> {
    uow
      .products()
      .find_by_id(product_id)
      .await?
      .ok_or_else(|| BazaarError::not_found("product", product_id))
  }

  async fn locked_cart(uow: &mut dyn UnitOfWork, user_id: Uuid) -> BazaarResult<ShoppingCart> {
    uow
      .carts()
      .lock_by_user(user_id)
      .await?
      .ok_or_else(|| BazaarError::not_found("shopping cart", user_id))
  }

  async fn refreshed(uow: &mut dyn UnitOfWork, user_id: Uuid) -> BazaarResult<ShoppingCartProductInfo> {
    uow
      .carts()
      .get_cart_with_items(user_id)
      .await?
      .ok_or_else(|| BazaarError::not_found("shopping cart", user_id))
  }

  /// Recomputes totals, reads the aggregate back and commits.
  async fn finish(mut uow: Box<dyn UnitOfWork>, cart_id: Uuid, user_id: Uuid) -> BazaarResult<ShoppingCartProductInfo> {
    update_total_value_and_product_count(uow.as_mut(), cart_id).await?;
    let info = Self::refreshed(uow.as_mut(), user_id).await?;
    uow.commit_changes().await?;
    Ok(info)
  }

  #[instrument(name = "CartService::get_cart_with_items", skip(self), err(Display))]
  pub async fn get_cart_with_items(&self, user_id: Uuid) -> BazaarResult<ShoppingCartProductInfo> {
    let mut uow = self.ctx.begin().await?;
    Self::refreshed(uow.as_mut(), user_id).await
  }

  #[instrument(name = "CartService::get_cart_with_checked_items", skip(self), err(Display))]
  pub async fn get_cart_with_checked_items(&self, user_id: Uuid) -> BazaarResult<ShoppingCartProductInfo> {
    let mut uow = self.ctx.begin().await?;
    uow
      .carts()
      .get_cart_with_checked_items(user_id)
      .await?
      .ok_or_else(|| BazaarError::not_found("shopping cart", user_id))
  }

  #[instrument(name = "CartService::create_cart", skip(self), err(Display))]
  pub async fn create_cart(&self, user_id: Uuid) -> BazaarResult<ShoppingCartProductInfo> {
    let _guard = self.ctx.cart_locks.lock(user_id).await;
    let mut uow = self.ctx.begin().await?;
    if uow.users().find_by_id(user_id).await?.is_none() {
      return Err(BazaarError::not_found("user", user_id));
    }
    if uow.carts().lock_by_user(user_id).await?.is_some() {
      return Err(BazaarError::DuplicateData(format!("user {} already has a shopping cart", user_id)));
    }
    let cart = uow.carts().create(&ShoppingCart::new(user_id)).await?;
    info!(cart_id = %cart.id, "Shopping cart created.");
    Self::finish(uow, cart.id, user_id).await
  }

  /// Adds `amount` of a product, creating the cart when the user has none. An
  /// existing line is upserted to `old + amount`.
  #[instrument(name = "CartService::add_item", skip(self), err(Display))]
  pub async fn add_item(&self, user_id: Uuid, product_id: Uuid, amount: Decimal) -> BazaarResult<ShoppingCartProductInfo> {
    let _guard = self.ctx.cart_locks.lock(user_id).await;
    let mut uow = self.ctx.begin().await?;

    let product = Self::load_product(uow.as_mut(), product_id).await?;
    validate_amount(&product, amount)?;

    let cart = match uow.carts().lock_by_user(user_id).await? {
      Some(cart) => cart,
      None => {
        if uow.users().find_by_id(user_id).await?.is_none() {
          return Err(BazaarError::not_found("user", user_id));
        }
        let created = uow.carts().lock_or_create(user_id).await?;
        info!(cart_id = %created.id, "Shopping cart created on first add.");
        created
      }
    };

    let existing = uow.carts().find_line(cart.id, product_id).await?;
    let new_amount = match &existing {
      Some(line) => line
        .amount
        .checked_add(amount)
        .ok_or_else(|| BazaarError::validation("amount: out of range"))?,
      None => amount,
    };
    ensure_stock(&product, new_amount)?;

    uow
      .carts()
      .upsert_line(&ShoppingCartProduct {
        cart_id: cart.id,
        product_id,
        checked: existing.map_or(true, |line| line.checked),
        amount: new_amount,
      })
      .await?;
    Self::finish(uow, cart.id, user_id).await
  }

  /// Replaces the amount of an existing line.
  #[instrument(name = "CartService::set_item_amount", skip(self), err(Display))]
  pub async fn set_item_amount(
    &self,
    user_id: Uuid,
    product_id: Uuid,
    amount: Decimal,
  ) -> BazaarResult<ShoppingCartProductInfo> {
    let _guard = self.ctx.cart_locks.lock(user_id).await;
    let mut uow = self.ctx.begin().await?;
    let cart = Self::locked_cart(uow.as_mut(), user_id).await?;
    let line = uow
      .carts()
      .find_line(cart.id, product_id)
      .await?
      .ok_or_else(|| BazaarError::not_found("cart line", product_id))?;
    let product = Self::load_product(uow.as_mut(), product_id).await?;
    validate_amount(&product, amount)?;
    ensure_stock(&product, amount)?;
    uow
      .carts()
      .upsert_line(&ShoppingCartProduct { amount, ..line })
      .await?;
    Self::finish(uow, cart.id, user_id).await
  }

  #[instrument(name = "CartService::remove_item", skip(self), err(Display))]
  pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> BazaarResult<ShoppingCartProductInfo> {
    let _guard = self.ctx.cart_locks.lock(user_id).await;
    let mut uow = self.ctx.begin().await?;
    let cart = Self::locked_cart(uow.as_mut(), user_id).await?;
    if !uow.carts().delete_line(cart.id, product_id).await? {
      return Err(BazaarError::not_found("cart line", product_id));
    }
    Self::finish(uow, cart.id, user_id).await
  }

  /// Removes every line. An already empty cart is fine.
  #[instrument(name = "CartService::clear_cart", skip(self), err(Display))]
  pub async fn clear_cart(&self, user_id: Uuid) -> BazaarResult<ShoppingCartProductInfo> {
    let _guard = self.ctx.cart_locks.lock(user_id).await;
    let mut uow = self.ctx.begin().await?;
    let cart = Self::locked_cart(uow.as_mut(), user_id).await?;
    let removed = uow.carts().delete_lines(cart.id, false).await?;
    debug!(removed, "Cart cleared.");
    Self::finish(uow, cart.id, user_id).await
  }

  #[instrument(name = "CartService::remove_checked_items", skip(self), err(Display))]
  pub async fn remove_checked_items(&self, user_id: Uuid) -> BazaarResult<ShoppingCartProductInfo> {
    let _guard = self.ctx.cart_locks.lock(user_id).await;
    let mut uow = self.ctx.begin().await?;
    let cart = Self::locked_cart(uow.as_mut(), user_id).await?;
    let removed = uow.carts().delete_lines(cart.id, true).await?;
    debug!(removed, "Checked cart lines removed.");
    Self::finish(uow, cart.id, user_id).await
  }

  #[instrument(name = "CartService::check_item", skip(self), err(Display))]
  pub async fn check_item(&self, user_id: Uuid, product_id: Uuid) -> BazaarResult<ShoppingCartProductInfo> {
    self.set_checked(user_id, product_id, true).await
  }

  #[instrument(name = "CartService::uncheck_item", skip(self), err(Display))]
  pub async fn uncheck_item(&self, user_id: Uuid, product_id: Uuid) -> BazaarResult<ShoppingCartProductInfo> {
    self.set_checked(user_id, product_id, false).await
  }

  /// Flips the flag of one line. Totals stay untouched.
  async fn set_checked(&self, user_id: Uuid, product_id: Uuid, checked: bool) -> BazaarResult<ShoppingCartProductInfo> {
    let _guard = self.ctx.cart_locks.lock(user_id).await;
    let mut uow = self.ctx.begin().await?;
    let cart = Self::locked_cart(uow.as_mut(), user_id).await?;
    if !uow.carts().set_checked(cart.id, product_id, checked).await? {
      return Err(BazaarError::not_found("cart line", product_id));
    }
    let info = Self::refreshed(uow.as_mut(), user_id).await?;
    uow.commit_changes().await?;
    Ok(info)
  }

  /// Recomputes the stored totals of the user's cart.
  #[instrument(name = "CartService::recompute_totals", skip(self), err(Display))]
  pub async fn recompute_totals(&self, user_id: Uuid) -> BazaarResult<ShoppingCartProductInfo> {
    let _guard = self.ctx.cart_locks.lock(user_id).await;
    let mut uow = self.ctx.begin().await?;
    let cart = Self::locked_cart(uow.as_mut(), user_id).await?;
    Self::finish(uow, cart.id, user_id).await
  }
}
