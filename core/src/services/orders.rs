// bazaar/src/services/orders.rs

use crate::cache::{cached, item_key};
use crate::error::{BazaarError, BazaarResult};
use crate::filters::{ListQuery, Page};
use crate::models::requests::{CreateOrderPayload, OrderLinePayload};
use crate::models::cart::compute_totals;
use crate::models::{round2, LineItem, Order, OrderStatus, Product};
use crate::reports::{OrderReportData, OrderSummary};
use crate::services::cart::{ensure_stock, update_total_value_and_product_count, validate_amount};
use crate::services::catalog::PRODUCTS;
use crate::services::{day_range, ServiceContext};
use crate::storage::UnitOfWork;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

pub const ORDERS: &str = "orders";

#[derive(Clone)]
pub struct OrderService {
  ctx: Arc<ServiceContext>,
}

/// Merges lines of the same product, keeping first-seen order.
fn merge_lines(lines: &[OrderLinePayload]) -> BazaarResult<Vec<(Uuid, Decimal)>> {
  let mut merged: Vec<(Uuid, Decimal)> = Vec::with_capacity(lines.len());
  for line in lines {
    match merged.iter_mut().find(|(id, _)| *id == line.product_id) {
      Some((_, amount)) => {
        *amount = amount
          .checked_add(line.amount)
          .ok_or_else(|| BazaarError::validation("amount: out of range"))?;
      }
      None => merged.push((line.product_id, line.amount)),
    }
  }
  Ok(merged)
}

/// Locks the products, checks amount and stock rules, decrements stock and
/// stores a pending order for `user_id`.
async fn place_order(uow: &mut dyn UnitOfWork, user_id: Uuid, wanted: &[(Uuid, Decimal)]) -> BazaarResult<Order> {
  let ids: Vec<Uuid> = wanted.iter().map(|(id, _)| *id).collect();
  let products: HashMap<Uuid, Product> = uow
    .products()
    .find_for_update(&ids)
    .await?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

  let order_id = Uuid::new_v4();
  let mut lines = Vec::with_capacity(wanted.len());
  for (product_id, amount) in wanted {
    let product = products
      .get(product_id)
      .ok_or_else(|| BazaarError::not_found("product", product_id))?;
    validate_amount(product, *amount)?;
    ensure_stock(product, *amount)?;
    lines.push(LineItem {
      id: Uuid::new_v4(),
      order_id,
      product_id: *product_id,
      amount: *amount,
      unit_price: product.price,
    });
  }

  for line in &lines {
    if let Some(product) = products.get(&line.product_id) {
      uow.products().set_stock(product.id, product.stock - line.amount).await?;
    }
  }

  let (total_value, _) = compute_totals(lines.iter().map(|l| (l.unit_price, l.amount)))?;
  uow
    .orders()
    .create(&Order {
      id: order_id,
      user_id,
      created_at: Utc::now(),
      status: OrderStatus::Pending,
      total_value,
      lines,
    })
    .await
}

/// Puts the amounts of a pending or processing order back on the shelf.
async fn restore_stock(uow: &mut dyn UnitOfWork, order: &Order) -> BazaarResult<()> {
  let ids: Vec<Uuid> = order.lines.iter().map(|l| l.product_id).collect();
  let products: HashMap<Uuid, Product> = uow
    .products()
    .find_for_update(&ids)
    .await?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();
  for line in &order.lines {
    match products.get(&line.product_id) {
      Some(product) => uow.products().set_stock(product.id, product.stock + line.amount).await?,
      None => warn!(product_id = %line.product_id, "Product of order line is gone, stock not restored."),
    }
  }
  Ok(())
}

impl OrderService {
  pub fn new(ctx: Arc<ServiceContext>) -> Self {
    Self { ctx }
  }

  async fn load_all(&self) -> BazaarResult<Vec<Order>> {
    let mut uow = self.ctx.begin().await?;
    uow.orders().get_all().await
  }

  #[instrument(name = "OrderService::list", skip(self), err(Display))]
  pub async fn list(&self, query: &ListQuery) -> BazaarResult<Page<Order>> {
    self.ctx.list(ORDERS, query, || self.load_all()).await
  }

  #[instrument(name = "OrderService::get", skip(self), err(Display))]
  pub async fn get(&self, id: Uuid) -> BazaarResult<Order> {
    cached(self.ctx.cache.as_ref(), &item_key(ORDERS, id), || async {
      let mut uow = self.ctx.begin().await?;
      uow
        .orders()
        .find_by_id(id)
        .await?
        .ok_or_else(|| BazaarError::not_found("order", id))
    })
    .await
  }

  #[instrument(name = "OrderService::create_order", skip(self, payload), fields(user_id = %payload.user_id), err(Display))]
  pub async fn create_order(&self, payload: CreateOrderPayload) -> BazaarResult<Order> {
    payload.validate()?;
    let mut uow = self.ctx.begin().await?;
    if uow.users().find_by_id(payload.user_id).await?.is_none() {
      return Err(BazaarError::not_found("user", payload.user_id));
    }
    let order = place_order(uow.as_mut(), payload.user_id, &merge_lines(&payload.lines)?).await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[ORDERS, PRODUCTS]).await;
    info!(order_id = %order.id, total = %order.total_value, "Order created.");
    Ok(order)
  }

  /// Turns the checked lines of the user's cart into a pending order.
  ///
  /// Stock is decremented, the checked lines leave the cart and the cart totals
  /// are recomputed, all in one unit of work under the cart lock.
  #[instrument(name = "OrderService::checkout", skip(self), err(Display))]
  pub async fn checkout(&self, user_id: Uuid) -> BazaarResult<Order> {
    let _guard = self.ctx.cart_locks.lock(user_id).await;
    let mut uow = self.ctx.begin().await?;
    let cart = uow
      .carts()
      .lock_by_user(user_id)
      .await?
      .ok_or_else(|| BazaarError::not_found("shopping cart", user_id))?;
    let checked = uow
      .carts()
      .get_cart_with_checked_items(user_id)
      .await?
      .map(|info| info.products)
      .unwrap_or_default();
    if checked.is_empty() {
      return Err(BazaarError::DomainRule("the cart has no checked items to check out".to_string()));
    }

    let wanted: Vec<(Uuid, Decimal)> = checked.iter().map(|e| (e.product.id, e.amount)).collect();
    let order = place_order(uow.as_mut(), user_id, &wanted).await?;
    uow.carts().delete_lines(cart.id, true).await?;
    update_total_value_and_product_count(uow.as_mut(), cart.id).await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[ORDERS, PRODUCTS]).await;
    info!(order_id = %order.id, lines = order.lines.len(), "Checkout completed.");
    Ok(order)
  }

  /// Pending → Processing → Finished, and Pending | Processing → Cancelled.
  /// Cancelling puts the stock back.
  #[instrument(name = "OrderService::update_status", skip(self), err(Display))]
  pub async fn update_status(&self, id: Uuid, status: OrderStatus) -> BazaarResult<Order> {
    let mut uow = self.ctx.begin().await?;
    let mut order = uow
      .orders()
      .find_for_update(id)
      .await?
      .ok_or_else(|| BazaarError::not_found("order", id))?;
    if order.status.is_terminal() {
      return Err(BazaarError::DomainRule("order already finished".to_string()));
    }
    if !order.status.can_transition_to(status) {
      return Err(BazaarError::DomainRule(format!(
        "order cannot move from {:?} to {:?}",
        order.status, status
      )));
    }
    if status == OrderStatus::Cancelled {
      restore_stock(uow.as_mut(), &order).await?;
    }
    order.status = status;
    let updated = uow.orders().update(&order).await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[ORDERS, PRODUCTS]).await;
    info!(order_id = %id, status = ?status, "Order status changed.");
    Ok(updated)
  }

  /// Only pending and cancelled orders can be deleted. A pending order returns
  /// its stock.
  #[instrument(name = "OrderService::delete", skip(self), err(Display))]
  pub async fn delete(&self, id: Uuid) -> BazaarResult<()> {
    let mut uow = self.ctx.begin().await?;
    let order = uow
      .orders()
      .find_for_update(id)
      .await?
      .ok_or_else(|| BazaarError::not_found("order", id))?;
    match order.status {
      OrderStatus::Pending => restore_stock(uow.as_mut(), &order).await?,
      OrderStatus::Cancelled => {}
      other => {
        return Err(BazaarError::DomainRule(format!(
          "only pending or cancelled orders can be deleted, this one is {:?}",
          other
        )));
      }
    }
    uow.orders().delete(id).await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[ORDERS, PRODUCTS]).await;
    Ok(())
  }

  /// Orders created between `from` and `to`, both days inclusive.
  #[instrument(name = "OrderService::order_report_data", skip(self), err(Display))]
  pub async fn order_report_data(&self, from: NaiveDate, to: NaiveDate) -> BazaarResult<OrderReportData> {
    let (start, end) = day_range(from, to);
    let mut uow = self.ctx.begin().await?;
    let mut orders = uow.orders().find_created_between(start, end).await?;
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    let total_value = round2(
      orders
        .iter()
        .filter(|o| o.status != OrderStatus::Cancelled)
        .map(|o| o.total_value)
        .sum(),
    );
    Ok(OrderReportData {
      from,
      to,
      orders: orders
        .into_iter()
        .map(|o| OrderSummary {
          id: o.id,
          created_at: o.created_at,
          status: o.status,
          line_count: o.lines.len(),
          total_value: o.total_value,
        })
        .collect(),
      total_value,
    })
  }
}
