// tests/order_tests.rs
mod common;

use bazaar::models::requests::{CreateOrderPayload, OrderLinePayload};
use bazaar::models::{OrderStatus, UnitType};
use bazaar::BazaarError;
use chrono::Utc;
use common::*;

#[tokio::test]
async fn checkout_moves_checked_lines_into_an_order() {
  let fx = fixture();
  let user = fx.customer().await;
  let apples = fx.product("Apples", "2.00", UnitType::Kilogram, "10").await;
  let bread = fx.product("Bread", "4.50", UnitType::Unit, "5").await;
  fx.services.carts.add_item(user.id, apples.id, d("1.5")).await.unwrap();
  fx.services.carts.add_item(user.id, bread.id, d("2")).await.unwrap();
  fx.services.carts.uncheck_item(user.id, bread.id).await.unwrap();

  let order = fx.services.orders.checkout(user.id).await.unwrap();
  assert_eq!(order.status, OrderStatus::Pending);
  assert_eq!(order.user_id, user.id);
  assert_eq!(order.lines.len(), 1);
  assert_eq!(order.lines[0].product_id, apples.id);
  assert_eq!(order.lines[0].unit_price, d("2.00"));
  assert_eq!(order.total_value, d("3.00"));

  let cart = fx.services.carts.get_cart_with_items(user.id).await.unwrap();
  assert_eq!(cart.products.len(), 1);
  assert_eq!(cart.products[0].product.id, bread.id);
  assert_eq!(cart.cart.total_value, d("9.00"));
  assert_eq!(cart.cart.products_count, 1);

  assert_eq!(fx.services.products.get(apples.id).await.unwrap().stock, d("8.5"));
  assert_eq!(fx.services.products.get(bread.id).await.unwrap().stock, d("5"));
  assert_eq!(fx.services.orders.get(order.id).await.unwrap(), order);
}

#[tokio::test]
async fn checkout_without_checked_lines_is_refused() {
  let fx = fixture();
  let user = fx.customer().await;
  assert!(matches!(
    fx.services.orders.checkout(user.id).await,
    Err(BazaarError::NotFound { .. })
  ));

  let apples = fx.product("Apples", "2.00", UnitType::Kilogram, "10").await;
  fx.services.carts.add_item(user.id, apples.id, d("1")).await.unwrap();
  fx.services.carts.uncheck_item(user.id, apples.id).await.unwrap();
  assert!(matches!(
    fx.services.orders.checkout(user.id).await,
    Err(BazaarError::DomainRule(_))
  ));
}

#[tokio::test]
async fn checkout_rechecks_stock_and_rolls_back() {
  let fx = fixture();
  let alice = fx.customer().await;
  let bob = fx.customer().await;
  let last = fx.product("Last loaf", "4.50", UnitType::Unit, "1").await;
  fx.services.carts.add_item(alice.id, last.id, d("1")).await.unwrap();
  fx.services.carts.add_item(bob.id, last.id, d("1")).await.unwrap();

  fx.services.orders.checkout(alice.id).await.unwrap();
  assert!(matches!(
    fx.services.orders.checkout(bob.id).await,
    Err(BazaarError::DomainRule(_))
  ));

  // Bob's cart is untouched by the failed checkout.
  let cart = fx.services.carts.get_cart_with_items(bob.id).await.unwrap();
  assert_eq!(cart.products.len(), 1);
  assert_eq!(fx.services.products.get(last.id).await.unwrap().stock, d("0"));
}

#[tokio::test]
async fn create_order_merges_lines_and_snapshots_prices() {
  let fx = fixture();
  let user = fx.customer().await;
  let milk = fx.product("Milk", "1.15", UnitType::Unit, "10").await;
  let order = fx
    .services
    .orders
    .create_order(CreateOrderPayload {
      user_id: user.id,
      lines: vec![
        OrderLinePayload {
          product_id: milk.id,
          amount: d("2"),
        },
        OrderLinePayload {
          product_id: milk.id,
          amount: d("1"),
        },
      ],
    })
    .await
    .unwrap();
  assert_eq!(order.lines.len(), 1);
  assert_eq!(order.lines[0].amount, d("3"));
  assert_eq!(order.total_value, d("3.45"));
  assert_eq!(fx.services.products.get(milk.id).await.unwrap().stock, d("7"));

  let empty = fx
    .services
    .orders
    .create_order(CreateOrderPayload {
      user_id: user.id,
      lines: vec![],
    })
    .await;
  assert!(matches!(empty, Err(BazaarError::Validation(_))));
}

#[tokio::test]
async fn status_transitions_follow_the_lifecycle() {
  let fx = fixture();
  let user = fx.customer().await;
  let milk = fx.product("Milk", "1.15", UnitType::Unit, "10").await;
  fx.services.carts.add_item(user.id, milk.id, d("4")).await.unwrap();
  let order = fx.services.orders.checkout(user.id).await.unwrap();

  assert!(matches!(
    fx.services.orders.update_status(order.id, OrderStatus::Finished).await,
    Err(BazaarError::DomainRule(_))
  ));
  let processing = fx
    .services
    .orders
    .update_status(order.id, OrderStatus::Processing)
    .await
    .unwrap();
  assert_eq!(processing.status, OrderStatus::Processing);
  assert!(matches!(
    fx.services.orders.delete(order.id).await,
    Err(BazaarError::DomainRule(_))
  ));
  fx.services.orders.update_status(order.id, OrderStatus::Finished).await.unwrap();

  match fx.services.orders.update_status(order.id, OrderStatus::Cancelled).await {
    Err(BazaarError::DomainRule(msg)) => assert_eq!(msg, "order already finished"),
    other => panic!("expected a domain rule violation, got {:?}", other),
  }
}

#[tokio::test]
async fn cancelling_restores_stock_and_allows_delete() {
  let fx = fixture();
  let user = fx.customer().await;
  let milk = fx.product("Milk", "1.15", UnitType::Unit, "10").await;
  fx.services.carts.add_item(user.id, milk.id, d("4")).await.unwrap();
  let order = fx.services.orders.checkout(user.id).await.unwrap();
  assert_eq!(fx.services.products.get(milk.id).await.unwrap().stock, d("6"));

  fx.services.orders.update_status(order.id, OrderStatus::Cancelled).await.unwrap();
  assert_eq!(fx.services.products.get(milk.id).await.unwrap().stock, d("10"));

  fx.services.orders.delete(order.id).await.unwrap();
  assert!(matches!(
    fx.services.orders.get(order.id).await,
    Err(BazaarError::NotFound { .. })
  ));
  // Deleting a cancelled order does not restore twice.
  assert_eq!(fx.services.products.get(milk.id).await.unwrap().stock, d("10"));
}

#[tokio::test]
async fn deleting_a_pending_order_restores_stock() {
  let fx = fixture();
  let user = fx.customer().await;
  let milk = fx.product("Milk", "1.15", UnitType::Unit, "10").await;
  fx.services.carts.add_item(user.id, milk.id, d("3")).await.unwrap();
  let order = fx.services.orders.checkout(user.id).await.unwrap();
  fx.services.orders.delete(order.id).await.unwrap();
  assert_eq!(fx.services.products.get(milk.id).await.unwrap().stock, d("10"));
}

#[tokio::test]
async fn order_report_data_covers_the_day_range() {
  let fx = fixture();
  let user = fx.customer().await;
  let milk = fx.product("Milk", "1.00", UnitType::Unit, "100").await;
  let mut placed = Vec::new();
  for amount in ["1", "2", "3"] {
    fx.services.carts.add_item(user.id, milk.id, d(amount)).await.unwrap();
    placed.push(fx.services.orders.checkout(user.id).await.unwrap());
  }
  fx.services
    .orders
    .update_status(placed[0].id, OrderStatus::Cancelled)
    .await
    .unwrap();

  let today = Utc::now().date_naive();
  let report = fx.services.orders.order_report_data(today, today).await.unwrap();
  assert_eq!(report.orders.len(), 3);
  assert_eq!(report.total_value, d("5.00"));
  assert_eq!(report.count_by_status().get(&OrderStatus::Cancelled), Some(&1));

  let yesterday = today.pred_opt().unwrap();
  let empty = fx.services.orders.order_report_data(yesterday, yesterday).await.unwrap();
  assert!(empty.orders.is_empty());
}
