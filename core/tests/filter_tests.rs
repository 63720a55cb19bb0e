// tests/filter_tests.rs
mod common;

use bazaar::filters::{filter_and_page, Comparator, FilterFactory, FilterParams, Filters, ListQuery, NameFilter, PriceFilter};
use bazaar::models::{Affiliate, Order, OrderStatus, Product, UnitType};
use bazaar::BazaarError;
use chrono::{NaiveDate, TimeZone, Utc};
use common::*;
use std::sync::Arc;
use uuid::Uuid;

fn product(name: &str, price: &str) -> Product {
  Product {
    id: Uuid::new_v4(),
    name: name.to_string(),
    description: String::new(),
    price: d(price),
    unit_type: UnitType::Unit,
    stock: d("1"),
    category_id: Uuid::nil(),
    image_url: None,
  }
}

fn january_order(day: u32, status: OrderStatus, total: &str) -> Order {
  Order {
    id: Uuid::new_v4(),
    user_id: Uuid::nil(),
    created_at: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
    status,
    total_value: d(total),
    lines: Vec::new(),
  }
}

fn january() -> Vec<Order> {
  // Deliberately out of order.
  vec![
    january_order(15, OrderStatus::Finished, "40.00"),
    january_order(3, OrderStatus::Pending, "12.50"),
    january_order(10, OrderStatus::Cancelled, "7.00"),
    january_order(28, OrderStatus::Pending, "99.99"),
    january_order(9, OrderStatus::Processing, "12.50"),
  ]
}

fn days(orders: &[Order]) -> Vec<u32> {
  use chrono::Datelike;
  orders.iter().map(|o| o.created_at.day()).collect()
}

#[test]
fn strategy_lookup_is_case_insensitive() {
  let factory = FilterFactory::<Product>::new().register(NameFilter).register(PriceFilter);
  let lower = factory.get_strategy("name").unwrap();
  let upper = factory.get_strategy("NAME").unwrap();
  assert!(Arc::ptr_eq(&lower, &upper));
  assert_eq!(upper.key(), "name");
  assert_eq!(factory.get_strategy("Price").unwrap().key(), "price");

  match factory.get_strategy("bogus") {
    Err(BazaarError::UnknownStrategy(name)) => assert_eq!(name, "bogus"),
    Err(other) => panic!("unexpected error {:?}", other),
    Ok(_) => panic!("bogus should not resolve"),
  }
}

#[test]
fn each_resource_registers_its_keys() {
  let filters = Filters::new();
  let mut order_keys = filters.orders.keys();
  order_keys.sort_unstable();
  assert_eq!(order_keys, vec!["date", "status", "value"]);
  assert!(filters.categories.get_strategy("price").is_err());
  assert!(filters.affiliates.get_strategy("points").is_ok());
  assert!(filters.users.get_strategy("role").is_ok());
  assert!(filters.workdays.get_strategy("date").is_ok());
}

#[test]
fn date_filter_with_open_upper_bound() {
  let filters = Filters::new();
  let params = FilterParams {
    from: NaiveDate::from_ymd_opt(2024, 1, 10),
    to: None,
    ..FilterParams::default()
  };
  let strategy = filters.orders.get_strategy("date").unwrap();
  let input = january();
  let kept = strategy.apply(&input, &params);
  assert_eq!(days(&kept), vec![10, 15, 28]);
  // The input is left alone.
  assert_eq!(days(&input), vec![15, 3, 10, 28, 9]);
}

#[test]
fn date_filter_bounds_are_inclusive() {
  let filters = Filters::new();
  let params = FilterParams {
    from: NaiveDate::from_ymd_opt(2024, 1, 9),
    to: NaiveDate::from_ymd_opt(2024, 1, 15),
    ..FilterParams::default()
  };
  let kept = filters.orders.get_strategy("date").unwrap().apply(&january(), &params);
  assert_eq!(days(&kept), vec![9, 10, 15]);
}

#[test]
fn missing_parameter_passes_everything_sorted() {
  let filters = Filters::new();
  let kept = filters
    .orders
    .get_strategy("value")
    .unwrap()
    .apply(&january(), &FilterParams::default());
  assert_eq!(kept.len(), 5);
  let totals: Vec<String> = kept.iter().map(|o| o.total_value.to_string()).collect();
  assert_eq!(totals, vec!["7.00", "12.50", "12.50", "40.00", "99.99"]);
}

#[test]
fn comparators_on_price_and_value() {
  let filters = Filters::new();
  let products = vec![product("Tea", "4.20"), product("Coffee", "9.80"), product("Water", "0.90")];
  let greater = FilterParams {
    comparator: Comparator::Greater,
    value: Some(d("1")),
    ..FilterParams::default()
  };
  let kept = filters.products.get_strategy("price").unwrap().apply(&products, &greater);
  let names: Vec<&str> = kept.iter().map(|p| p.name.as_str()).collect();
  assert_eq!(names, vec!["Tea", "Coffee"]);

  let equal = FilterParams {
    value: Some(d("12.5")),
    ..FilterParams::default()
  };
  let kept = filters.orders.get_strategy("value").unwrap().apply(&january(), &equal);
  assert_eq!(days(&kept).len(), 2);

  assert_eq!(Comparator::parse("LESS").unwrap(), Comparator::Less);
  assert!(matches!(Comparator::parse("around"), Err(BazaarError::IncorrectFormat(_))));
}

#[test]
fn status_filter_keeps_date_order() {
  let filters = Filters::new();
  let params = FilterParams {
    status: Some(OrderStatus::Pending),
    ..FilterParams::default()
  };
  let kept = filters.orders.get_strategy("status").unwrap().apply(&january(), &params);
  assert_eq!(days(&kept), vec![3, 28]);
}

#[test]
fn name_filter_is_a_case_insensitive_substring() {
  let filters = Filters::new();
  let products = vec![
    product("Green tea", "4.20"),
    product("Coffee", "9.80"),
    product("black TEA", "3.10"),
  ];
  let params = FilterParams {
    name: Some("Tea".to_string()),
    ..FilterParams::default()
  };
  let kept = filters.products.get_strategy("name").unwrap().apply(&products, &params);
  let names: Vec<&str> = kept.iter().map(|p| p.name.as_str()).collect();
  assert_eq!(names, vec!["black TEA", "Green tea"]);
}

#[test]
fn points_filter_on_affiliates() {
  let filters = Filters::new();
  let affiliate = |name: &str, points: i64| Affiliate {
    id: Uuid::new_v4(),
    name: name.to_string(),
    email: format!("{}@bazaar.test", name),
    points,
    joined_at: Utc::now(),
  };
  let all = vec![affiliate("a", 50), affiliate("b", 5), affiliate("c", 500)];
  let params = FilterParams {
    comparator: Comparator::Less,
    value: Some(d("100")),
    ..FilterParams::default()
  };
  let kept = filters.affiliates.get_strategy("points").unwrap().apply(&all, &params);
  let points: Vec<i64> = kept.iter().map(|a| a.points).collect();
  assert_eq!(points, vec![5, 50]);
}

#[test]
fn list_query_filters_then_pages() {
  let filters = Filters::new();
  let query = ListQuery {
    filter: Some("DATE".to_string()),
    from: NaiveDate::from_ymd_opt(2024, 1, 5),
    page: Some(2),
    page_size: Some(2),
    ..ListQuery::default()
  };
  let page = filter_and_page(&filters, january(), &query).unwrap();
  assert_eq!(page.total, 4);
  assert_eq!(page.page, 2);
  assert_eq!(days(&page.items), vec![15, 28]);

  let unknown = ListQuery::with_filter("colour");
  assert!(matches!(
    filter_and_page(&filters, january(), &unknown),
    Err(BazaarError::UnknownStrategy(_))
  ));

  let too_big = ListQuery {
    page_size: Some(101),
    ..ListQuery::default()
  };
  assert!(matches!(
    filter_and_page(&filters, january(), &too_big),
    Err(BazaarError::Validation(_))
  ));
}

#[test]
fn no_filter_uses_the_default_order() {
  let filters = Filters::new();
  let page = filter_and_page(&filters, january(), &ListQuery::default()).unwrap();
  assert_eq!(days(&page.items), vec![3, 9, 10, 15, 28]);
  assert_eq!(page.page_size, 20);
}

#[tokio::test]
async fn service_lists_go_through_the_filters() {
  let fx = fixture();
  fx.product("Espresso beans", "12.00", UnitType::Kilogram, "3").await;
  fx.product("Tea bags", "2.50", UnitType::Unit, "30").await;
  fx.product("Teapot", "24.00", UnitType::Unit, "2").await;

  let query = ListQuery {
    filter: Some("name".to_string()),
    name: Some("tea".to_string()),
    ..ListQuery::default()
  };
  let page = fx.services.products.list(&query).await.unwrap();
  let names: Vec<String> = page.items.into_iter().map(|p| p.name).collect();
  assert_eq!(names, vec!["Tea bags", "Teapot"]);

  let query = ListQuery {
    filter: Some("price".to_string()),
    comparator: Some("greater".to_string()),
    value: Some(d("10")),
    ..ListQuery::default()
  };
  let page = fx.services.products.list(&query).await.unwrap();
  assert_eq!(page.total, 2);
  assert_eq!(page.items[0].name, "Espresso beans");
}
