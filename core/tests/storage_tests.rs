// tests/storage_tests.rs
mod common;

use bazaar::models::{Category, Product, Role, ShoppingCart, ShoppingCartProduct, UnitType, User};
use bazaar::storage::{InMemoryStore, Store};
use bazaar::BazaarError;
use chrono::Utc;
use common::*;
use uuid::Uuid;

fn category(name: &str) -> Category {
  Category {
    id: Uuid::new_v4(),
    name: name.to_string(),
    description: String::new(),
  }
}

fn user(email: &str) -> User {
  User {
    id: Uuid::new_v4(),
    name: "Stored User".to_string(),
    email: email.to_string(),
    password_hash: "$argon2id$placeholder".to_string(),
    role: Role::Customer,
    created_at: Utc::now(),
  }
}

#[tokio::test]
async fn uncommitted_work_is_discarded() {
  setup_tracing();
  let store = InMemoryStore::new();
  {
    let mut uow = store.begin().await.unwrap();
    uow.categories().create(&category("Dropped")).await.unwrap();
    // Visible inside its own unit of work.
    assert_eq!(uow.categories().get_all().await.unwrap().len(), 1);
  }
  let mut uow = store.begin().await.unwrap();
  assert!(uow.categories().get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn repositories_share_one_unit_of_work() {
  setup_tracing();
  let store = InMemoryStore::new();
  let fruit = category("Fruit");
  let mut uow = store.begin().await.unwrap();
  uow.categories().create(&fruit).await.unwrap();
  // The product repository sees the category created through another repository.
  let apples = Product {
    id: Uuid::new_v4(),
    name: "Apples".to_string(),
    description: String::new(),
    price: d("3.49"),
    unit_type: UnitType::Kilogram,
    stock: d("10"),
    category_id: fruit.id,
    image_url: None,
  };
  uow.products().create(&apples).await.unwrap();
  uow.commit_changes().await.unwrap();

  let mut uow = store.begin().await.unwrap();
  assert!(uow.categories().has_products(fruit.id).await.unwrap());
  let found = uow
    .products()
    .get_by_predicate(&|p: &Product| p.price > rust_decimal::Decimal::from(3))
    .await
    .unwrap();
  assert_eq!(found, vec![apples]);
}

#[tokio::test]
async fn unique_keys_are_case_insensitive() {
  setup_tracing();
  let store = InMemoryStore::new();
  let mut uow = store.begin().await.unwrap();
  uow.categories().create(&category("Dairy")).await.unwrap();
  assert!(matches!(
    uow.categories().create(&category("DAIRY")).await,
    Err(BazaarError::DuplicateData(_))
  ));
  uow.users().create(&user("ann@bazaar.test")).await.unwrap();
  assert!(matches!(
    uow.users().create(&user("Ann@Bazaar.test")).await,
    Err(BazaarError::DuplicateData(_))
  ));
  assert!(uow.users().find_by_email("ANN@bazaar.test").await.unwrap().is_some());
}

#[tokio::test]
async fn foreign_keys_are_checked() {
  setup_tracing();
  let store = InMemoryStore::new();
  let mut uow = store.begin().await.unwrap();
  let orphan = ShoppingCart::new(Uuid::new_v4());
  assert!(uow.carts().create(&orphan).await.is_err());
  assert!(!uow.categories().delete(Uuid::new_v4()).await.unwrap());
  assert!(matches!(
    uow.categories().update(&category("Ghost")).await,
    Err(BazaarError::NotFound { .. })
  ));
}

#[tokio::test]
async fn deleting_a_user_cascades_to_the_cart() {
  setup_tracing();
  let store = InMemoryStore::new();
  let owner = user("owner@bazaar.test");
  let fruit = category("Fruit");
  let pear = Product {
    id: Uuid::new_v4(),
    name: "Pear".to_string(),
    description: String::new(),
    price: d("0.80"),
    unit_type: UnitType::Unit,
    stock: d("10"),
    category_id: fruit.id,
    image_url: None,
  };
  let cart = ShoppingCart::new(owner.id);

  let mut uow = store.begin().await.unwrap();
  uow.users().create(&owner).await.unwrap();
  uow.categories().create(&fruit).await.unwrap();
  uow.products().create(&pear).await.unwrap();
  uow.carts().create(&cart).await.unwrap();
  uow
    .carts()
    .upsert_line(&ShoppingCartProduct {
      cart_id: cart.id,
      product_id: pear.id,
      checked: true,
      amount: d("2"),
    })
    .await
    .unwrap();
  uow.commit_changes().await.unwrap();

  let mut uow = store.begin().await.unwrap();
  assert!(uow.users().delete(owner.id).await.unwrap());
  assert!(uow.carts().find_by_user(owner.id).await.unwrap().is_none());
  assert!(uow.carts().find_line(cart.id, pear.id).await.unwrap().is_none());
  assert!(matches!(
    uow.categories().delete(fruit.id).await,
    Err(BazaarError::DomainRule(_))
  ));
}

#[tokio::test]
async fn cart_rows_keep_an_empty_cart() {
  setup_tracing();
  let store = InMemoryStore::new();
  let owner = user("rows@bazaar.test");
  let cart = ShoppingCart::new(owner.id);
  let mut uow = store.begin().await.unwrap();
  uow.users().create(&owner).await.unwrap();
  uow.carts().create(&cart).await.unwrap();

  let rows = uow.carts().cart_rows(owner.id, true).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert!(rows[0].product_id.is_none());
  let info = uow.carts().get_cart_with_items(owner.id).await.unwrap().unwrap();
  assert_eq!(info.cart.id, cart.id);
  assert!(info.products.is_empty());
  assert!(uow.carts().get_cart_with_items(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn lock_or_create_reuses_an_existing_cart() {
  setup_tracing();
  let store = InMemoryStore::new();
  let owner = user("lock-or-create@bazaar.test");
  let mut uow = store.begin().await.unwrap();
  uow.users().create(&owner).await.unwrap();

  let created = uow.carts().lock_or_create(owner.id).await.unwrap();
  assert_eq!(created.user_id, owner.id);
  let again = uow.carts().lock_or_create(owner.id).await.unwrap();
  assert_eq!(again.id, created.id);
  assert_eq!(uow.carts().get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn carts_with_product_lists_every_holder() {
  setup_tracing();
  let store = InMemoryStore::new();
  let fruit = category("Orchard");
  let plum = Product {
    id: Uuid::new_v4(),
    name: "Plum".to_string(),
    description: String::new(),
    price: d("0.30"),
    unit_type: UnitType::Unit,
    stock: d("100"),
    category_id: fruit.id,
    image_url: None,
  };
  let mut uow = store.begin().await.unwrap();
  uow.categories().create(&fruit).await.unwrap();
  uow.products().create(&plum).await.unwrap();
  let mut holders = Vec::new();
  for email in ["a@bazaar.test", "b@bazaar.test"] {
    let owner = user(email);
    uow.users().create(&owner).await.unwrap();
    let cart = uow.carts().lock_or_create(owner.id).await.unwrap();
    uow
      .carts()
      .upsert_line(&ShoppingCartProduct {
        cart_id: cart.id,
        product_id: plum.id,
        checked: true,
        amount: d("1"),
      })
      .await
      .unwrap();
    holders.push(owner.id);
  }
  let bystander = user("c@bazaar.test");
  uow.users().create(&bystander).await.unwrap();
  uow.carts().lock_or_create(bystander.id).await.unwrap();

  holders.sort();
  let found: Vec<Uuid> = uow
    .carts()
    .carts_with_product(plum.id)
    .await
    .unwrap()
    .iter()
    .map(|c| c.user_id)
    .collect();
  assert_eq!(found, holders);
}
