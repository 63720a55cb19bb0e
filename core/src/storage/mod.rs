// bazaar/src/storage/mod.rs

//! Repositories and the unit of work that scopes them.
//!
//! A [`Store`] opens a [`UnitOfWork`]. The unit of work builds each repository on
//! first access and all of them share one transaction, so everything done through
//! one unit of work is committed together by [`UnitOfWork::commit_changes`] or
//! discarded when it is dropped.

pub mod memory;
pub mod postgres;

use crate::error::BazaarResult;
use crate::models::cart::CartRow;
use crate::models::{
  Affiliate, Category, Order, Product, ShoppingCart, ShoppingCartProduct, ShoppingCartProductInfo, User,
  WorkDay,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Predicate handed to [`Repository::get_by_predicate`].
pub type Predicate<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

/// Generic CRUD shared by every aggregate repository.
///
/// Orders are created together with their lines; `update` only touches the order row.
#[async_trait]
pub trait Repository<T: Send + Sync>: Send {
  async fn get_all(&mut self) -> BazaarResult<Vec<T>>;

  async fn get_by_predicate(&mut self, predicate: Predicate<'_, T>) -> BazaarResult<Vec<T>> {
    let all = self.get_all().await?;
    Ok(all.into_iter().filter(|item| predicate(item)).collect())
  }

  async fn find_by_id(&mut self, id: Uuid) -> BazaarResult<Option<T>>;

  async fn create(&mut self, entity: &T) -> BazaarResult<T>;

  async fn update(&mut self, entity: &T) -> BazaarResult<T>;

  /// Returns whether a row was deleted.
  async fn delete(&mut self, id: Uuid) -> BazaarResult<bool>;
}

#[async_trait]
pub trait CategoryRepository: Repository<Category> {
  /// Case-insensitive lookup.
  async fn find_by_name(&mut self, name: &str) -> BazaarResult<Option<Category>>;

  async fn has_products(&mut self, category_id: Uuid) -> BazaarResult<bool>;
}

#[async_trait]
pub trait ProductRepository: Repository<Product> {
  /// Loads and row-locks the given products for the rest of the unit of work.
  async fn find_for_update(&mut self, ids: &[Uuid]) -> BazaarResult<Vec<Product>>;

  async fn set_stock(&mut self, id: Uuid, stock: Decimal) -> BazaarResult<()>;
}

#[async_trait]
pub trait OrderRepository: Repository<Order> {
  async fn find_created_between(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> BazaarResult<Vec<Order>>;

  async fn find_for_update(&mut self, id: Uuid) -> BazaarResult<Option<Order>>;
}

#[async_trait]
pub trait UserRepository: Repository<User> {
  /// Case-insensitive lookup.
  async fn find_by_email(&mut self, email: &str) -> BazaarResult<Option<User>>;
}

#[async_trait]
pub trait AffiliateRepository: Repository<Affiliate> {
  async fn find_by_email(&mut self, email: &str) -> BazaarResult<Option<Affiliate>>;
}

#[async_trait]
pub trait WorkDayRepository: Repository<WorkDay> {
  async fn find_open_for(&mut self, employee_id: Uuid) -> BazaarResult<Option<WorkDay>>;

  /// Work days that started inside `[from, to]`.
  async fn find_started_between(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> BazaarResult<Vec<WorkDay>>;
}

#[async_trait]
pub trait CartRepository: Repository<ShoppingCart> {
  async fn find_by_user(&mut self, user_id: Uuid) -> BazaarResult<Option<ShoppingCart>>;

  /// Same as [`CartRepository::find_by_user`], holding the cart row lock until commit.
  async fn lock_by_user(&mut self, user_id: Uuid) -> BazaarResult<Option<ShoppingCart>>;

  /// The user's cart under the row lock, created first when there is none. A
  /// concurrent first creation for the same user yields that cart.
  async fn lock_or_create(&mut self, user_id: Uuid) -> BazaarResult<ShoppingCart> {
    match self.lock_by_user(user_id).await? {
      Some(cart) => Ok(cart),
      None => self.create(&ShoppingCart::new(user_id)).await,
    }
  }

  /// Flat rows of the cart → lines → products left join for `user_id`.
  /// With `only_checked` the checked predicate is part of the join condition.
  async fn cart_rows(&mut self, user_id: Uuid, only_checked: bool) -> BazaarResult<Vec<CartRow>>;

  /// Carts that have a line for `product_id`, ordered by user id.
  async fn carts_with_product(&mut self, product_id: Uuid) -> BazaarResult<Vec<ShoppingCart>>;

  async fn find_line(&mut self, cart_id: Uuid, product_id: Uuid) -> BazaarResult<Option<ShoppingCartProduct>>;

  /// Inserts the line or replaces the amount of the existing one. The checked flag
  /// of an existing line is kept.
  async fn upsert_line(&mut self, line: &ShoppingCartProduct) -> BazaarResult<ShoppingCartProduct>;

  async fn delete_line(&mut self, cart_id: Uuid, product_id: Uuid) -> BazaarResult<bool>;

  /// Deletes all lines, or only the checked ones. Returns the number removed.
  async fn delete_lines(&mut self, cart_id: Uuid, only_checked: bool) -> BazaarResult<u64>;

  async fn set_checked(&mut self, cart_id: Uuid, product_id: Uuid, checked: bool) -> BazaarResult<bool>;

  /// `(unit price, amount)` of every line of the cart.
  async fn line_prices(&mut self, cart_id: Uuid) -> BazaarResult<Vec<(Decimal, Decimal)>>;

  async fn save_totals(&mut self, cart_id: Uuid, total_value: Decimal, products_count: i32) -> BazaarResult<()>;

  async fn get_cart_with_items(&mut self, user_id: Uuid) -> BazaarResult<Option<ShoppingCartProductInfo>> {
    let rows = self.cart_rows(user_id, false).await?;
    Ok(crate::models::cart::assemble_cart_info(rows))
  }

  async fn get_cart_with_checked_items(&mut self, user_id: Uuid) -> BazaarResult<Option<ShoppingCartProductInfo>> {
    let rows = self.cart_rows(user_id, true).await?;
    Ok(crate::models::cart::assemble_cart_info(rows))
  }
}

/// Repositories sharing one transaction.
#[async_trait]
pub trait UnitOfWork: Send {
  fn categories(&mut self) -> &mut dyn CategoryRepository;
  fn products(&mut self) -> &mut dyn ProductRepository;
  fn orders(&mut self) -> &mut dyn OrderRepository;
  fn users(&mut self) -> &mut dyn UserRepository;
  fn affiliates(&mut self) -> &mut dyn AffiliateRepository;
  fn workdays(&mut self) -> &mut dyn WorkDayRepository;
  fn carts(&mut self) -> &mut dyn CartRepository;

  async fn commit_changes(self: Box<Self>) -> BazaarResult<()>;
}

#[async_trait]
pub trait Store: Send + Sync {
  async fn begin(&self) -> BazaarResult<Box<dyn UnitOfWork>>;

  /// Short name used in logs.
  fn backend(&self) -> &'static str;
}
