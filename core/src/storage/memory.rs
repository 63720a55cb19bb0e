// bazaar/src/storage/memory.rs

//! In-process store used when no database is configured and by the test suite.
//!
//! Units of work are fully serialized: `begin` takes the store mutex and keeps it
//! until the unit of work is committed or dropped. Repositories work on a private
//! copy of the tables that only replaces the committed state on commit.

use crate::error::{BazaarError, BazaarResult};
use crate::models::cart::CartRow;
use crate::models::{Affiliate, Category, Order, Product, ShoppingCart, ShoppingCartProduct, User, WorkDay};
use crate::storage::{
  AffiliateRepository, CartRepository, CategoryRepository, OrderRepository, ProductRepository, Repository, Store,
  UnitOfWork, UserRepository, WorkDayRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct Tables {
  categories: HashMap<Uuid, Category>,
  products: HashMap<Uuid, Product>,
  orders: HashMap<Uuid, Order>,
  users: HashMap<Uuid, User>,
  affiliates: HashMap<Uuid, Affiliate>,
  workdays: HashMap<Uuid, WorkDay>,
  carts: HashMap<Uuid, ShoppingCart>,
  cart_lines: Vec<ShoppingCartProduct>,
}

type SharedTables = Arc<parking_lot::Mutex<Tables>>;

/// A stored row type. Emulates the unique and foreign-key constraints of the
/// relational schema.
pub trait Entity: Clone + Send + Sync + 'static {
  const LABEL: &'static str;

  fn id(&self) -> Uuid;
  fn table(tables: &Tables) -> &HashMap<Uuid, Self>;
  fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self>;

  /// Value that must be unique across the table, if any.
  fn unique_key(&self) -> Option<String> {
    None
  }

  fn check_references(&self, _tables: &Tables) -> BazaarResult<()> {
    Ok(())
  }

  /// Runs before the row is removed. Cascades or refuses the delete.
  fn on_delete(_id: Uuid, _tables: &mut Tables) -> BazaarResult<()> {
    Ok(())
  }
}

fn missing_reference(what: &str) -> BazaarError {
  BazaarError::DomainRule(format!("referenced {} does not exist", what))
}

impl Entity for Category {
  const LABEL: &'static str = "category";

  fn id(&self) -> Uuid {
    self.id
  }
  fn table(tables: &Tables) -> &HashMap<Uuid, Self> {
    &tables.categories
  }
  fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
    &mut tables.categories
  }
  fn unique_key(&self) -> Option<String> {
    Some(self.name.to_lowercase())
  }
  fn on_delete(id: Uuid, tables: &mut Tables) -> BazaarResult<()> {
    if tables.products.values().any(|p| p.category_id == id) {
      return Err(BazaarError::DomainRule("category still has products".to_string()));
    }
    Ok(())
  }
}

impl Entity for Product {
  const LABEL: &'static str = "product";

  fn id(&self) -> Uuid {
    self.id
  }
  fn table(tables: &Tables) -> &HashMap<Uuid, Self> {
    &tables.products
  }
  fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
    &mut tables.products
  }
  fn check_references(&self, tables: &Tables) -> BazaarResult<()> {
    if !tables.categories.contains_key(&self.category_id) {
      return Err(missing_reference("category"));
    }
    Ok(())
  }
  fn on_delete(id: Uuid, tables: &mut Tables) -> BazaarResult<()> {
    if tables.orders.values().any(|o| o.lines.iter().any(|l| l.product_id == id)) {
      return Err(BazaarError::DomainRule("product is part of existing orders".to_string()));
    }
    tables.cart_lines.retain(|l| l.product_id != id);
    Ok(())
  }
}

impl Entity for Order {
  const LABEL: &'static str = "order";

  fn id(&self) -> Uuid {
    self.id
  }
  fn table(tables: &Tables) -> &HashMap<Uuid, Self> {
    &tables.orders
  }
  fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
    &mut tables.orders
  }
  fn check_references(&self, tables: &Tables) -> BazaarResult<()> {
    if !tables.users.contains_key(&self.user_id) {
      return Err(missing_reference("user"));
    }
    if self.lines.iter().any(|l| !tables.products.contains_key(&l.product_id)) {
      return Err(missing_reference("product"));
    }
    Ok(())
  }
}

impl Entity for User {
  const LABEL: &'static str = "user";

  fn id(&self) -> Uuid {
    self.id
  }
  fn table(tables: &Tables) -> &HashMap<Uuid, Self> {
    &tables.users
  }
  fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
    &mut tables.users
  }
  fn unique_key(&self) -> Option<String> {
    Some(self.email.to_lowercase())
  }
  fn on_delete(id: Uuid, tables: &mut Tables) -> BazaarResult<()> {
    if tables.orders.values().any(|o| o.user_id == id) {
      return Err(BazaarError::DomainRule("user still has orders".to_string()));
    }
    tables.workdays.retain(|_, w| w.employee_id != id);
    let cart_ids: Vec<Uuid> = tables.carts.values().filter(|c| c.user_id == id).map(|c| c.id).collect();
    tables.cart_lines.retain(|l| !cart_ids.contains(&l.cart_id));
    tables.carts.retain(|_, c| c.user_id != id);
    Ok(())
  }
}

impl Entity for Affiliate {
  const LABEL: &'static str = "affiliate";

  fn id(&self) -> Uuid {
    self.id
  }
  fn table(tables: &Tables) -> &HashMap<Uuid, Self> {
    &tables.affiliates
  }
  fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
    &mut tables.affiliates
  }
  fn unique_key(&self) -> Option<String> {
    Some(self.email.to_lowercase())
  }
}

impl Entity for WorkDay {
  const LABEL: &'static str = "work day";

  fn id(&self) -> Uuid {
    self.id
  }
  fn table(tables: &Tables) -> &HashMap<Uuid, Self> {
    &tables.workdays
  }
  fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
    &mut tables.workdays
  }
  fn check_references(&self, tables: &Tables) -> BazaarResult<()> {
    if !tables.users.contains_key(&self.employee_id) {
      return Err(missing_reference("user"));
    }
    Ok(())
  }
}

impl Entity for ShoppingCart {
  const LABEL: &'static str = "shopping cart";

  fn id(&self) -> Uuid {
    self.id
  }
  fn table(tables: &Tables) -> &HashMap<Uuid, Self> {
    &tables.carts
  }
  fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
    &mut tables.carts
  }
  fn unique_key(&self) -> Option<String> {
    Some(self.user_id.to_string())
  }
  fn check_references(&self, tables: &Tables) -> BazaarResult<()> {
    if !tables.users.contains_key(&self.user_id) {
      return Err(missing_reference("user"));
    }
    Ok(())
  }
  fn on_delete(id: Uuid, tables: &mut Tables) -> BazaarResult<()> {
    tables.cart_lines.retain(|l| l.cart_id != id);
    Ok(())
  }
}

/// Generic repository over one table of the working copy.
pub struct MemoryRepo<T> {
  tables: SharedTables,
  _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> MemoryRepo<T> {
  fn new(tables: SharedTables) -> Self {
    Self {
      tables,
      _entity: PhantomData,
    }
  }

  fn ensure_unique(tables: &Tables, entity: &T) -> BazaarResult<()> {
    if let Some(key) = entity.unique_key() {
      let clash = T::table(tables)
        .values()
        .any(|other| other.id() != entity.id() && other.unique_key().as_deref() == Some(key.as_str()));
      if clash {
        return Err(BazaarError::DuplicateData(format!("{} '{}' already exists", T::LABEL, key)));
      }
    }
    Ok(())
  }

  fn scan(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
    let tables = self.tables.lock();
    T::table(&tables).values().filter(|e| predicate(e)).cloned().collect()
  }
}

#[async_trait]
impl<T: Entity> Repository<T> for MemoryRepo<T> {
  async fn get_all(&mut self) -> BazaarResult<Vec<T>> {
    Ok(self.scan(|_| true))
  }

  async fn find_by_id(&mut self, id: Uuid) -> BazaarResult<Option<T>> {
    Ok(T::table(&self.tables.lock()).get(&id).cloned())
  }

  async fn create(&mut self, entity: &T) -> BazaarResult<T> {
    let mut tables = self.tables.lock();
    if T::table(&tables).contains_key(&entity.id()) {
      return Err(BazaarError::DuplicateData(format!("{} {} already exists", T::LABEL, entity.id())));
    }
    Self::ensure_unique(&tables, entity)?;
    entity.check_references(&tables)?;
    T::table_mut(&mut tables).insert(entity.id(), entity.clone());
    Ok(entity.clone())
  }

  async fn update(&mut self, entity: &T) -> BazaarResult<T> {
    let mut tables = self.tables.lock();
    if !T::table(&tables).contains_key(&entity.id()) {
      return Err(BazaarError::not_found(T::LABEL, entity.id()));
    }
    Self::ensure_unique(&tables, entity)?;
    entity.check_references(&tables)?;
    T::table_mut(&mut tables).insert(entity.id(), entity.clone());
    Ok(entity.clone())
  }

  async fn delete(&mut self, id: Uuid) -> BazaarResult<bool> {
    let mut tables = self.tables.lock();
    if !T::table(&tables).contains_key(&id) {
      return Ok(false);
    }
    T::on_delete(id, &mut tables)?;
    Ok(T::table_mut(&mut tables).remove(&id).is_some())
  }
}

#[async_trait]
impl CategoryRepository for MemoryRepo<Category> {
  async fn find_by_name(&mut self, name: &str) -> BazaarResult<Option<Category>> {
    let wanted = name.to_lowercase();
    Ok(self.scan(|c| c.name.to_lowercase() == wanted).into_iter().next())
  }

  async fn has_products(&mut self, category_id: Uuid) -> BazaarResult<bool> {
    Ok(self.tables.lock().products.values().any(|p| p.category_id == category_id))
  }
}

#[async_trait]
impl ProductRepository for MemoryRepo<Product> {
  async fn find_for_update(&mut self, ids: &[Uuid]) -> BazaarResult<Vec<Product>> {
    Ok(self.scan(|p| ids.contains(&p.id)))
  }

  async fn set_stock(&mut self, id: Uuid, stock: Decimal) -> BazaarResult<()> {
    let mut tables = self.tables.lock();
    let product = tables.products.get_mut(&id).ok_or_else(|| BazaarError::not_found("product", id))?;
    product.stock = stock;
    Ok(())
  }
}

#[async_trait]
impl OrderRepository for MemoryRepo<Order> {
  async fn find_created_between(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> BazaarResult<Vec<Order>> {
    Ok(self.scan(|o| o.created_at >= from && o.created_at <= to))
  }

  async fn find_for_update(&mut self, id: Uuid) -> BazaarResult<Option<Order>> {
    self.find_by_id(id).await
  }
}

#[async_trait]
impl UserRepository for MemoryRepo<User> {
  async fn find_by_email(&mut self, email: &str) -> BazaarResult<Option<User>> {
    let wanted = email.to_lowercase();
    Ok(self.scan(|u| u.email.to_lowercase() == wanted).into_iter().next())
  }
}

#[async_trait]
impl AffiliateRepository for MemoryRepo<Affiliate> {
  async fn find_by_email(&mut self, email: &str) -> BazaarResult<Option<Affiliate>> {
    let wanted = email.to_lowercase();
    Ok(self.scan(|a| a.email.to_lowercase() == wanted).into_iter().next())
  }
}

#[async_trait]
impl WorkDayRepository for MemoryRepo<WorkDay> {
  async fn find_open_for(&mut self, employee_id: Uuid) -> BazaarResult<Option<WorkDay>> {
    Ok(self.scan(|w| w.employee_id == employee_id && w.is_open()).into_iter().next())
  }

  async fn find_started_between(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> BazaarResult<Vec<WorkDay>> {
    Ok(self.scan(|w| w.started_at >= from && w.started_at <= to))
  }
}

#[async_trait]
impl CartRepository for MemoryRepo<ShoppingCart> {
  async fn find_by_user(&mut self, user_id: Uuid) -> BazaarResult<Option<ShoppingCart>> {
    Ok(self.scan(|c| c.user_id == user_id).into_iter().next())
  }

  async fn lock_by_user(&mut self, user_id: Uuid) -> BazaarResult<Option<ShoppingCart>> {
    // The whole store is already held by this unit of work.
    self.find_by_user(user_id).await
  }

  async fn cart_rows(&mut self, user_id: Uuid, only_checked: bool) -> BazaarResult<Vec<CartRow>> {
    let tables = self.tables.lock();
    let mut rows = Vec::new();
    for cart in tables.carts.values().filter(|c| c.user_id == user_id) {
      let cart_row = |line: Option<(&ShoppingCartProduct, &Product)>| CartRow {
        cart_id: cart.id,
        user_id: cart.user_id,
        total_value: cart.total_value,
        products_count: cart.products_count,
        checked: line.map(|(l, _)| l.checked),
        amount: line.map(|(l, _)| l.amount),
        product_id: line.map(|(_, p)| p.id),
        product_name: line.map(|(_, p)| p.name.clone()),
        product_description: line.map(|(_, p)| p.description.clone()),
        product_price: line.map(|(_, p)| p.price),
        product_unit_type: line.map(|(_, p)| p.unit_type),
        product_stock: line.map(|(_, p)| p.stock),
        product_category_id: line.map(|(_, p)| p.category_id),
        product_image_url: line.and_then(|(_, p)| p.image_url.clone()),
      };
      let joined: Vec<CartRow> = tables
        .cart_lines
        .iter()
        .filter(|l| l.cart_id == cart.id && (!only_checked || l.checked))
        .filter_map(|l| tables.products.get(&l.product_id).map(|p| cart_row(Some((l, p)))))
        .collect();
      if joined.is_empty() {
        rows.push(cart_row(None));
      } else {
        rows.extend(joined);
      }
    }
    Ok(rows)
  }

  async fn carts_with_product(&mut self, product_id: Uuid) -> BazaarResult<Vec<ShoppingCart>> {
    let tables = self.tables.lock();
    let mut carts: Vec<ShoppingCart> = tables
      .cart_lines
      .iter()
      .filter(|l| l.product_id == product_id)
      .filter_map(|l| tables.carts.get(&l.cart_id).cloned())
      .collect();
    carts.sort_by_key(|c| c.user_id);
    Ok(carts)
  }

  async fn find_line(&mut self, cart_id: Uuid, product_id: Uuid) -> BazaarResult<Option<ShoppingCartProduct>> {
    let tables = self.tables.lock();
    Ok(
      tables
        .cart_lines
        .iter()
        .find(|l| l.cart_id == cart_id && l.product_id == product_id)
        .cloned(),
    )
  }

  async fn upsert_line(&mut self, line: &ShoppingCartProduct) -> BazaarResult<ShoppingCartProduct> {
    let mut tables = self.tables.lock();
    if !tables.carts.contains_key(&line.cart_id) {
      return Err(missing_reference("shopping cart"));
    }
    if !tables.products.contains_key(&line.product_id) {
      return Err(missing_reference("product"));
    }
    let existing = tables
      .cart_lines
      .iter_mut()
      .find(|l| l.cart_id == line.cart_id && l.product_id == line.product_id);
    match existing {
      Some(stored) => {
        stored.amount = line.amount;
        Ok(stored.clone())
      }
      None => {
        tables.cart_lines.push(line.clone());
        Ok(line.clone())
      }
    }
  }

  async fn delete_line(&mut self, cart_id: Uuid, product_id: Uuid) -> BazaarResult<bool> {
    let mut tables = self.tables.lock();
    let before = tables.cart_lines.len();
    tables
      .cart_lines
      .retain(|l| !(l.cart_id == cart_id && l.product_id == product_id));
    Ok(tables.cart_lines.len() < before)
  }

  async fn delete_lines(&mut self, cart_id: Uuid, only_checked: bool) -> BazaarResult<u64> {
    let mut tables = self.tables.lock();
    let before = tables.cart_lines.len();
    tables
      .cart_lines
      .retain(|l| !(l.cart_id == cart_id && (!only_checked || l.checked)));
    Ok((before - tables.cart_lines.len()) as u64)
  }

  async fn set_checked(&mut self, cart_id: Uuid, product_id: Uuid, checked: bool) -> BazaarResult<bool> {
    let mut tables = self.tables.lock();
    match tables
      .cart_lines
      .iter_mut()
      .find(|l| l.cart_id == cart_id && l.product_id == product_id)
    {
      Some(line) => {
        line.checked = checked;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn line_prices(&mut self, cart_id: Uuid) -> BazaarResult<Vec<(Decimal, Decimal)>> {
    let tables = self.tables.lock();
    Ok(
      tables
        .cart_lines
        .iter()
        .filter(|l| l.cart_id == cart_id)
        .filter_map(|l| tables.products.get(&l.product_id).map(|p| (p.price, l.amount)))
        .collect(),
    )
  }

  async fn save_totals(&mut self, cart_id: Uuid, total_value: Decimal, products_count: i32) -> BazaarResult<()> {
    let mut tables = self.tables.lock();
    let cart = tables
      .carts
      .get_mut(&cart_id)
      .ok_or_else(|| BazaarError::not_found("shopping cart", cart_id))?;
    cart.total_value = total_value;
    cart.products_count = products_count;
    Ok(())
  }
}

/// Store keeping every table in process memory.
#[derive(Clone, Default)]
pub struct InMemoryStore {
  committed: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Store for InMemoryStore {
  #[instrument(name = "InMemoryStore::begin", skip(self), level = "trace")]
  async fn begin(&self) -> BazaarResult<Box<dyn UnitOfWork>> {
    let committed = Arc::clone(&self.committed).lock_owned().await;
    let working = Arc::new(parking_lot::Mutex::new(committed.clone()));
    Ok(Box::new(MemoryUnitOfWork {
      committed,
      working,
      categories: None,
      products: None,
      orders: None,
      users: None,
      affiliates: None,
      workdays: None,
      carts: None,
    }))
  }

  fn backend(&self) -> &'static str {
    "memory"
  }
}

pub struct MemoryUnitOfWork {
  committed: OwnedMutexGuard<Tables>,
  working: SharedTables,
  categories: Option<MemoryRepo<Category>>,
  products: Option<MemoryRepo<Product>>,
  orders: Option<MemoryRepo<Order>>,
  users: Option<MemoryRepo<User>>,
  affiliates: Option<MemoryRepo<Affiliate>>,
  workdays: Option<MemoryRepo<WorkDay>>,
  carts: Option<MemoryRepo<ShoppingCart>>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
  fn categories(&mut self) -> &mut dyn CategoryRepository {
    self.categories.get_or_insert_with(|| MemoryRepo::new(self.working.clone()))
  }

  fn products(&mut self) -> &mut dyn ProductRepository {
    self.products.get_or_insert_with(|| MemoryRepo::new(self.working.clone()))
  }

  fn orders(&mut self) -> &mut dyn OrderRepository {
    self.orders.get_or_insert_with(|| MemoryRepo::new(self.working.clone()))
  }

  fn users(&mut self) -> &mut dyn UserRepository {
    self.users.get_or_insert_with(|| MemoryRepo::new(self.working.clone()))
  }

  fn affiliates(&mut self) -> &mut dyn AffiliateRepository {
    self.affiliates.get_or_insert_with(|| MemoryRepo::new(self.working.clone()))
  }

  fn workdays(&mut self) -> &mut dyn WorkDayRepository {
    self.workdays.get_or_insert_with(|| MemoryRepo::new(self.working.clone()))
  }

  fn carts(&mut self) -> &mut dyn CartRepository {
    self.carts.get_or_insert_with(|| MemoryRepo::new(self.working.clone()))
  }

  async fn commit_changes(self: Box<Self>) -> BazaarResult<()> {
    let mut this = *self;
    let working = std::mem::take(&mut *this.working.lock());
    *this.committed = working;
    debug!("In-memory unit of work committed.");
    Ok(())
  }
}
