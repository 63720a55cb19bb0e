// bazaar/src/storage/postgres.rs

//! PostgreSQL store. Every unit of work owns one transaction that its lazily built
//! repositories share.

use crate::error::{BazaarError, BazaarResult};
use crate::models::cart::CartRow;
use crate::models::{
  Affiliate, Category, LineItem, Order, Product, ShoppingCart, ShoppingCartProduct, User, WorkDay,
};
use crate::storage::{
  AffiliateRepository, CartRepository, CategoryRepository, OrderRepository, ProductRepository, Repository, Store,
  UnitOfWork, UserRepository, WorkDayRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgConnection, PgPoolOptions, PgRow};
use sqlx::query::QueryAs;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

type SharedTx = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

fn active<'a>(tx: &'a mut Option<Transaction<'static, Postgres>>) -> BazaarResult<&'a mut PgConnection> {
  tx.as_mut()
    .map(|t| &mut **t)
    .ok_or_else(|| BazaarError::Infrastructure("transaction already finished".to_string()))
}

type PgQueryAs<'q, T> = QueryAs<'q, Postgres, T, PgArguments>;

/// Row type with a plain single-table mapping.
pub trait PgEntity: for<'r> FromRow<'r, PgRow> + Clone + Send + Sync + Unpin + 'static {
  const TABLE: &'static str;
  /// Column list; `id` comes first.
  const COLUMNS: &'static [&'static str];
  const ORDER_BY: &'static str;

  fn row_id(&self) -> Uuid;

  /// Binds every column of [`PgEntity::COLUMNS`] in order.
  fn bind_columns<'q>(&'q self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self>;
}

fn column_list<T: PgEntity>() -> String {
  T::COLUMNS.join(", ")
}

impl PgEntity for Category {
  const TABLE: &'static str = "categories";
  const COLUMNS: &'static [&'static str] = &["id", "name", "description"];
  const ORDER_BY: &'static str = "name, id";

  fn row_id(&self) -> Uuid {
    self.id
  }

  fn bind_columns<'q>(&'q self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
    query.bind(self.id).bind(&self.name).bind(&self.description)
  }
}

impl PgEntity for Product {
  const TABLE: &'static str = "products";
  const COLUMNS: &'static [&'static str] = &[
    "id",
    "name",
    "description",
    "price",
    "unit_type",
    "stock",
    "category_id",
    "image_url",
  ];
  const ORDER_BY: &'static str = "name, id";

  fn row_id(&self) -> Uuid {
    self.id
  }

  fn bind_columns<'q>(&'q self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
    query
      .bind(self.id)
      .bind(&self.name)
      .bind(&self.description)
      .bind(self.price)
      .bind(self.unit_type)
      .bind(self.stock)
      .bind(self.category_id)
      .bind(&self.image_url)
  }
}

impl PgEntity for User {
  const TABLE: &'static str = "users";
  const COLUMNS: &'static [&'static str] = &["id", "name", "email", "password_hash", "role", "created_at"];
  const ORDER_BY: &'static str = "name, id";

  fn row_id(&self) -> Uuid {
    self.id
  }

  fn bind_columns<'q>(&'q self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
    query
      .bind(self.id)
      .bind(&self.name)
      .bind(&self.email)
      .bind(&self.password_hash)
      .bind(self.role)
      .bind(self.created_at)
  }
}

impl PgEntity for Affiliate {
  const TABLE: &'static str = "affiliates";
  const COLUMNS: &'static [&'static str] = &["id", "name", "email", "points", "joined_at"];
  const ORDER_BY: &'static str = "name, id";

  fn row_id(&self) -> Uuid {
    self.id
  }

  fn bind_columns<'q>(&'q self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
    query
      .bind(self.id)
      .bind(&self.name)
      .bind(&self.email)
      .bind(self.points)
      .bind(self.joined_at)
  }
}

impl PgEntity for WorkDay {
  const TABLE: &'static str = "workdays";
  const COLUMNS: &'static [&'static str] = &["id", "employee_id", "started_at", "ended_at"];
  const ORDER_BY: &'static str = "started_at, id";

  fn row_id(&self) -> Uuid {
    self.id
  }

  fn bind_columns<'q>(&'q self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
    query
      .bind(self.id)
      .bind(self.employee_id)
      .bind(self.started_at)
      .bind(self.ended_at)
  }
}

impl PgEntity for ShoppingCart {
  const TABLE: &'static str = "shopping_carts";
  const COLUMNS: &'static [&'static str] = &["id", "user_id", "total_value", "products_count"];
  const ORDER_BY: &'static str = "id";

  fn row_id(&self) -> Uuid {
    self.id
  }

  fn bind_columns<'q>(&'q self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
    query
      .bind(self.id)
      .bind(self.user_id)
      .bind(self.total_value)
      .bind(self.products_count)
  }
}

/// Generic repository over a [`PgEntity`] table.
pub struct PgRepo<T> {
  tx: SharedTx,
  _entity: PhantomData<fn() -> T>,
}

impl<T: PgEntity> PgRepo<T> {
  fn new(tx: SharedTx) -> Self {
    Self {
      tx,
      _entity: PhantomData,
    }
  }

  fn select_sql(filter: &str) -> String {
    format!(
      "SELECT {} FROM {} {} ORDER BY {}",
      column_list::<T>(),
      T::TABLE,
      filter,
      T::ORDER_BY
    )
  }

  async fn fetch_where(&self, filter: &str, binds: &[Uuid]) -> BazaarResult<Vec<T>> {
    let sql = Self::select_sql(filter);
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let mut query = sqlx::query_as::<_, T>(&sql);
    for value in binds {
      query = query.bind(*value);
    }
    Ok(query.fetch_all(&mut *conn).await?)
  }
}

#[async_trait]
impl<T: PgEntity> Repository<T> for PgRepo<T> {
  async fn get_all(&mut self) -> BazaarResult<Vec<T>> {
    self.fetch_where("", &[]).await
  }

  async fn find_by_id(&mut self, id: Uuid) -> BazaarResult<Option<T>> {
    Ok(self.fetch_where("WHERE id = $1", &[id]).await?.into_iter().next())
  }

  async fn create(&mut self, entity: &T) -> BazaarResult<T> {
    let placeholders: Vec<String> = (1..=T::COLUMNS.len()).map(|i| format!("${}", i)).collect();
    let sql = format!(
      "INSERT INTO {} ({cols}) VALUES ({}) RETURNING {cols}",
      T::TABLE,
      placeholders.join(", "),
      cols = column_list::<T>()
    );
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let created = entity
      .bind_columns(sqlx::query_as::<_, T>(&sql))
      .fetch_one(&mut *conn)
      .await?;
    Ok(created)
  }

  async fn update(&mut self, entity: &T) -> BazaarResult<T> {
    let assignments: Vec<String> = T::COLUMNS
      .iter()
      .enumerate()
      .skip(1)
      .map(|(i, col)| format!("{} = ${}", col, i + 1))
      .collect();
    let sql = format!(
      "UPDATE {} SET {} WHERE id = $1 RETURNING {}",
      T::TABLE,
      assignments.join(", "),
      column_list::<T>()
    );
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let updated = entity
      .bind_columns(sqlx::query_as::<_, T>(&sql))
      .fetch_optional(&mut *conn)
      .await?;
    updated.ok_or_else(|| BazaarError::not_found(T::TABLE, entity.row_id()))
  }

  async fn delete(&mut self, id: Uuid) -> BazaarResult<bool> {
    let sql = format!("DELETE FROM {} WHERE id = $1", T::TABLE);
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    Ok(result.rows_affected() > 0)
  }
}

#[async_trait]
impl CategoryRepository for PgRepo<Category> {
  async fn find_by_name(&mut self, name: &str) -> BazaarResult<Option<Category>> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let found = sqlx::query_as::<_, Category>("SELECT id, name, description FROM categories WHERE LOWER(name) = LOWER($1)")
      .bind(name)
      .fetch_optional(&mut *conn)
      .await?;
    Ok(found)
  }

  async fn has_products(&mut self, category_id: Uuid) -> BazaarResult<bool> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE category_id = $1)")
      .bind(category_id)
      .fetch_one(&mut *conn)
      .await?;
    Ok(exists)
  }
}

#[async_trait]
impl ProductRepository for PgRepo<Product> {
  async fn find_for_update(&mut self, ids: &[Uuid]) -> BazaarResult<Vec<Product>> {
    let sql = format!(
      "SELECT {} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
      column_list::<Product>()
    );
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let products = sqlx::query_as::<_, Product>(&sql)
      .bind(ids.to_vec())
      .fetch_all(&mut *conn)
      .await?;
    Ok(products)
  }

  async fn set_stock(&mut self, id: Uuid, stock: Decimal) -> BazaarResult<()> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let result = sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
      .bind(id)
      .bind(stock)
      .execute(&mut *conn)
      .await?;
    if result.rows_affected() == 0 {
      return Err(BazaarError::not_found("product", id));
    }
    Ok(())
  }
}

#[async_trait]
impl UserRepository for PgRepo<User> {
  async fn find_by_email(&mut self, email: &str) -> BazaarResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE LOWER(email) = LOWER($1)", column_list::<User>());
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    Ok(sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(&mut *conn).await?)
  }
}

#[async_trait]
impl AffiliateRepository for PgRepo<Affiliate> {
  async fn find_by_email(&mut self, email: &str) -> BazaarResult<Option<Affiliate>> {
    let sql = format!(
      "SELECT {} FROM affiliates WHERE LOWER(email) = LOWER($1)",
      column_list::<Affiliate>()
    );
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    Ok(sqlx::query_as::<_, Affiliate>(&sql).bind(email).fetch_optional(&mut *conn).await?)
  }
}

#[async_trait]
impl WorkDayRepository for PgRepo<WorkDay> {
  async fn find_open_for(&mut self, employee_id: Uuid) -> BazaarResult<Option<WorkDay>> {
    Ok(
      self
        .fetch_where("WHERE employee_id = $1 AND ended_at IS NULL", &[employee_id])
        .await?
        .into_iter()
        .next(),
    )
  }

  async fn find_started_between(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> BazaarResult<Vec<WorkDay>> {
    let sql = Self::select_sql("WHERE started_at >= $1 AND started_at <= $2");
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    Ok(
      sqlx::query_as::<_, WorkDay>(&sql)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *conn)
        .await?,
    )
  }
}

const CART_ROWS_SQL: &str = r#"
SELECT c.id AS cart_id, c.user_id, c.total_value, c.products_count,
       l.checked, l.amount,
       p.id AS product_id, p.name AS product_name, p.description AS product_description,
       p.price AS product_price, p.unit_type AS product_unit_type, p.stock AS product_stock,
       p.category_id AS product_category_id, p.image_url AS product_image_url
FROM shopping_carts c
LEFT JOIN shopping_cart_products l ON l.cart_id = c.id AND ($2 = FALSE OR l.checked = TRUE)
LEFT JOIN products p ON p.id = l.product_id
WHERE c.user_id = $1
ORDER BY p.name NULLS FIRST, p.id
"#;

#[async_trait]
impl CartRepository for PgRepo<ShoppingCart> {
  async fn find_by_user(&mut self, user_id: Uuid) -> BazaarResult<Option<ShoppingCart>> {
    Ok(self.fetch_where("WHERE user_id = $1", &[user_id]).await?.into_iter().next())
  }

  async fn lock_by_user(&mut self, user_id: Uuid) -> BazaarResult<Option<ShoppingCart>> {
    let sql = format!(
      "SELECT {} FROM shopping_carts WHERE user_id = $1 FOR UPDATE",
      column_list::<ShoppingCart>()
    );
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    Ok(
      sqlx::query_as::<_, ShoppingCart>(&sql)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?,
    )
  }

  async fn lock_or_create(&mut self, user_id: Uuid) -> BazaarResult<ShoppingCart> {
    let fresh = ShoppingCart::new(user_id);
    let sql = format!(
      "SELECT {} FROM shopping_carts WHERE user_id = $1 FOR UPDATE",
      column_list::<ShoppingCart>()
    );
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    // A concurrent first add from another process waits here and then reads its row.
    let inserted = sqlx::query(
      "INSERT INTO shopping_carts (id, user_id, total_value, products_count) VALUES ($1, $2, $3, $4) \
       ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(fresh.id)
    .bind(fresh.user_id)
    .bind(fresh.total_value)
    .bind(fresh.products_count)
    .execute(&mut *conn)
    .await?;
    if inserted.rows_affected() == 0 {
      debug!(%user_id, "Cart already created concurrently, reusing it.");
    }
    Ok(
      sqlx::query_as::<_, ShoppingCart>(&sql)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?,
    )
  }

  async fn carts_with_product(&mut self, product_id: Uuid) -> BazaarResult<Vec<ShoppingCart>> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    Ok(
      sqlx::query_as::<_, ShoppingCart>(
        "SELECT c.id, c.user_id, c.total_value, c.products_count FROM shopping_carts c \
         JOIN shopping_cart_products l ON l.cart_id = c.id \
         WHERE l.product_id = $1 ORDER BY c.user_id FOR UPDATE OF c",
      )
      .bind(product_id)
      .fetch_all(&mut *conn)
      .await?,
    )
  }

  async fn cart_rows(&mut self, user_id: Uuid, only_checked: bool) -> BazaarResult<Vec<CartRow>> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    Ok(
      sqlx::query_as::<_, CartRow>(CART_ROWS_SQL)
        .bind(user_id)
        .bind(only_checked)
        .fetch_all(&mut *conn)
        .await?,
    )
  }

  async fn find_line(&mut self, cart_id: Uuid, product_id: Uuid) -> BazaarResult<Option<ShoppingCartProduct>> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    Ok(
      sqlx::query_as::<_, ShoppingCartProduct>(
        "SELECT cart_id, product_id, checked, amount FROM shopping_cart_products WHERE cart_id = $1 AND product_id = $2",
      )
      .bind(cart_id)
      .bind(product_id)
      .fetch_optional(&mut *conn)
      .await?,
    )
  }

  async fn upsert_line(&mut self, line: &ShoppingCartProduct) -> BazaarResult<ShoppingCartProduct> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    Ok(
      sqlx::query_as::<_, ShoppingCartProduct>(
        "INSERT INTO shopping_cart_products (cart_id, product_id, checked, amount) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (cart_id, product_id) DO UPDATE SET amount = EXCLUDED.amount \
         RETURNING cart_id, product_id, checked, amount",
      )
      .bind(line.cart_id)
      .bind(line.product_id)
      .bind(line.checked)
      .bind(line.amount)
      .fetch_one(&mut *conn)
      .await?,
    )
  }

  async fn delete_line(&mut self, cart_id: Uuid, product_id: Uuid) -> BazaarResult<bool> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let result = sqlx::query("DELETE FROM shopping_cart_products WHERE cart_id = $1 AND product_id = $2")
      .bind(cart_id)
      .bind(product_id)
      .execute(&mut *conn)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn delete_lines(&mut self, cart_id: Uuid, only_checked: bool) -> BazaarResult<u64> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let result = sqlx::query("DELETE FROM shopping_cart_products WHERE cart_id = $1 AND ($2 = FALSE OR checked = TRUE)")
      .bind(cart_id)
      .bind(only_checked)
      .execute(&mut *conn)
      .await?;
    Ok(result.rows_affected())
  }

  async fn set_checked(&mut self, cart_id: Uuid, product_id: Uuid, checked: bool) -> BazaarResult<bool> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let result = sqlx::query("UPDATE shopping_cart_products SET checked = $3 WHERE cart_id = $1 AND product_id = $2")
      .bind(cart_id)
      .bind(product_id)
      .bind(checked)
      .execute(&mut *conn)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn line_prices(&mut self, cart_id: Uuid) -> BazaarResult<Vec<(Decimal, Decimal)>> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    Ok(
      sqlx::query_as::<_, (Decimal, Decimal)>(
        "SELECT p.price, l.amount FROM shopping_cart_products l JOIN products p ON p.id = l.product_id WHERE l.cart_id = $1",
      )
      .bind(cart_id)
      .fetch_all(&mut *conn)
      .await?,
    )
  }

  async fn save_totals(&mut self, cart_id: Uuid, total_value: Decimal, products_count: i32) -> BazaarResult<()> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let result = sqlx::query("UPDATE shopping_carts SET total_value = $2, products_count = $3 WHERE id = $1")
      .bind(cart_id)
      .bind(total_value)
      .bind(products_count)
      .execute(&mut *conn)
      .await?;
    if result.rows_affected() == 0 {
      return Err(BazaarError::not_found("shopping cart", cart_id));
    }
    Ok(())
  }
}

const ORDER_COLUMNS: &str = "id, user_id, created_at, status, total_value";
const LINE_COLUMNS: &str = "id, order_id, product_id, amount, unit_price";

/// Orders span two tables, so they get their own repository.
pub struct PgOrderRepository {
  tx: SharedTx,
}

impl PgOrderRepository {
  async fn attach_lines(conn: &mut PgConnection, mut orders: Vec<Order>) -> BazaarResult<Vec<Order>> {
    if orders.is_empty() {
      return Ok(orders);
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let lines = sqlx::query_as::<_, LineItem>(&format!(
      "SELECT {} FROM order_lines WHERE order_id = ANY($1) ORDER BY id",
      LINE_COLUMNS
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;
    let mut by_order: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
    for line in lines {
      by_order.entry(line.order_id).or_default().push(line);
    }
    for order in orders.iter_mut() {
      order.lines = by_order.remove(&order.id).unwrap_or_default();
    }
    Ok(orders)
  }

  async fn fetch(&self, filter: &str, bind_id: Option<Uuid>, range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> BazaarResult<Vec<Order>> {
    let sql = format!("SELECT {} FROM orders {} ORDER BY created_at, id", ORDER_COLUMNS, filter);
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let mut query = sqlx::query_as::<_, Order>(&sql);
    if let Some(id) = bind_id {
      query = query.bind(id);
    }
    if let Some((from, to)) = range {
      query = query.bind(from).bind(to);
    }
    let orders = query.fetch_all(&mut *conn).await?;
    Self::attach_lines(conn, orders).await
  }
}

#[async_trait]
impl Repository<Order> for PgOrderRepository {
  async fn get_all(&mut self) -> BazaarResult<Vec<Order>> {
    self.fetch("", None, None).await
  }

  async fn find_by_id(&mut self, id: Uuid) -> BazaarResult<Option<Order>> {
    Ok(self.fetch("WHERE id = $1", Some(id), None).await?.into_iter().next())
  }

  async fn create(&mut self, order: &Order) -> BazaarResult<Order> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let mut created = sqlx::query_as::<_, Order>(&format!(
      "INSERT INTO orders ({cols}) VALUES ($1, $2, $3, $4, $5) RETURNING {cols}",
      cols = ORDER_COLUMNS
    ))
    .bind(order.id)
    .bind(order.user_id)
    .bind(order.created_at)
    .bind(order.status)
    .bind(order.total_value)
    .fetch_one(&mut *conn)
    .await?;
    for line in &order.lines {
      let stored = sqlx::query_as::<_, LineItem>(&format!(
        "INSERT INTO order_lines ({cols}) VALUES ($1, $2, $3, $4, $5) RETURNING {cols}",
        cols = LINE_COLUMNS
      ))
      .bind(line.id)
      .bind(created.id)
      .bind(line.product_id)
      .bind(line.amount)
      .bind(line.unit_price)
      .fetch_one(&mut *conn)
      .await?;
      created.lines.push(stored);
    }
    Ok(created)
  }

  async fn update(&mut self, order: &Order) -> BazaarResult<Order> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let updated = sqlx::query_as::<_, Order>(&format!(
      "UPDATE orders SET status = $2, total_value = $3 WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    ))
    .bind(order.id)
    .bind(order.status)
    .bind(order.total_value)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| BazaarError::not_found("order", order.id))?;
    let mut with_lines = Self::attach_lines(conn, vec![updated]).await?;
    with_lines.pop().ok_or_else(|| BazaarError::not_found("order", order.id))
  }

  async fn delete(&mut self, id: Uuid) -> BazaarResult<bool> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let result = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(&mut *conn).await?;
    Ok(result.rows_affected() > 0)
  }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
  async fn find_created_between(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> BazaarResult<Vec<Order>> {
    self
      .fetch("WHERE created_at >= $1 AND created_at <= $2", None, Some((from, to)))
      .await
  }

  async fn find_for_update(&mut self, id: Uuid) -> BazaarResult<Option<Order>> {
    let mut guard = self.tx.lock().await;
    let conn = active(&mut guard)?;
    let locked = sqlx::query_as::<_, Order>(&format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS))
      .bind(id)
      .fetch_optional(&mut *conn)
      .await?;
    match locked {
      Some(order) => Ok(Self::attach_lines(conn, vec![order]).await?.pop()),
      None => Ok(None),
    }
  }
}

/// Store backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  #[instrument(name = "PgStore::connect", skip(database_url), err(Display))]
  pub async fn connect(database_url: &str, max_connections: u32) -> BazaarResult<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(max_connections)
      .connect(database_url)
      .await?;
    info!("Connected to PostgreSQL.");
    Ok(Self { pool })
  }

  /// Applies the bundled migrations.
  pub async fn migrate(&self) -> BazaarResult<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .map_err(|e| BazaarError::Infrastructure(format!("migration failed: {}", e)))?;
    info!("Database migrations applied.");
    Ok(())
  }
}

#[async_trait]
impl Store for PgStore {
  async fn begin(&self) -> BazaarResult<Box<dyn UnitOfWork>> {
    let tx = self.pool.begin().await?;
    debug!("PostgreSQL transaction started.");
    Ok(Box::new(PgUnitOfWork {
      tx: Arc::new(Mutex::new(Some(tx))),
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
    "postgres"
  }
}

pub struct PgUnitOfWork {
  tx: SharedTx,
  categories: Option<PgRepo<Category>>,
  products: Option<PgRepo<Product>>,
  orders: Option<PgOrderRepository>,
  users: Option<PgRepo<User>>,
  affiliates: Option<PgRepo<Affiliate>>,
  workdays: Option<PgRepo<WorkDay>>,
  carts: Option<PgRepo<ShoppingCart>>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
  fn categories(&mut self) -> &mut dyn CategoryRepository {
    self.categories.get_or_insert_with(|| PgRepo::new(self.tx.clone()))
  }

  fn products(&mut self) -> &mut dyn ProductRepository {
    self.products.get_or_insert_with(|| PgRepo::new(self.tx.clone()))
  }

  fn orders(&mut self) -> &mut dyn OrderRepository {
    self.orders.get_or_insert_with(|| PgOrderRepository { tx: self.tx.clone() })
  }

  fn users(&mut self) -> &mut dyn UserRepository {
    self.users.get_or_insert_with(|| PgRepo::new(self.tx.clone()))
  }

  fn affiliates(&mut self) -> &mut dyn AffiliateRepository {
    self.affiliates.get_or_insert_with(|| PgRepo::new(self.tx.clone()))
  }

  fn workdays(&mut self) -> &mut dyn WorkDayRepository {
    self.workdays.get_or_insert_with(|| PgRepo::new(self.tx.clone()))
  }

  fn carts(&mut self) -> &mut dyn CartRepository {
    self.carts.get_or_insert_with(|| PgRepo::new(self.tx.clone()))
  }

  async fn commit_changes(self: Box<Self>) -> BazaarResult<()> {
    let tx = self
      .tx
      .lock()
      .await
      .take()
      .ok_or_else(|| BazaarError::Infrastructure("transaction already finished".to_string()))?;
    tx.commit().await?;
    debug!("PostgreSQL transaction committed.");
    Ok(())
  }
}
