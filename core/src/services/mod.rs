// bazaar/src/services/mod.rs

//! Application services. Each one is a cheap handle over a shared
//! [`ServiceContext`] composed once at startup.

pub mod affiliates;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod passwords;
pub mod reports;
pub mod seed;
pub mod users;
pub mod workdays;

use crate::cache::{cached, Cache};
use crate::error::BazaarResult;
use crate::filters::{filter_and_page, Filters, ListQuery, Listable, Page};
use crate::reports::{ReportQueue, ReportStore};
use crate::storage::{Store, UnitOfWork};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

pub use affiliates::AffiliateService;
pub use cart::{update_total_value_and_product_count, CartService};
pub use catalog::{CategoryService, ProductService};
pub use orders::OrderService;
pub use reports::{ReportService, ReportState};
pub use seed::{seed_database, SeedSummary};
pub use users::UserService;
pub use workdays::WorkDayService;

/// Per-user async mutexes serializing cart mutations inside the process.
///
/// An entry lives only while some task holds or waits for it.
#[derive(Default)]
pub struct CartLocks {
  locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

/// Held cart lock. Releasing the last handle removes the user's entry.
pub struct CartGuard<'a> {
  locks: &'a DashMap<Uuid, Arc<Mutex<()>>>,
  user_id: Uuid,
  guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for CartGuard<'_> {
  fn drop(&mut self) {
    drop(self.guard.take());
    self
      .locks
      .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
  }
}

impl CartLocks {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn lock(&self, user_id: Uuid) -> CartGuard<'_> {
    let lock = self.locks.entry(user_id).or_default().clone();
    let guard = lock.lock_owned().await;
    CartGuard {
      locks: &self.locks,
      user_id,
      guard: Some(guard),
    }
  }

  /// Number of users with a held or awaited lock.
  pub fn len(&self) -> usize {
    self.locks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.locks.is_empty()
  }
}

/// Everything a service needs.
pub struct ServiceContext {
  pub store: Arc<dyn Store>,
  pub cache: Arc<dyn Cache>,
  pub cart_locks: CartLocks,
  pub filters: Filters,
}

impl ServiceContext {
  pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>) -> Self {
    Self {
      store,
      cache,
      cart_locks: CartLocks::new(),
      filters: Filters::new(),
    }
  }

  pub async fn begin(&self) -> BazaarResult<Box<dyn UnitOfWork>> {
    self.store.begin().await
  }

  /// Drops every cached entry of the given resources. Called after a commit.
  pub async fn invalidate(&self, resources: &[&str]) {
    for resource in resources {
      self.cache.invalidate_prefix(resource).await;
    }
  }

  /// Loads the full list through the cache, then filters and pages it.
  pub(crate) async fn list<T, F, Fut>(&self, resource: &str, query: &ListQuery, load: F) -> BazaarResult<Page<T>>
  where
    T: Listable + Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = BazaarResult<Vec<T>>>,
  {
    // Reject bad paging before touching the store.
    query.page_request()?;
    let all = cached(self.cache.as_ref(), resource, load).await?;
    filter_and_page(&self.filters, all, query)
  }
}

/// All services of the application.
#[derive(Clone)]
pub struct Services {
  pub categories: CategoryService,
  pub products: ProductService,
  pub orders: OrderService,
  pub users: UserService,
  pub affiliates: AffiliateService,
  pub workdays: WorkDayService,
  pub carts: CartService,
  pub reports: ReportService,
}

impl Services {
  pub fn new(ctx: ServiceContext, report_queue: Arc<dyn ReportQueue>, report_store: Arc<ReportStore>) -> Self {
    let ctx = Arc::new(ctx);
    let orders = OrderService::new(ctx.clone());
    let workdays = WorkDayService::new(ctx.clone());
    Self {
      categories: CategoryService::new(ctx.clone()),
      products: ProductService::new(ctx.clone()),
      users: UserService::new(ctx.clone()),
      affiliates: AffiliateService::new(ctx.clone()),
      carts: CartService::new(ctx),
      reports: ReportService::new(orders.clone(), workdays.clone(), report_queue, report_store),
      orders,
      workdays,
    }
  }
}

/// `[from 00:00:00, to 23:59:59.999999]` in UTC.
pub(crate) fn day_range(from: NaiveDate, to: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
  let start = from.and_time(NaiveTime::MIN).and_utc();
  let end = to
    .and_hms_micro_opt(23, 59, 59, 999_999)
    .map(|t| t.and_utc())
    .unwrap_or(start);
  (start, end)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn cart_lock_entries_go_away_once_released() {
    let locks = Arc::new(CartLocks::new());
    let user_id = Uuid::new_v4();

    let held = locks.lock(user_id).await;
    assert_eq!(locks.len(), 1);

    let waiter = {
      let locks = locks.clone();
      tokio::spawn(async move {
        let _guard = locks.lock(user_id).await;
      })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    // Releasing while someone waits keeps the entry for the waiter.
    drop(held);
    waiter.await.unwrap();
    assert!(locks.is_empty());

    drop(locks.lock(Uuid::new_v4()).await);
    assert!(locks.is_empty());
  }
}
