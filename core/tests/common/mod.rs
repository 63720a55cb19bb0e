// tests/common/mod.rs
#![allow(dead_code)]

use bazaar::cache::MemoryCache;
use bazaar::models::requests::{CategoryPayload, CreateUserPayload, ProductPayload};
use bazaar::models::{Product, Role, UnitType, UserDto};
use bazaar::reports::{ChannelReportQueue, GeneratePosReportEvent, ReportStore};
use bazaar::storage::{InMemoryStore, Store};
use bazaar::{ServiceContext, Services};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;
use uuid::Uuid;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// Services over the in-memory store, plus handles tests want to poke at directly.
pub struct Fixture {
  pub services: Services,
  pub store: InMemoryStore,
  pub cache: Arc<MemoryCache>,
  pub report_store: Arc<ReportStore>,
  pub report_events: mpsc::Receiver<GeneratePosReportEvent>,
}

pub fn fixture() -> Fixture {
  setup_tracing();
  let store = InMemoryStore::new();
  let cache = Arc::new(MemoryCache::new(Duration::from_secs(60)));
  let (queue, report_events) = ChannelReportQueue::channel(16);
  let report_store = Arc::new(ReportStore::new());
  let ctx = ServiceContext::new(Arc::new(store.clone()) as Arc<dyn Store>, cache.clone());
  let services = Services::new(ctx, Arc::new(queue), report_store.clone());
  Fixture {
    services,
    store,
    cache,
    report_store,
    report_events,
  }
}

/// `Decimal` from a string literal such as `"3.50"`.
pub fn d(value: &str) -> Decimal {
  value.parse().unwrap()
}

impl Fixture {
  pub async fn user(&self, name: &str, role: Role) -> UserDto {
    self
      .services
      .users
      .create(CreateUserPayload {
        name: name.to_string(),
        email: format!("{}-{}@bazaar.test", name.to_lowercase().replace(' ', "."), Uuid::new_v4().simple()),
        password: "s3cret-password".to_string(),
        role,
      })
      .await
      .unwrap()
  }

  pub async fn customer(&self) -> UserDto {
    self.user("Carla Customer", Role::Customer).await
  }

  pub async fn category(&self, name: &str) -> Uuid {
    self
      .services
      .categories
      .create(CategoryPayload {
        id: None,
        name: name.to_string(),
        description: format!("{} department", name),
      })
      .await
      .unwrap()
      .id
  }

  pub async fn product(&self, name: &str, price: &str, unit_type: UnitType, stock: &str) -> Product {
    let category_id = match self.services.categories.list(&Default::default()).await.unwrap().items.first() {
      Some(category) => category.id,
      None => self.category("General").await,
    };
    self.product_in(category_id, name, price, unit_type, stock).await
  }

  pub async fn product_in(
    &self,
    category_id: Uuid,
    name: &str,
    price: &str,
    unit_type: UnitType,
    stock: &str,
  ) -> Product {
    self
      .services
      .products
      .create(ProductPayload {
        id: None,
        name: name.to_string(),
        description: String::new(),
        price: d(price),
        unit_type,
        stock: d(stock),
        category_id,
        image_url: None,
      })
      .await
      .unwrap()
  }
}
