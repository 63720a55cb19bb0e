// bazaar/src/filters/mod.rs

//! List filtering: strategies selected by name from per-resource factories.

pub mod query;
pub mod strategies;

use crate::error::{BazaarError, BazaarResult};
use crate::models::{Affiliate, Category, Order, OrderStatus, Product, Role, User, WorkDay};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

pub use query::{ListQuery, Page, PageRequest};
pub use strategies::{
  DateFilter, NameFilter, PointsFilter, PriceFilter, RoleFilter, StatusFilter, ValueFilter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comparator {
  Greater,
  #[default]
  Equal,
  Less,
}

impl Comparator {
  /// Case-insensitive `greater` / `equal` / `less`.
  pub fn parse(token: &str) -> BazaarResult<Self> {
    match token.trim().to_ascii_lowercase().as_str() {
      "greater" => Ok(Comparator::Greater),
      "equal" => Ok(Comparator::Equal),
      "less" => Ok(Comparator::Less),
      other => Err(BazaarError::IncorrectFormat(format!(
        "unknown comparator '{}', expected greater, equal or less",
        other
      ))),
    }
  }

  pub fn holds<T: PartialOrd>(self, left: &T, right: &T) -> bool {
    match self {
      Comparator::Greater => left > right,
      Comparator::Equal => left == right,
      Comparator::Less => left < right,
    }
  }
}

/// Parameters shared by every strategy. Each strategy reads only its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParams {
  pub name: Option<String>,
  pub comparator: Comparator,
  pub value: Option<Decimal>,
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
  pub status: Option<OrderStatus>,
  pub role: Option<Role>,
}

pub trait FilterStrategy<T>: Send + Sync {
  /// Registration key, lower case.
  fn key(&self) -> &'static str;

  /// Returns the matching items sorted by the strategy's own key, ties by id.
  /// Without its parameter every item matches.
  fn apply(&self, items: &[T], params: &FilterParams) -> Vec<T>;
}

/// Strategies for one resource, keyed by lower-cased name.
pub struct FilterFactory<T> {
  strategies: HashMap<&'static str, Arc<dyn FilterStrategy<T>>>,
}

impl<T> FilterFactory<T> {
  pub fn new() -> Self {
    Self {
      strategies: HashMap::new(),
    }
  }

  pub fn register(mut self, strategy: impl FilterStrategy<T> + 'static) -> Self {
    self.strategies.insert(strategy.key(), Arc::new(strategy));
    self
  }

  pub fn get_strategy(&self, name: &str) -> BazaarResult<Arc<dyn FilterStrategy<T>>> {
    self
      .strategies
      .get(name.trim().to_ascii_lowercase().as_str())
      .cloned()
      .ok_or_else(|| BazaarError::UnknownStrategy(name.to_string()))
  }

  pub fn keys(&self) -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = self.strategies.keys().copied().collect();
    keys.sort_unstable();
    keys
  }
}

impl<T> Default for FilterFactory<T> {
  fn default() -> Self {
    Self::new()
  }
}

/// The registration table of every filterable resource, built once at startup.
pub struct Filters {
  pub categories: FilterFactory<Category>,
  pub products: FilterFactory<Product>,
  pub orders: FilterFactory<Order>,
  pub users: FilterFactory<User>,
  pub affiliates: FilterFactory<Affiliate>,
  pub workdays: FilterFactory<WorkDay>,
}

impl Filters {
  pub fn new() -> Self {
    Self {
      categories: FilterFactory::new().register(NameFilter),
      products: FilterFactory::new().register(NameFilter).register(PriceFilter),
      orders: FilterFactory::new()
        .register(DateFilter)
        .register(StatusFilter)
        .register(ValueFilter),
      users: FilterFactory::new().register(NameFilter).register(RoleFilter),
      affiliates: FilterFactory::new().register(NameFilter).register(PointsFilter),
      workdays: FilterFactory::new().register(DateFilter),
    }
  }
}

impl Default for Filters {
  fn default() -> Self {
    Self::new()
  }
}

/// A resource that list endpoints can filter and page.
pub trait Listable: Clone + Send + Sync + 'static {
  fn factory(filters: &Filters) -> &FilterFactory<Self>;

  /// Order used when no filter is requested.
  fn default_sort(items: &mut [Self]);
}

impl Listable for Category {
  fn factory(filters: &Filters) -> &FilterFactory<Self> {
    &filters.categories
  }
  fn default_sort(items: &mut [Self]) {
    items.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.id.cmp(&b.id)));
  }
}

impl Listable for Product {
  fn factory(filters: &Filters) -> &FilterFactory<Self> {
    &filters.products
  }
  fn default_sort(items: &mut [Self]) {
    items.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.id.cmp(&b.id)));
  }
}

impl Listable for Order {
  fn factory(filters: &Filters) -> &FilterFactory<Self> {
    &filters.orders
  }
  fn default_sort(items: &mut [Self]) {
    items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
  }
}

impl Listable for User {
  fn factory(filters: &Filters) -> &FilterFactory<Self> {
    &filters.users
  }
  fn default_sort(items: &mut [Self]) {
    items.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.id.cmp(&b.id)));
  }
}

impl Listable for Affiliate {
  fn factory(filters: &Filters) -> &FilterFactory<Self> {
    &filters.affiliates
  }
  fn default_sort(items: &mut [Self]) {
    items.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.id.cmp(&b.id)));
  }
}

impl Listable for WorkDay {
  fn factory(filters: &Filters) -> &FilterFactory<Self> {
    &filters.workdays
  }
  fn default_sort(items: &mut [Self]) {
    items.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
  }
}

/// Applies the requested filter (or the default order) and cuts out the page.
pub fn filter_and_page<T: Listable>(filters: &Filters, items: Vec<T>, query: &ListQuery) -> BazaarResult<Page<T>> {
  let params = query.params()?;
  let page_request = query.page_request()?;
  let selected = match query.filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
    Some(name) => T::factory(filters).get_strategy(name)?.apply(&items, &params),
    None => {
      let mut all = items;
      T::default_sort(&mut all);
      all
    }
  };
  Ok(Page::slice(selected, page_request))
}
