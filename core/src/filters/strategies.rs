// bazaar/src/filters/strategies.rs

use crate::filters::{FilterParams, FilterStrategy};
use crate::models::{Affiliate, Category, Order, Product, User, WorkDay};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use uuid::Uuid;

/// Items with a display name.
pub trait Named {
  fn id(&self) -> Uuid;
  fn name(&self) -> &str;
}

/// Items placed on a timeline.
pub trait Dated {
  fn id(&self) -> Uuid;
  fn moment(&self) -> DateTime<Utc>;
}

macro_rules! named {
  ($($ty:ty),*) => {
    $(impl Named for $ty {
      fn id(&self) -> Uuid {
        self.id
      }
      fn name(&self) -> &str {
        &self.name
      }
    })*
  };
}

named!(Category, Product, User, Affiliate);

impl Dated for Order {
  fn id(&self) -> Uuid {
    self.id
  }
  fn moment(&self) -> DateTime<Utc> {
    self.created_at
  }
}

impl Dated for WorkDay {
  fn id(&self) -> Uuid {
    self.id
  }
  fn moment(&self) -> DateTime<Utc> {
    self.started_at
  }
}

fn by_name<T: Named>(a: &T, b: &T) -> Ordering {
  a.name()
    .to_lowercase()
    .cmp(&b.name().to_lowercase())
    .then(a.id().cmp(&b.id()))
}

fn select<T: Clone>(items: &[T], keep: impl Fn(&T) -> bool, order: impl Fn(&T, &T) -> Ordering) -> Vec<T> {
  let mut selected: Vec<T> = items.iter().filter(|item| keep(item)).cloned().collect();
  selected.sort_by(|a, b| order(a, b));
  selected
}

/// Case-insensitive substring match on the name, A to Z.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameFilter;

impl<T: Named + Clone + Send + Sync> FilterStrategy<T> for NameFilter {
  fn key(&self) -> &'static str {
    "name"
  }

  fn apply(&self, items: &[T], params: &FilterParams) -> Vec<T> {
    let needle = params.name.as_deref().map(str::to_lowercase);
    select(
      items,
      |item| match &needle {
        Some(needle) => item.name().to_lowercase().contains(needle.as_str()),
        None => true,
      },
      by_name,
    )
  }
}

/// Inclusive `from ..= to` on the calendar date, either bound optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateFilter;

impl<T: Dated + Clone + Send + Sync> FilterStrategy<T> for DateFilter {
  fn key(&self) -> &'static str {
    "date"
  }

  fn apply(&self, items: &[T], params: &FilterParams) -> Vec<T> {
    select(
      items,
      |item| {
        let day = item.moment().date_naive();
        params.from.map_or(true, |from| day >= from) && params.to.map_or(true, |to| day <= to)
      },
      |a, b| a.moment().cmp(&b.moment()).then(a.id().cmp(&b.id())),
    )
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PriceFilter;

impl FilterStrategy<Product> for PriceFilter {
  fn key(&self) -> &'static str {
    "price"
  }

  fn apply(&self, items: &[Product], params: &FilterParams) -> Vec<Product> {
    select(
      items,
      |p| params.value.map_or(true, |v| params.comparator.holds(&p.price, &v)),
      |a, b| a.price.cmp(&b.price).then(a.id.cmp(&b.id)),
    )
  }
}

/// Orders with the given status, oldest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusFilter;

impl FilterStrategy<Order> for StatusFilter {
  fn key(&self) -> &'static str {
    "status"
  }

  fn apply(&self, items: &[Order], params: &FilterParams) -> Vec<Order> {
    select(
      items,
      |o| params.status.map_or(true, |s| o.status == s),
      |a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
    )
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValueFilter;

impl FilterStrategy<Order> for ValueFilter {
  fn key(&self) -> &'static str {
    "value"
  }

  fn apply(&self, items: &[Order], params: &FilterParams) -> Vec<Order> {
    select(
      items,
      |o| params.value.map_or(true, |v| params.comparator.holds(&o.total_value, &v)),
      |a, b| a.total_value.cmp(&b.total_value).then(a.id.cmp(&b.id)),
    )
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoleFilter;

impl FilterStrategy<User> for RoleFilter {
  fn key(&self) -> &'static str {
    "role"
  }

  fn apply(&self, items: &[User], params: &FilterParams) -> Vec<User> {
    select(items, |u| params.role.map_or(true, |r| u.role == r), by_name)
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PointsFilter;

impl FilterStrategy<Affiliate> for PointsFilter {
  fn key(&self) -> &'static str {
    "points"
  }

  fn apply(&self, items: &[Affiliate], params: &FilterParams) -> Vec<Affiliate> {
    select(
      items,
      |a| {
        params
          .value
          .map_or(true, |v| params.comparator.holds(&Decimal::from(a.points), &v))
      },
      |a, b| a.points.cmp(&b.points).then(a.id.cmp(&b.id)),
    )
  }
}
