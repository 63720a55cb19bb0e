// bazaar/src/filters/query.rs

use crate::error::{BazaarError, BazaarResult};
use crate::filters::{Comparator, FilterParams};
use crate::models::{OrderStatus, Role};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query string of every list endpoint: `filter=<key>`, the strategy
/// parameters and paging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
  pub filter: Option<String>,
  pub name: Option<String>,
  pub comparator: Option<String>,
  pub value: Option<Decimal>,
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
  pub status: Option<String>,
  pub role: Option<String>,
  pub page: Option<u32>,
  pub page_size: Option<u32>,
}

impl ListQuery {
  pub fn with_filter(filter: &str) -> Self {
    Self {
      filter: Some(filter.to_string()),
      ..Self::default()
    }
  }

  pub fn params(&self) -> BazaarResult<FilterParams> {
    let comparator = match self.comparator.as_deref() {
      Some(token) => Comparator::parse(token)?,
      None => Comparator::default(),
    };
    let status = self
      .status
      .as_deref()
      .map(|s| OrderStatus::parse(s).ok_or_else(|| BazaarError::IncorrectFormat(format!("unknown order status '{}'", s))))
      .transpose()?;
    let role = self
      .role
      .as_deref()
      .map(|r| Role::parse(r).ok_or_else(|| BazaarError::IncorrectFormat(format!("unknown role '{}'", r))))
      .transpose()?;
    Ok(FilterParams {
      name: self.name.clone().filter(|n| !n.is_empty()),
      comparator,
      value: self.value,
      from: self.from,
      to: self.to,
      status,
      role,
    })
  }

  pub fn page_request(&self) -> BazaarResult<PageRequest> {
    let page = self.page.unwrap_or(1);
    let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page < 1 {
      return Err(BazaarError::validation("page: must be at least 1"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
      return Err(BazaarError::validation(format!(
        "page_size: must be between 1 and {}",
        MAX_PAGE_SIZE
      )));
    }
    Ok(PageRequest { page, page_size })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub page: u32,
  pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub page: u32,
  pub page_size: u32,
  pub total: usize,
}

impl<T> Page<T> {
  pub fn slice(all: Vec<T>, request: PageRequest) -> Self {
    let total = all.len();
    let skip = ((request.page - 1) as usize).saturating_mul(request.page_size as usize);
    let items = all.into_iter().skip(skip).take(request.page_size as usize).collect();
    Page {
      items,
      page: request.page,
      page_size: request.page_size,
      total,
    }
  }

  pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
    Page {
      items: self.items.into_iter().map(f).collect(),
      page: self.page,
      page_size: self.page_size,
      total: self.total,
    }
  }
}
