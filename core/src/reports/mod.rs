// bazaar/src/reports/mod.rs

//! Point-of-sale reports: data snapshots, document generators selected by
//! [`ReportType`], and the queue that renders them in the background.

pub mod consumer;
pub mod excel;
pub mod pdf;
pub mod queue;

use crate::error::{BazaarError, BazaarResult};
use crate::models::OrderStatus;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use consumer::ReportConsumer;
pub use excel::ExcelReportGenerator;
pub use pdf::PdfReportGenerator;
pub use queue::{
  ChannelReportQueue, GeneratePosReportEvent, ReportGenerated, ReportQueue, ReportRecord, ReportStatus, ReportStore,
  StoredDocument,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportType {
  #[serde(rename = "POS_PDF")]
  PosPdf,
  #[serde(rename = "POS_EXCEL")]
  PosExcel,
}

impl ReportType {
  pub fn wire_name(self) -> &'static str {
    match self {
      ReportType::PosPdf => "POS_PDF",
      ReportType::PosExcel => "POS_EXCEL",
    }
  }
}

impl fmt::Display for ReportType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.wire_name())
  }
}

impl std::str::FromStr for ReportType {
  type Err = BazaarError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "POS_PDF" => Ok(ReportType::PosPdf),
      "POS_EXCEL" => Ok(ReportType::PosExcel),
      _ => Err(BazaarError::UnknownStrategy(s.to_string())),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
  pub id: Uuid,
  pub created_at: DateTime<Utc>,
  pub status: OrderStatus,
  pub line_count: usize,
  pub total_value: Decimal,
}

/// Orders created inside `[from, to]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReportData {
  pub from: NaiveDate,
  pub to: NaiveDate,
  pub orders: Vec<OrderSummary>,
  /// Sum over orders that were not cancelled.
  pub total_value: Decimal,
}

impl OrderReportData {
  pub fn count_by_status(&self) -> HashMap<OrderStatus, usize> {
    let mut counts = HashMap::new();
    for order in &self.orders {
      *counts.entry(order.status).or_insert(0) += 1;
    }
    counts
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeHours {
  pub employee_id: Uuid,
  pub employee_name: String,
  pub shifts: usize,
  pub hours: Decimal,
}

/// Hours worked per employee for shifts started inside `[from, to]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkdayReportData {
  pub from: NaiveDate,
  pub to: NaiveDate,
  pub employees: Vec<EmployeeHours>,
  pub total_hours: Decimal,
}

#[async_trait]
pub trait ReportGenerator: Send + Sync {
  fn report_type(&self) -> ReportType;

  fn content_type(&self) -> &'static str;

  fn file_extension(&self) -> &'static str;

  /// Renders the document. A cancelled run returns [`BazaarError::Cancelled`] and
  /// never a partial document.
  async fn generate(
    &self,
    orders: &OrderReportData,
    workdays: &WorkdayReportData,
    cancel: &CancellationToken,
  ) -> BazaarResult<Vec<u8>>;
}

/// Waits `delay` unless `cancel` fires first.
pub(crate) async fn simulated_delay(delay: Duration, cancel: &CancellationToken) -> BazaarResult<()> {
  tokio::select! {
    biased;
    _ = cancel.cancelled() => Err(BazaarError::Cancelled),
    _ = tokio::time::sleep(delay) => Ok(()),
  }
}

/// Generators keyed by report type.
pub struct ReportFactory {
  generators: HashMap<ReportType, Arc<dyn ReportGenerator>>,
}

impl ReportFactory {
  pub fn new() -> Self {
    Self {
      generators: HashMap::new(),
    }
  }

  /// PDF and Excel generators sharing the same simulated delay.
  pub fn with_defaults(delay: Duration) -> Self {
    Self::new()
      .register(PdfReportGenerator::new(delay))
      .register(ExcelReportGenerator::new(delay))
  }

  pub fn register(mut self, generator: impl ReportGenerator + 'static) -> Self {
    self.generators.insert(generator.report_type(), Arc::new(generator));
    self
  }

  pub fn get_generator(&self, report_type: ReportType) -> BazaarResult<Arc<dyn ReportGenerator>> {
    self
      .generators
      .get(&report_type)
      .cloned()
      .ok_or_else(|| BazaarError::UnknownStrategy(report_type.to_string()))
  }
}

impl Default for ReportFactory {
  fn default() -> Self {
    Self::new()
  }
}

pub(crate) fn status_label(status: OrderStatus) -> &'static str {
  match status {
    OrderStatus::Pending => "pending",
    OrderStatus::Processing => "processing",
    OrderStatus::Finished => "finished",
    OrderStatus::Cancelled => "cancelled",
  }
}
