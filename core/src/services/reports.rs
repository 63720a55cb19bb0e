// bazaar/src/services/reports.rs

use crate::error::{BazaarError, BazaarResult};
use crate::models::requests::ReportRequestPayload;
use crate::reports::{GeneratePosReportEvent, ReportQueue, ReportStatus, ReportStore, ReportType, StoredDocument};
use crate::services::orders::OrderService;
use crate::services::workdays::WorkDayService;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// What callers see of a report request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportState {
  pub event_id: Uuid,
  pub report_type: ReportType,
  pub status: ReportStatus,
  pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ReportService {
  orders: OrderService,
  workdays: WorkDayService,
  queue: Arc<dyn ReportQueue>,
  store: Arc<ReportStore>,
}

impl ReportService {
  pub fn new(
    orders: OrderService,
    workdays: WorkDayService,
    queue: Arc<dyn ReportQueue>,
    store: Arc<ReportStore>,
  ) -> Self {
    Self {
      orders,
      workdays,
      queue,
      store,
    }
  }

  /// Snapshots orders and work days of the range and enqueues the render. The
  /// returned event id is the handle for status and download.
  #[instrument(name = "ReportService::request_report", skip(self, payload), fields(report_type = %payload.report_type), err(Display))]
  pub async fn request_report(&self, payload: ReportRequestPayload) -> BazaarResult<Uuid> {
    payload.validate()?;
    let order_report = self.orders.order_report_data(payload.from, payload.to).await?;
    let workday_report = self.workdays.workday_report_data(payload.from, payload.to).await?;
    let event_id = Uuid::new_v4();
    self.store.mark_queued(event_id, payload.report_type);
    self
      .queue
      .publish(GeneratePosReportEvent {
        event_id,
        report_type: payload.report_type,
        order_report,
        workday_report,
      })
      .await
      .inspect_err(|e| self.store.mark_failed(event_id, payload.report_type, e.to_string()))?;
    info!(%event_id, "Report queued.");
    Ok(event_id)
  }

  pub fn status(&self, event_id: Uuid) -> BazaarResult<ReportState> {
    self
      .store
      .record(event_id)
      .map(|record| ReportState {
        event_id: record.event_id,
        report_type: record.report_type,
        status: record.status,
        updated_at: record.updated_at,
      })
      .ok_or_else(|| BazaarError::not_found("report", event_id))
  }

  /// The finished document. Unknown ids are NotFound, unfinished ones a DomainRule.
  pub fn document(&self, event_id: Uuid) -> BazaarResult<StoredDocument> {
    let record = self
      .store
      .record(event_id)
      .ok_or_else(|| BazaarError::not_found("report", event_id))?;
    match (record.status, record.document) {
      (ReportStatus::Completed, Some(document)) => Ok(document),
      (status, _) => Err(BazaarError::DomainRule(format!(
        "report {} has no document, its status is {:?}",
        event_id, status
      ))),
    }
  }

  /// Cancels a report that is queued or being rendered.
  #[instrument(name = "ReportService::cancel", skip(self), err(Display))]
  pub fn cancel(&self, event_id: Uuid) -> BazaarResult<()> {
    if self.store.record(event_id).is_none() {
      return Err(BazaarError::not_found("report", event_id));
    }
    if !self.store.cancel(event_id) {
      return Err(BazaarError::DomainRule(format!(
        "report {} is no longer queued or being generated",
        event_id
      )));
    }
    info!(%event_id, "Report cancellation requested.");
    Ok(())
  }

  /// Forgets finished reports older than `retention`.
  pub fn purge_finished(&self, retention: Duration) {
    self.store.purge_finished(retention);
  }
}
