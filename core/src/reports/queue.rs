// bazaar/src/reports/queue.rs

use crate::error::{BazaarError, BazaarResult};
use crate::reports::{OrderReportData, ReportType, WorkdayReportData};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Request to render one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratePosReportEvent {
  pub event_id: Uuid,
  pub report_type: ReportType,
  pub order_report: OrderReportData,
  pub workday_report: WorkdayReportData,
}

/// Published after a report has been stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportGenerated {
  pub event_id: Uuid,
  pub report_type: ReportType,
  pub size_bytes: usize,
  pub generated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReportQueue: Send + Sync {
  async fn publish(&self, event: GeneratePosReportEvent) -> BazaarResult<()>;
}

/// In-process queue over a bounded `mpsc` channel.
#[derive(Clone)]
pub struct ChannelReportQueue {
  sender: mpsc::Sender<GeneratePosReportEvent>,
}

impl ChannelReportQueue {
  pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<GeneratePosReportEvent>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (Self { sender }, receiver)
  }
}

#[async_trait]
impl ReportQueue for ChannelReportQueue {
  async fn publish(&self, event: GeneratePosReportEvent) -> BazaarResult<()> {
    let event_id = event.event_id;
    self
      .sender
      .send(event)
      .await
      .map_err(|_| BazaarError::Infrastructure("report queue is closed".to_string()))?;
    debug!(%event_id, "Report event published.");
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum ReportStatus {
  Queued,
  Processing,
  Completed,
  Cancelled,
  Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
  pub bytes: Vec<u8>,
  pub content_type: &'static str,
  pub file_name: String,
}

#[derive(Debug, Clone)]
pub struct ReportRecord {
  pub event_id: Uuid,
  pub report_type: ReportType,
  pub status: ReportStatus,
  pub updated_at: DateTime<Utc>,
  pub document: Option<StoredDocument>,
}

/// Status and finished documents per event id, plus the cancellation handles of
/// reports that are queued or being rendered.
#[derive(Default)]
pub struct ReportStore {
  records: DashMap<Uuid, ReportRecord>,
  cancels: DashMap<Uuid, CancellationToken>,
}

impl ReportStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn set_status(&self, event_id: Uuid, report_type: ReportType, status: ReportStatus) {
    let now = Utc::now();
    self
      .records
      .entry(event_id)
      .and_modify(|record| {
        record.status = status.clone();
        record.updated_at = now;
      })
      .or_insert_with(|| ReportRecord {
        event_id,
        report_type,
        status: status.clone(),
        updated_at: now,
        document: None,
      });
  }

  /// Records the request and registers its cancellation handle.
  pub fn mark_queued(&self, event_id: Uuid, report_type: ReportType) {
    self.cancels.insert(event_id, CancellationToken::new());
    self.set_status(event_id, report_type, ReportStatus::Queued);
  }

  /// Registers the job as running and returns the token that cancels it, or
  /// `None` when the report was cancelled while it waited in the queue.
  pub fn start(&self, event_id: Uuid, report_type: ReportType, parent: &CancellationToken) -> Option<CancellationToken> {
    let token = parent.child_token();
    let cancelled_while_queued = match self.cancels.entry(event_id) {
      Entry::Occupied(queued) if queued.get().is_cancelled() => {
        queued.remove();
        true
      }
      Entry::Occupied(mut queued) => {
        queued.insert(token.clone());
        false
      }
      Entry::Vacant(slot) => {
        slot.insert(token.clone());
        false
      }
    };
    if cancelled_while_queued {
      self.set_status(event_id, report_type, ReportStatus::Cancelled);
      return None;
    }
    self.set_status(event_id, report_type, ReportStatus::Processing);
    Some(token)
  }

  pub fn complete(&self, event_id: Uuid, report_type: ReportType, document: StoredDocument) {
    self.cancels.remove(&event_id);
    let now = Utc::now();
    let mut record = self.records.entry(event_id).or_insert_with(|| ReportRecord {
      event_id,
      report_type,
      status: ReportStatus::Completed,
      updated_at: now,
      document: None,
    });
    record.status = ReportStatus::Completed;
    record.updated_at = now;
    record.document = Some(document);
  }

  pub fn mark_cancelled(&self, event_id: Uuid, report_type: ReportType) {
    self.cancels.remove(&event_id);
    self.set_status(event_id, report_type, ReportStatus::Cancelled);
  }

  pub fn mark_failed(&self, event_id: Uuid, report_type: ReportType, reason: String) {
    self.cancels.remove(&event_id);
    warn!(%event_id, %reason, "Report generation failed.");
    self.set_status(event_id, report_type, ReportStatus::Failed(reason));
  }

  /// Cancels a queued or rendering report. Returns false when it is neither.
  pub fn cancel(&self, event_id: Uuid) -> bool {
    let Some(token) = self.cancels.get(&event_id) else {
      return false;
    };
    token.cancel();
    if let Some(mut record) = self.records.get_mut(&event_id) {
      // The consumer drops a cancelled queued job when it reaches it.
      if record.status == ReportStatus::Queued {
        record.status = ReportStatus::Cancelled;
        record.updated_at = Utc::now();
      }
    }
    true
  }

  pub fn is_completed(&self, event_id: Uuid) -> bool {
    self
      .records
      .get(&event_id)
      .map_or(false, |r| r.status == ReportStatus::Completed)
  }

  pub fn record(&self, event_id: Uuid) -> Option<ReportRecord> {
    self.records.get(&event_id).map(|r| r.clone())
  }

  pub fn document(&self, event_id: Uuid) -> Option<StoredDocument> {
    self.records.get(&event_id).and_then(|r| r.document.clone())
  }

  /// Drops completed, cancelled and failed records last touched more than
  /// `retention` ago, documents included.
  pub fn purge_finished(&self, retention: Duration) {
    let Ok(retention) = chrono::Duration::from_std(retention) else {
      return;
    };
    let cutoff = Utc::now() - retention;
    let before = self.records.len();
    self.records.retain(|_, record| {
      matches!(record.status, ReportStatus::Queued | ReportStatus::Processing) || record.updated_at > cutoff
    });
    let purged = before.saturating_sub(self.records.len());
    if purged > 0 {
      debug!(purged, "Purged finished report records.");
    }
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}
