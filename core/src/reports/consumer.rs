// bazaar/src/reports/consumer.rs

//! Background consumer of [`GeneratePosReportEvent`]s.
//!
//! Every event runs through the report pipeline:
//! `resolve_generator` → `render` → `persist` → `announce`.

use crate::error::{BazaarError, BazaarResult};
use crate::reports::queue::{GeneratePosReportEvent, ReportGenerated, ReportStore, StoredDocument};
use crate::reports::{ReportFactory, ReportGenerator};
use crate::workflow::{ContextData, Pipeline, PipelineControl, PipelineResult};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Working data of one report run.
pub struct ReportJob {
  pub event: GeneratePosReportEvent,
  pub cancel: CancellationToken,
  pub generator: Option<Arc<dyn ReportGenerator>>,
  pub document: Option<StoredDocument>,
  pub announced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
  Completed,
  Cancelled,
  /// The event id was already completed earlier.
  Duplicate,
  Failed(String),
}

pub struct ReportConsumer {
  store: Arc<ReportStore>,
  pipeline: Pipeline<ReportJob, BazaarError>,
}

fn build_pipeline(
  factory: Arc<ReportFactory>,
  store: Arc<ReportStore>,
  announcer: broadcast::Sender<ReportGenerated>,
) -> Pipeline<ReportJob, BazaarError> {
  let mut pipeline = Pipeline::<ReportJob, BazaarError>::new(&[
    ("resolve_generator", false, None),
    ("render", false, None),
    ("persist", false, None),
    ("announce", true, None),
  ]);

  pipeline.on_step("resolve_generator", move |ctx: ContextData<ReportJob>| {
    let factory = factory.clone();
    async move {
      let report_type = ctx.with(|job| job.event.report_type);
      let generator = factory.get_generator(report_type)?;
      ctx.write().generator = Some(generator);
      Ok::<_, BazaarError>(PipelineControl::Continue)
    }
  });

  let render_store = store.clone();
  pipeline.on_step("render", move |ctx: ContextData<ReportJob>| {
    let store = render_store.clone();
    async move {
      let (generator, event, cancel) = ctx.with(|job| (job.generator.clone(), job.event.clone(), job.cancel.clone()));
      let generator = generator.ok_or_else(|| BazaarError::Infrastructure("no generator resolved".to_string()))?;
      match generator
        .generate(&event.order_report, &event.workday_report, &cancel)
        .await
      {
        Ok(bytes) => {
          let file_name = format!("pos-report-{}.{}", event.event_id, generator.file_extension());
          ctx.write().document = Some(StoredDocument {
            bytes,
            content_type: generator.content_type(),
            file_name,
          });
          Ok::<_, BazaarError>(PipelineControl::Continue)
        }
        Err(BazaarError::Cancelled) => {
          warn!(event_id = %event.event_id, "Report rendering cancelled.");
          store.mark_cancelled(event.event_id, event.report_type);
          Ok(PipelineControl::Stop)
        }
        Err(e) => Err(e),
      }
    }
  });

  let persist_store = store;
  pipeline.on_step("persist", move |ctx: ContextData<ReportJob>| {
    let store = persist_store.clone();
    async move {
      let (event_id, report_type, document) =
        ctx.with(|job| (job.event.event_id, job.event.report_type, job.document.clone()));
      let document = document.ok_or_else(|| BazaarError::Infrastructure("no document rendered".to_string()))?;
      store.complete(event_id, report_type, document);
      Ok::<_, BazaarError>(PipelineControl::Continue)
    }
  });

  pipeline.on_step("announce", move |ctx: ContextData<ReportJob>| {
    let announcer = announcer.clone();
    async move {
      let (event_id, report_type) = ctx.with(|job| (job.event.event_id, job.event.report_type));
      let size_bytes = ctx.with(|job| job.document.as_ref().map_or(0, |d| d.bytes.len()));
      let generated = ReportGenerated {
        event_id,
        report_type,
        size_bytes,
        generated_at: Utc::now(),
      };
      // Nobody listening is fine.
      let delivered = announcer.send(generated).unwrap_or(0);
      ctx.write().announced = true;
      info!(%event_id, delivered, "Report announced.");
      Ok::<_, BazaarError>(PipelineControl::Continue)
    }
  });

  pipeline
}

impl ReportConsumer {
  pub fn new(
    factory: Arc<ReportFactory>,
    store: Arc<ReportStore>,
    announcer: broadcast::Sender<ReportGenerated>,
  ) -> Self {
    let pipeline = build_pipeline(factory, store.clone(), announcer);
    Self { store, pipeline }
  }

  /// Processes one event. Failures are recorded in the store, never returned.
  #[instrument(name = "ReportConsumer::handle", skip_all, fields(event_id = %event.event_id, report_type = %event.report_type))]
  pub async fn handle(&self, event: GeneratePosReportEvent, shutdown: &CancellationToken) -> ReportOutcome {
    let event_id: Uuid = event.event_id;
    let report_type = event.report_type;
    if self.store.is_completed(event_id) {
      info!("Report already generated, skipping redelivered event.");
      return ReportOutcome::Duplicate;
    }

    let Some(cancel) = self.store.start(event_id, report_type, shutdown) else {
      info!("Report was cancelled while queued, nothing to render.");
      return ReportOutcome::Cancelled;
    };
    let ctx = ContextData::new(ReportJob {
      event,
      cancel,
      generator: None,
      document: None,
      announced: false,
    });

    let result: BazaarResult<PipelineResult> = self.pipeline.run(ctx).await;
    match result {
      Ok(PipelineResult::Completed) => ReportOutcome::Completed,
      Ok(PipelineResult::Stopped) => ReportOutcome::Cancelled,
      Err(e) => {
        error!(error = %e, "Report pipeline failed.");
        self.store.mark_failed(event_id, report_type, e.to_string());
        ReportOutcome::Failed(e.to_string())
      }
    }
  }

  /// Consumes events until `shutdown` fires or every sender is gone.
  pub async fn run(self, mut receiver: mpsc::Receiver<GeneratePosReportEvent>, shutdown: CancellationToken) {
    info!("Report consumer started.");
    loop {
      tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
          info!("Report consumer shutting down.");
          break;
        }
        maybe_event = receiver.recv() => match maybe_event {
          Some(event) => {
            let outcome = self.handle(event, &shutdown).await;
            info!(?outcome, "Report event processed.");
          }
          None => {
            info!("Report queue closed, consumer stopping.");
            break;
          }
        }
      }
    }
  }
}
