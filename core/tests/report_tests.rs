// tests/report_tests.rs
mod common;

use bazaar::models::requests::ReportRequestPayload;
use bazaar::models::{OrderStatus, Role, UnitType};
use bazaar::reports::consumer::ReportOutcome;
use bazaar::reports::{
  ExcelReportGenerator, GeneratePosReportEvent, OrderReportData, OrderSummary, PdfReportGenerator, ReportConsumer,
  ReportFactory, ReportGenerated, ReportGenerator, ReportStatus, ReportStore, ReportType, StoredDocument,
  WorkdayReportData,
};
use bazaar::BazaarError;
use chrono::{NaiveDate, Utc};
use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn sample_data() -> (OrderReportData, WorkdayReportData) {
  let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
  let orders = OrderReportData {
    from: day,
    to: day,
    orders: vec![OrderSummary {
      id: Uuid::new_v4(),
      created_at: Utc::now(),
      status: OrderStatus::Finished,
      line_count: 2,
      total_value: d("27.00"),
    }],
    total_value: d("27.00"),
  };
  let workdays = WorkdayReportData {
    from: day,
    to: day,
    employees: Vec::new(),
    total_hours: d("0"),
  };
  (orders, workdays)
}

fn event(report_type: ReportType) -> GeneratePosReportEvent {
  let (order_report, workday_report) = sample_data();
  GeneratePosReportEvent {
    event_id: Uuid::new_v4(),
    report_type,
    order_report,
    workday_report,
  }
}

fn consumer(delay: Duration) -> (ReportConsumer, Arc<ReportStore>, broadcast::Receiver<ReportGenerated>) {
  let store = Arc::new(ReportStore::new());
  let (announcer, announcements) = broadcast::channel(8);
  let consumer = ReportConsumer::new(Arc::new(ReportFactory::with_defaults(delay)), store.clone(), announcer);
  (consumer, store, announcements)
}

async fn wait_for_status(store: &ReportStore, event_id: Uuid, wanted: ReportStatus) {
  for _ in 0..400 {
    if store.record(event_id).map(|r| r.status) == Some(wanted.clone()) {
      return;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  panic!("report {} never reached {:?}", event_id, wanted);
}

#[test]
fn factory_resolves_by_report_type() {
  let factory = ReportFactory::with_defaults(Duration::ZERO);
  let pdf = factory.get_generator(ReportType::PosPdf).unwrap();
  assert_eq!(pdf.report_type(), ReportType::PosPdf);
  assert_eq!(pdf.content_type(), "application/pdf");
  assert_eq!(factory.get_generator(ReportType::PosExcel).unwrap().file_extension(), "xml");

  let pdf_only = ReportFactory::new().register(PdfReportGenerator::new(Duration::ZERO));
  assert!(matches!(
    pdf_only.get_generator(ReportType::PosExcel),
    Err(BazaarError::UnknownStrategy(_))
  ));

  assert_eq!("pos_excel".parse::<ReportType>().unwrap(), ReportType::PosExcel);
  assert_eq!(serde_json::to_string(&ReportType::PosPdf).unwrap(), "\"POS_PDF\"");
}

#[tokio::test]
async fn pdf_output_is_a_complete_document() {
  let (orders, workdays) = sample_data();
  let bytes = PdfReportGenerator::new(Duration::ZERO)
    .generate(&orders, &workdays, &CancellationToken::new())
    .await
    .unwrap();
  let text = String::from_utf8_lossy(&bytes);
  assert!(text.starts_with("%PDF-1.4"));
  assert!(text.trim_end().ends_with("%%EOF"));
  assert!(text.contains("xref"));
  assert!(text.contains("27.00"));
}

#[tokio::test]
async fn excel_output_has_both_sheets() {
  let (orders, workdays) = sample_data();
  let bytes = ExcelReportGenerator::new(Duration::ZERO)
    .generate(&orders, &workdays, &CancellationToken::new())
    .await
    .unwrap();
  let text = String::from_utf8(bytes).unwrap();
  assert!(text.starts_with("<?xml"));
  assert!(text.contains("ss:Name=\"Orders\""));
  assert!(text.contains("ss:Name=\"Work days\""));
  assert!(text.contains("finished"));
}

#[tokio::test]
async fn cancelled_generation_yields_no_document() {
  let (orders, workdays) = sample_data();
  let token = CancellationToken::new();
  token.cancel();
  let result = PdfReportGenerator::new(Duration::from_secs(30))
    .generate(&orders, &workdays, &token)
    .await;
  assert!(matches!(result, Err(BazaarError::Cancelled)));
}

#[tokio::test]
async fn consumer_persists_and_announces() {
  setup_tracing();
  let (consumer, store, mut announcements) = consumer(Duration::from_millis(5));
  let event = event(ReportType::PosPdf);
  let event_id = event.event_id;

  let outcome = consumer.handle(event.clone(), &CancellationToken::new()).await;
  assert_eq!(outcome, ReportOutcome::Completed);

  let record = store.record(event_id).unwrap();
  assert_eq!(record.status, ReportStatus::Completed);
  let document = store.document(event_id).unwrap();
  assert_eq!(document.content_type, "application/pdf");
  assert!(document.file_name.ends_with(".pdf"));
  assert!(document.bytes.starts_with(b"%PDF-1.4"));

  let announced = announcements.recv().await.unwrap();
  assert_eq!(announced.event_id, event_id);
  assert_eq!(announced.size_bytes, document.bytes.len());

  // Redelivery of the same event is skipped.
  let again = consumer.handle(event, &CancellationToken::new()).await;
  assert_eq!(again, ReportOutcome::Duplicate);
}

#[tokio::test]
async fn unknown_generator_fails_the_report_not_the_consumer() {
  setup_tracing();
  let store = Arc::new(ReportStore::new());
  let (announcer, _announcements) = broadcast::channel(8);
  let factory = ReportFactory::new().register(PdfReportGenerator::new(Duration::ZERO));
  let consumer = ReportConsumer::new(Arc::new(factory), store.clone(), announcer);

  let excel = event(ReportType::PosExcel);
  let outcome = consumer.handle(excel.clone(), &CancellationToken::new()).await;
  assert!(matches!(outcome, ReportOutcome::Failed(_)));
  assert!(matches!(
    store.record(excel.event_id).unwrap().status,
    ReportStatus::Failed(_)
  ));

  let pdf = event(ReportType::PosPdf);
  assert_eq!(
    consumer.handle(pdf, &CancellationToken::new()).await,
    ReportOutcome::Completed
  );
}

#[tokio::test]
async fn cancelling_one_report_mid_render() {
  setup_tracing();
  let (consumer, store, _announcements) = consumer(Duration::from_secs(30));
  let consumer = Arc::new(consumer);
  let event = event(ReportType::PosExcel);
  let event_id = event.event_id;

  let worker = {
    let consumer = consumer.clone();
    tokio::spawn(async move { consumer.handle(event, &CancellationToken::new()).await })
  };
  wait_for_status(&store, event_id, ReportStatus::Processing).await;
  assert!(store.cancel(event_id));

  let outcome = tokio::time::timeout(Duration::from_secs(5), worker).await.unwrap().unwrap();
  assert_eq!(outcome, ReportOutcome::Cancelled);
  assert_eq!(store.record(event_id).unwrap().status, ReportStatus::Cancelled);
  assert!(store.document(event_id).is_none());
  assert!(!store.cancel(event_id));
}

#[tokio::test]
async fn shutdown_stops_the_consumer_loop() {
  setup_tracing();
  let (consumer, store, _announcements) = consumer(Duration::from_secs(30));
  let (sender, receiver) = tokio::sync::mpsc::channel(4);
  let shutdown = CancellationToken::new();
  let running = tokio::spawn(consumer.run(receiver, shutdown.clone()));

  let event = event(ReportType::PosPdf);
  let event_id = event.event_id;
  sender.send(event).await.unwrap();
  wait_for_status(&store, event_id, ReportStatus::Processing).await;

  shutdown.cancel();
  tokio::time::timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
  assert_eq!(store.record(event_id).unwrap().status, ReportStatus::Cancelled);
}

#[tokio::test]
async fn report_service_enqueues_a_snapshot() {
  let mut fx = fixture();
  let customer = fx.customer().await;
  let clerk = fx.user("Eve Employee", Role::Employee).await;
  let milk = fx.product("Milk", "1.20", UnitType::Unit, "50").await;
  fx.services.carts.add_item(customer.id, milk.id, d("5")).await.unwrap();
  fx.services.orders.checkout(customer.id).await.unwrap();
  fx.services.workdays.start_shift(clerk.id).await.unwrap();

  let today = Utc::now().date_naive();
  let event_id = fx
    .services
    .reports
    .request_report(ReportRequestPayload {
      report_type: ReportType::PosPdf,
      from: today,
      to: today,
    })
    .await
    .unwrap();
  assert_eq!(fx.services.reports.status(event_id).unwrap().status, ReportStatus::Queued);
  assert!(matches!(
    fx.services.reports.document(event_id),
    Err(BazaarError::DomainRule(_))
  ));

  let queued = fx.report_events.recv().await.unwrap();
  assert_eq!(queued.event_id, event_id);
  assert_eq!(queued.order_report.orders.len(), 1);
  assert_eq!(queued.order_report.total_value, d("6.00"));
  assert_eq!(queued.workday_report.employees.len(), 1);
  assert_eq!(queued.workday_report.employees[0].employee_name, "Eve Employee");

  let (announcer, _announcements) = broadcast::channel(8);
  let consumer = ReportConsumer::new(
    Arc::new(ReportFactory::with_defaults(Duration::ZERO)),
    fx.report_store.clone(),
    announcer,
  );
  assert_eq!(
    consumer.handle(queued, &CancellationToken::new()).await,
    ReportOutcome::Completed
  );
  let document = fx.services.reports.document(event_id).unwrap();
  assert!(document.bytes.starts_with(b"%PDF"));

  let backwards = fx
    .services
    .reports
    .request_report(ReportRequestPayload {
      report_type: ReportType::PosExcel,
      from: today,
      to: today.pred_opt().unwrap(),
    })
    .await;
  assert!(matches!(backwards, Err(BazaarError::Validation(_))));
  assert!(matches!(
    fx.services.reports.status(Uuid::new_v4()),
    Err(BazaarError::NotFound { .. })
  ));
}

#[tokio::test]
async fn queued_report_can_be_cancelled_before_it_renders() {
  let mut fx = fixture();
  let today = Utc::now().date_naive();
  let event_id = fx
    .services
    .reports
    .request_report(ReportRequestPayload {
      report_type: ReportType::PosPdf,
      from: today,
      to: today,
    })
    .await
    .unwrap();

  fx.services.reports.cancel(event_id).unwrap();
  assert_eq!(fx.services.reports.status(event_id).unwrap().status, ReportStatus::Cancelled);

  let (announcer, mut announcements) = broadcast::channel(8);
  let consumer = ReportConsumer::new(
    Arc::new(ReportFactory::with_defaults(Duration::ZERO)),
    fx.report_store.clone(),
    announcer,
  );
  let queued = fx.report_events.recv().await.unwrap();
  assert_eq!(
    consumer.handle(queued, &CancellationToken::new()).await,
    ReportOutcome::Cancelled
  );
  assert_eq!(fx.services.reports.status(event_id).unwrap().status, ReportStatus::Cancelled);
  assert!(fx.report_store.document(event_id).is_none());
  assert!(announcements.try_recv().is_err());
  assert!(matches!(
    fx.services.reports.cancel(event_id),
    Err(BazaarError::DomainRule(_))
  ));
}

#[test]
fn completing_sets_status_and_document_together() {
  let store = ReportStore::new();
  let event_id = Uuid::new_v4();
  store.complete(
    event_id,
    ReportType::PosExcel,
    StoredDocument {
      bytes: b"<?xml".to_vec(),
      content_type: "application/vnd.ms-excel",
      file_name: "pos.xml".to_string(),
    },
  );
  let record = store.record(event_id).unwrap();
  assert_eq!(record.status, ReportStatus::Completed);
  assert_eq!(record.document.unwrap().file_name, "pos.xml");
  assert!(!store.cancel(event_id));
}

#[tokio::test]
async fn finished_reports_are_purged_after_retention() {
  let store = ReportStore::new();
  let queued = Uuid::new_v4();
  let done = Uuid::new_v4();
  store.mark_queued(queued, ReportType::PosPdf);
  store.mark_queued(done, ReportType::PosPdf);
  store.start(done, ReportType::PosPdf, &CancellationToken::new()).unwrap();
  store.mark_failed(done, ReportType::PosPdf, "boom".to_string());

  store.purge_finished(Duration::from_secs(3600));
  assert_eq!(store.len(), 2);

  tokio::time::sleep(Duration::from_millis(20)).await;
  store.purge_finished(Duration::from_millis(10));
  assert_eq!(store.len(), 1);
  assert!(store.record(done).is_none());
  assert_eq!(store.record(queued).unwrap().status, ReportStatus::Queued);
}
