// bazaar_server/src/lib.rs

//! HTTP layer of the bazaar backend: configuration, auth, rate limiting and
//! the actix-web routes over the `bazaar` services.

pub mod auth;
pub mod config;
pub mod errors;
pub mod pipelines;
pub mod rate_limit;
pub mod state;
pub mod web;

use std::sync::Arc;

use actix_web::web as actix_data;
use bazaar::cache::MemoryCache;
use bazaar::reports::{
  ChannelReportQueue, GeneratePosReportEvent, ReportConsumer, ReportFactory, ReportGenerated, ReportStore,
};
use bazaar::storage::Store;
use bazaar::{ServiceContext, Services};
use tokio::sync::{broadcast, mpsc};

use crate::config::AppConfig;
use crate::errors::{json_error_handler, path_error_handler, query_error_handler};
use crate::state::AppState;

/// The background half of report generation, handed to `main` (or a test) to spawn.
pub struct ReportWorker {
  pub consumer: ReportConsumer,
  pub receiver: mpsc::Receiver<GeneratePosReportEvent>,
  pub announcer: broadcast::Sender<ReportGenerated>,
}

const REPORT_QUEUE_CAPACITY: usize = 64;

/// Wires store, cache, report queue and services together.
pub fn build_services(store: Arc<dyn Store>, config: &AppConfig) -> (Services, ReportWorker) {
  let cache = Arc::new(MemoryCache::new(config.cache_ttl));
  let (queue, receiver) = ChannelReportQueue::channel(REPORT_QUEUE_CAPACITY);
  let report_store = Arc::new(ReportStore::new());
  let (announcer, _) = broadcast::channel(REPORT_QUEUE_CAPACITY);
  let consumer = ReportConsumer::new(
    Arc::new(ReportFactory::with_defaults(config.report_delay)),
    report_store.clone(),
    announcer.clone(),
  );
  let services = Services::new(ServiceContext::new(store, cache), Arc::new(queue), report_store);
  (
    services,
    ReportWorker {
      consumer,
      receiver,
      announcer,
    },
  )
}

/// Everything an `App` needs: shared state, extractor error handlers, routes.
pub fn configure_app(cfg: &mut actix_data::ServiceConfig, state: AppState) {
  cfg
    .app_data(actix_data::Data::new(state))
    .app_data(actix_data::JsonConfig::default().error_handler(json_error_handler))
    .app_data(actix_data::QueryConfig::default().error_handler(query_error_handler))
    .app_data(actix_data::PathConfig::default().error_handler(path_error_handler))
    .configure(web::configure_app_routes);
}
