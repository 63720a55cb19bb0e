// bazaar_server/src/main.rs

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{http::header, App, HttpServer};
use bazaar::services::seed_database;
use bazaar::storage::{InMemoryStore, PgStore, Store};
use bazaar_server::config::{AppConfig, LogFormat};
use bazaar_server::state::AppState;
use bazaar_server::{build_services, configure_app};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const REPORT_RETENTION: Duration = Duration::from_secs(60 * 60);

fn init_tracing() {
  let builder = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::CLOSE);
  // LOG_FORMAT is read here as well because logging starts before the config loads.
  if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
    builder.json().init();
  } else {
    builder.init();
  }
}

fn cors(config: &AppConfig) -> Cors {
  match &config.cors_allowed_origin {
    Some(origin) => Cors::default()
      .allowed_origin(origin)
      .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
      .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
      .max_age(3600),
    None => Cors::default(),
  }
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
  match &config.database_url {
    Some(url) => {
      let store = PgStore::connect(url, config.database_max_connections).await?;
      store.migrate().await?;
      Ok(Arc::new(store))
    }
    None => {
      warn!("DATABASE_URL is not set, running on the in-memory store. Data is lost on restart.");
      Ok(Arc::new(InMemoryStore::new()))
    }
  }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  init_tracing();
  info!("Starting bazaar server...");

  let config = AppConfig::from_env().inspect_err(|e| error!(error = %e, "Failed to load configuration."))?;
  if config.log_format == LogFormat::Json {
    info!("Structured JSON logging enabled.");
  }

  let store = open_store(&config).await?;
  let (services, worker) = build_services(store, &config);

  if config.seed_db {
    let summary = seed_database(&services, &config.admin_email, &config.admin_password).await?;
    info!(?summary, "Seed data applied.");
  }

  let shutdown = CancellationToken::new();

  let mut generated = worker.announcer.subscribe();
  tokio::spawn(async move {
    while let Ok(event) = generated.recv().await {
      info!(event_id = %event.event_id, size_bytes = event.size_bytes, "Report ready for download.");
    }
  });
  let consumer = tokio::spawn(worker.consumer.run(worker.receiver, shutdown.clone()));

  let state = AppState::new(config, services);

  let limiter = state.rate_limiter.clone();
  let reports = state.services.reports.clone();
  let sweep_shutdown = shutdown.clone();
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
      tokio::select! {
        _ = sweep_shutdown.cancelled() => break,
        _ = ticker.tick() => {
          limiter.purge_idle(SWEEP_INTERVAL);
          reports.purge_finished(REPORT_RETENTION);
        }
      }
    }
  });

  let address = state.config.bind_address();
  let server_config = state.config.clone();
  info!(%address, "Binding HTTP server.");

  HttpServer::new(move || {
    let state = state.clone();
    App::new()
      .wrap(cors(&server_config))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(|cfg| configure_app(cfg, state))
  })
  .bind(&address)?
  .run()
  .await?;

  info!("HTTP server stopped, shutting down background work.");
  shutdown.cancel();
  if let Err(e) = consumer.await {
    error!(error = %e, "Report consumer task ended abnormally.");
  }
  Ok(())
}
