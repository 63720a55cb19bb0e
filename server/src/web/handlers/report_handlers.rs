// bazaar_server/src/web/handlers/report_handlers.rs

//! Report requests are accepted immediately and rendered in the background.
//! Clients poll the status and download the document once it is completed.

use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use bazaar::models::requests::ReportRequestPayload;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::Admin;
use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ReportAccepted {
  pub event_id: Uuid,
  pub status_url: String,
}

#[instrument(name = "handler::request_report", skip(state, payload, admin), fields(admin_id = %admin.id))]
pub async fn request_report(
  state: web::Data<AppState>,
  payload: web::Json<ReportRequestPayload>,
  admin: Admin,
) -> Result<HttpResponse, ApiError> {
  let event_id = state.services.reports.request_report(payload.into_inner()).await?;
  info!(%event_id, "Report accepted.");
  Ok(HttpResponse::Accepted().json(ReportAccepted {
    event_id,
    status_url: format!("/api/v1/reports/{}", event_id),
  }))
}

#[instrument(name = "handler::report_status", skip(state, _admin))]
pub async fn report_status(state: web::Data<AppState>, path: web::Path<Uuid>, _admin: Admin) -> Result<HttpResponse, ApiError> {
  let report = state.services.reports.status(path.into_inner())?;
  Ok(HttpResponse::Ok().json(report))
}

#[instrument(name = "handler::download_report", skip(state, _admin))]
pub async fn download_report(state: web::Data<AppState>, path: web::Path<Uuid>, _admin: Admin) -> Result<HttpResponse, ApiError> {
  let document = state.services.reports.document(path.into_inner())?;
  Ok(
    HttpResponse::Ok()
      .content_type(document.content_type)
      .insert_header(ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(document.file_name)],
      })
      .body(document.bytes),
  )
}

#[instrument(name = "handler::cancel_report", skip(state, _admin))]
pub async fn cancel_report(state: web::Data<AppState>, path: web::Path<Uuid>, _admin: Admin) -> Result<HttpResponse, ApiError> {
  state.services.reports.cancel(path.into_inner())?;
  Ok(HttpResponse::Accepted().finish())
}
