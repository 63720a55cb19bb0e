// bazaar_server/src/web/handlers/workday_handlers.rs

use actix_web::{web, HttpResponse};
use bazaar::filters::ListQuery;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{Admin, Staff};
use crate::errors::ApiError;
use crate::state::AppState;

#[instrument(name = "handler::list_workdays", skip(state, _admin))]
pub async fn list_workdays(
  state: web::Data<AppState>,
  query: web::Query<ListQuery>,
  _admin: Admin,
) -> Result<HttpResponse, ApiError> {
  let page = state.services.workdays.list(&query).await?;
  Ok(HttpResponse::Ok().json(page))
}

#[instrument(name = "handler::get_workday", skip(state, _admin))]
pub async fn get_workday(state: web::Data<AppState>, path: web::Path<Uuid>, _admin: Admin) -> Result<HttpResponse, ApiError> {
  let workday = state.services.workdays.get(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(workday))
}

#[instrument(name = "handler::start_shift", skip(state, staff), fields(employee_id = %staff.id))]
pub async fn start_shift(state: web::Data<AppState>, staff: Staff) -> Result<HttpResponse, ApiError> {
  let workday = state.services.workdays.start_shift(staff.id).await?;
  info!(workday_id = %workday.id, "Shift started.");
  Ok(HttpResponse::Created().json(workday))
}

#[instrument(name = "handler::end_shift", skip(state, staff), fields(employee_id = %staff.id))]
pub async fn end_shift(state: web::Data<AppState>, staff: Staff) -> Result<HttpResponse, ApiError> {
  let workday = state.services.workdays.end_shift(staff.id).await?;
  info!(workday_id = %workday.id, "Shift ended.");
  Ok(HttpResponse::Ok().json(workday))
}

#[instrument(name = "handler::delete_workday", skip(state, _admin))]
pub async fn delete_workday(state: web::Data<AppState>, path: web::Path<Uuid>, _admin: Admin) -> Result<HttpResponse, ApiError> {
  state.services.workdays.delete(path.into_inner()).await?;
  Ok(HttpResponse::NoContent().finish())
}
