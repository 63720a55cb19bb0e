// bazaar_server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use bazaar::filters::ListQuery;
use bazaar::models::requests::{CreateOrderPayload, UpdateOrderStatusPayload};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{Customer, Staff};
use crate::errors::ApiError;
use crate::state::AppState;

#[instrument(name = "handler::list_orders", skip(state, _staff))]
pub async fn list_orders(
  state: web::Data<AppState>,
  query: web::Query<ListQuery>,
  _staff: Staff,
) -> Result<HttpResponse, ApiError> {
  let page = state.services.orders.list(&query).await?;
  Ok(HttpResponse::Ok().json(page))
}

#[instrument(name = "handler::get_order", skip(state, _staff))]
pub async fn get_order(state: web::Data<AppState>, path: web::Path<Uuid>, _staff: Staff) -> Result<HttpResponse, ApiError> {
  let order = state.services.orders.get(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::create_order", skip(state, payload, staff), fields(staff_id = %staff.id, customer_id = %payload.user_id))]
pub async fn create_order(
  state: web::Data<AppState>,
  payload: web::Json<CreateOrderPayload>,
  staff: Staff,
) -> Result<HttpResponse, ApiError> {
  let order = state.services.orders.create_order(payload.into_inner()).await?;
  info!(order_id = %order.id, total = %order.total_value, "Order placed by staff.");
  Ok(HttpResponse::Created().json(order))
}

#[instrument(name = "handler::update_order_status", skip(state, payload, _staff), fields(status = ?payload.status))]
pub async fn update_order_status(
  state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<UpdateOrderStatusPayload>,
  _staff: Staff,
) -> Result<HttpResponse, ApiError> {
  let order = state
    .services
    .orders
    .update_status(path.into_inner(), payload.into_inner().status)
    .await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::delete_order", skip(state, _staff))]
pub async fn delete_order(state: web::Data<AppState>, path: web::Path<Uuid>, _staff: Staff) -> Result<HttpResponse, ApiError> {
  state.services.orders.delete(path.into_inner()).await?;
  Ok(HttpResponse::NoContent().finish())
}

/// Turns the checked lines of the caller's cart into an order.
#[instrument(name = "handler::checkout", skip(state, customer), fields(user_id = %customer.id))]
pub async fn checkout(state: web::Data<AppState>, customer: Customer) -> Result<HttpResponse, ApiError> {
  let order = state.services.orders.checkout(customer.id).await?;
  Ok(HttpResponse::Created().json(order))
}
