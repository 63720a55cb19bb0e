// bazaar_server/src/web/handlers/affiliate_handlers.rs

use actix_web::{web, HttpResponse};
use bazaar::filters::ListQuery;
use bazaar::models::requests::{AffiliatePayload, AwardPointsPayload};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::Admin;
use crate::errors::ApiError;
use crate::state::AppState;

#[instrument(name = "handler::list_affiliates", skip(state, _admin))]
pub async fn list_affiliates(
  state: web::Data<AppState>,
  query: web::Query<ListQuery>,
  _admin: Admin,
) -> Result<HttpResponse, ApiError> {
  let page = state.services.affiliates.list(&query).await?;
  Ok(HttpResponse::Ok().json(page))
}

#[instrument(name = "handler::get_affiliate", skip(state, _admin))]
pub async fn get_affiliate(state: web::Data<AppState>, path: web::Path<Uuid>, _admin: Admin) -> Result<HttpResponse, ApiError> {
  let affiliate = state.services.affiliates.get(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(affiliate))
}

#[instrument(name = "handler::create_affiliate", skip(state, payload, _admin))]
pub async fn create_affiliate(
  state: web::Data<AppState>,
  payload: web::Json<AffiliatePayload>,
  _admin: Admin,
) -> Result<HttpResponse, ApiError> {
  let affiliate = state.services.affiliates.create(payload.into_inner()).await?;
  info!(affiliate_id = %affiliate.id, "Affiliate enrolled.");
  Ok(HttpResponse::Created().json(affiliate))
}

#[instrument(name = "handler::update_affiliate", skip(state, payload, _admin))]
pub async fn update_affiliate(
  state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<AffiliatePayload>,
  _admin: Admin,
) -> Result<HttpResponse, ApiError> {
  let affiliate = state
    .services
    .affiliates
    .update(path.into_inner(), payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(affiliate))
}

#[instrument(name = "handler::delete_affiliate", skip(state, _admin))]
pub async fn delete_affiliate(state: web::Data<AppState>, path: web::Path<Uuid>, _admin: Admin) -> Result<HttpResponse, ApiError> {
  state.services.affiliates.delete(path.into_inner()).await?;
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::award_points", skip(state, payload, _admin), fields(delta = payload.delta))]
pub async fn award_points(
  state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<AwardPointsPayload>,
  _admin: Admin,
) -> Result<HttpResponse, ApiError> {
  let affiliate = state
    .services
    .affiliates
    .award_points(path.into_inner(), payload.delta)
    .await?;
  Ok(HttpResponse::Ok().json(affiliate))
}
