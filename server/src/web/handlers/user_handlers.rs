// bazaar_server/src/web/handlers/user_handlers.rs

use actix_web::{web, HttpResponse};
use bazaar::filters::ListQuery;
use bazaar::models::requests::{CreateUserPayload, UpdateUserPayload};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::Admin;
use crate::errors::ApiError;
use crate::state::AppState;

#[instrument(name = "handler::list_users", skip(state, _admin))]
pub async fn list_users(state: web::Data<AppState>, query: web::Query<ListQuery>, _admin: Admin) -> Result<HttpResponse, ApiError> {
  let page = state.services.users.list(&query).await?;
  Ok(HttpResponse::Ok().json(page))
}

#[instrument(name = "handler::get_user", skip(state, _admin))]
pub async fn get_user(state: web::Data<AppState>, path: web::Path<Uuid>, _admin: Admin) -> Result<HttpResponse, ApiError> {
  let user = state.services.users.get(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(user))
}

#[instrument(name = "handler::create_user", skip(state, payload, admin), fields(admin_id = %admin.id, role = ?payload.role))]
pub async fn create_user(
  state: web::Data<AppState>,
  payload: web::Json<CreateUserPayload>,
  admin: Admin,
) -> Result<HttpResponse, ApiError> {
  let user = state.services.users.create(payload.into_inner()).await?;
  info!(user_id = %user.id, "User created by admin.");
  Ok(HttpResponse::Created().json(user))
}

#[instrument(name = "handler::update_user", skip(state, payload, _admin))]
pub async fn update_user(
  state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<UpdateUserPayload>,
  _admin: Admin,
) -> Result<HttpResponse, ApiError> {
  let user = state
    .services
    .users
    .update(path.into_inner(), payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(user))
}

#[instrument(name = "handler::delete_user", skip(state, admin))]
pub async fn delete_user(state: web::Data<AppState>, path: web::Path<Uuid>, admin: Admin) -> Result<HttpResponse, ApiError> {
  let user_id = path.into_inner();
  if user_id == admin.id {
    warn!(%user_id, "Admin tried to delete their own account.");
    return Err(ApiError::Forbidden("administrators cannot delete their own account".to_string()));
  }
  state.services.users.delete(user_id).await?;
  Ok(HttpResponse::NoContent().finish())
}
