// bazaar_server/src/web/handlers/catalog_handlers.rs

//! Categories and products. Reads are public, writes need an admin.

use actix_web::{web, HttpResponse};
use bazaar::filters::ListQuery;
use bazaar::models::requests::{CategoryPayload, ProductPayload};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::Admin;
use crate::errors::ApiError;
use crate::state::AppState;

#[instrument(name = "handler::list_categories", skip(state))]
pub async fn list_categories(state: web::Data<AppState>, query: web::Query<ListQuery>) -> Result<HttpResponse, ApiError> {
  let page = state.services.categories.list(&query).await?;
  Ok(HttpResponse::Ok().json(page))
}

#[instrument(name = "handler::get_category", skip(state))]
pub async fn get_category(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, ApiError> {
  let category = state.services.categories.get(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(category))
}

#[instrument(name = "handler::create_category", skip(state, payload, admin), fields(admin_id = %admin.id))]
pub async fn create_category(
  state: web::Data<AppState>,
  payload: web::Json<CategoryPayload>,
  admin: Admin,
) -> Result<HttpResponse, ApiError> {
  let category = state.services.categories.create(payload.into_inner()).await?;
  info!(category_id = %category.id, "Category created.");
  Ok(HttpResponse::Created().json(category))
}

#[instrument(name = "handler::update_category", skip(state, payload, _admin))]
pub async fn update_category(
  state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<CategoryPayload>,
  _admin: Admin,
) -> Result<HttpResponse, ApiError> {
  let category = state
    .services
    .categories
    .update(path.into_inner(), payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(category))
}

#[instrument(name = "handler::delete_category", skip(state, _admin))]
pub async fn delete_category(state: web::Data<AppState>, path: web::Path<Uuid>, _admin: Admin) -> Result<HttpResponse, ApiError> {
  state.services.categories.delete(path.into_inner()).await?;
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::list_products", skip(state))]
pub async fn list_products(state: web::Data<AppState>, query: web::Query<ListQuery>) -> Result<HttpResponse, ApiError> {
  let page = state.services.products.list(&query).await?;
  Ok(HttpResponse::Ok().json(page))
}

#[instrument(name = "handler::get_product", skip(state))]
pub async fn get_product(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, ApiError> {
  let product = state.services.products.get(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(name = "handler::create_product", skip(state, payload, admin), fields(admin_id = %admin.id))]
pub async fn create_product(
  state: web::Data<AppState>,
  payload: web::Json<ProductPayload>,
  admin: Admin,
) -> Result<HttpResponse, ApiError> {
  let product = state.services.products.create(payload.into_inner()).await?;
  info!(product_id = %product.id, "Product created.");
  Ok(HttpResponse::Created().json(product))
}

#[instrument(name = "handler::update_product", skip(state, payload, _admin))]
pub async fn update_product(
  state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<ProductPayload>,
  _admin: Admin,
) -> Result<HttpResponse, ApiError> {
  let product = state
    .services
    .products
    .update(path.into_inner(), payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(name = "handler::delete_product", skip(state, _admin))]
pub async fn delete_product(state: web::Data<AppState>, path: web::Path<Uuid>, _admin: Admin) -> Result<HttpResponse, ApiError> {
  state.services.products.delete(path.into_inner()).await?;
  Ok(HttpResponse::NoContent().finish())
}
