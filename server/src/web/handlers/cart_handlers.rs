// bazaar_server/src/web/handlers/cart_handlers.rs

//! The caller's own cart. Every route acts on the cart of the token subject.

use actix_web::{web, HttpResponse};
use bazaar::models::requests::{CartAmountPayload, CartItemPayload};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::Customer;
use crate::errors::ApiError;
use crate::state::AppState;

#[instrument(name = "handler::get_cart", skip(state, customer), fields(user_id = %customer.id))]
pub async fn get_cart(state: web::Data<AppState>, customer: Customer) -> Result<HttpResponse, ApiError> {
  let cart = state.services.carts.get_cart_with_items(customer.id).await?;
  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(name = "handler::get_checked_items", skip(state, customer), fields(user_id = %customer.id))]
pub async fn get_checked_items(state: web::Data<AppState>, customer: Customer) -> Result<HttpResponse, ApiError> {
  let cart = state.services.carts.get_cart_with_checked_items(customer.id).await?;
  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(name = "handler::create_cart", skip(state, customer), fields(user_id = %customer.id))]
pub async fn create_cart(state: web::Data<AppState>, customer: Customer) -> Result<HttpResponse, ApiError> {
  let cart = state.services.carts.create_cart(customer.id).await?;
  info!(cart_id = %cart.cart.id, "Cart created.");
  Ok(HttpResponse::Created().json(cart))
}

#[instrument(
  name = "handler::add_to_cart",
  skip(state, payload, customer),
  fields(user_id = %customer.id, product_id = %payload.product_id, amount = %payload.amount)
)]
pub async fn add_item(
  state: web::Data<AppState>,
  payload: web::Json<CartItemPayload>,
  customer: Customer,
) -> Result<HttpResponse, ApiError> {
  let CartItemPayload { product_id, amount } = payload.into_inner();
  let cart = state.services.carts.add_item(customer.id, product_id, amount).await?;
  info!(
    total = %cart.cart.total_value,
    count = cart.cart.products_count,
    "Item added to cart."
  );
  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(name = "handler::set_cart_amount", skip(state, payload, customer), fields(user_id = %customer.id))]
pub async fn set_item_amount(
  state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<CartAmountPayload>,
  customer: Customer,
) -> Result<HttpResponse, ApiError> {
  let cart = state
    .services
    .carts
    .set_item_amount(customer.id, path.into_inner(), payload.amount)
    .await?;
  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(name = "handler::remove_from_cart", skip(state, customer), fields(user_id = %customer.id))]
pub async fn remove_item(state: web::Data<AppState>, path: web::Path<Uuid>, customer: Customer) -> Result<HttpResponse, ApiError> {
  let cart = state.services.carts.remove_item(customer.id, path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(name = "handler::check_item", skip(state, customer), fields(user_id = %customer.id))]
pub async fn check_item(state: web::Data<AppState>, path: web::Path<Uuid>, customer: Customer) -> Result<HttpResponse, ApiError> {
  let cart = state.services.carts.check_item(customer.id, path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(name = "handler::uncheck_item", skip(state, customer), fields(user_id = %customer.id))]
pub async fn uncheck_item(state: web::Data<AppState>, path: web::Path<Uuid>, customer: Customer) -> Result<HttpResponse, ApiError> {
  let cart = state.services.carts.uncheck_item(customer.id, path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(name = "handler::clear_cart", skip(state, customer), fields(user_id = %customer.id))]
pub async fn clear_cart(state: web::Data<AppState>, customer: Customer) -> Result<HttpResponse, ApiError> {
  let cart = state.services.carts.clear_cart(customer.id).await?;
  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(name = "handler::remove_checked_items", skip(state, customer), fields(user_id = %customer.id))]
pub async fn remove_checked_items(state: web::Data<AppState>, customer: Customer) -> Result<HttpResponse, ApiError> {
  let cart = state.services.carts.remove_checked_items(customer.id).await?;
  Ok(HttpResponse::Ok().json(cart))
}
