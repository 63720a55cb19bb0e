// bazaar_server/src/web/routes.rs

use actix_web::middleware::from_fn;
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::rate_limit::rate_limit;
use crate::web::handlers::{
  affiliate_handlers as affiliates, auth_handlers as auth, cart_handlers as cart, catalog_handlers as catalog,
  order_handlers as orders, report_handlers as reports, user_handlers as users, workday_handlers as workdays,
};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Mounts every resource under `/api/v1`. Literal segments are registered
/// before the `{id}` patterns they would otherwise collide with.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/auth")
          .wrap(from_fn(rate_limit))
          .route("/register", web::post().to(auth::register))
          .route("/login", web::post().to(auth::login))
          .route("/refresh", web::post().to(auth::refresh)),
      )
      .service(
        web::scope("/categories")
          .route("", web::get().to(catalog::list_categories))
          .route("", web::post().to(catalog::create_category))
          .route("/{id}", web::get().to(catalog::get_category))
          .route("/{id}", web::put().to(catalog::update_category))
          .route("/{id}", web::delete().to(catalog::delete_category)),
      )
      .service(
        web::scope("/products")
          .route("", web::get().to(catalog::list_products))
          .route("", web::post().to(catalog::create_product))
          .route("/{id}", web::get().to(catalog::get_product))
          .route("/{id}", web::put().to(catalog::update_product))
          .route("/{id}", web::delete().to(catalog::delete_product)),
      )
      .service(
        web::scope("/orders")
          .route("", web::get().to(orders::list_orders))
          .route("", web::post().to(orders::create_order))
          .route("/checkout", web::post().to(orders::checkout))
          .route("/{id}", web::get().to(orders::get_order))
          .route("/{id}", web::delete().to(orders::delete_order))
          .route("/{id}/status", web::put().to(orders::update_order_status)),
      )
      .service(
        web::scope("/users")
          .route("", web::get().to(users::list_users))
          .route("", web::post().to(users::create_user))
          .route("/{id}", web::get().to(users::get_user))
          .route("/{id}", web::put().to(users::update_user))
          .route("/{id}", web::delete().to(users::delete_user)),
      )
      .service(
        web::scope("/affiliates")
          .route("", web::get().to(affiliates::list_affiliates))
          .route("", web::post().to(affiliates::create_affiliate))
          .route("/{id}", web::get().to(affiliates::get_affiliate))
          .route("/{id}", web::put().to(affiliates::update_affiliate))
          .route("/{id}", web::delete().to(affiliates::delete_affiliate))
          .route("/{id}/points", web::post().to(affiliates::award_points)),
      )
      .service(
        web::scope("/cart")
          .route("", web::get().to(cart::get_cart))
          .route("", web::post().to(cart::create_cart))
          .route("/checked", web::get().to(cart::get_checked_items))
          .route("/items", web::post().to(cart::add_item))
          .route("/items", web::delete().to(cart::clear_cart))
          .route("/items/checked", web::delete().to(cart::remove_checked_items))
          .route("/items/{product_id}", web::put().to(cart::set_item_amount))
          .route("/items/{product_id}", web::delete().to(cart::remove_item))
          .route("/items/{product_id}/check", web::post().to(cart::check_item))
          .route("/items/{product_id}/uncheck", web::post().to(cart::uncheck_item)),
      )
      .service(
        web::scope("/workdays")
          .route("", web::get().to(workdays::list_workdays))
          .route("/start", web::post().to(workdays::start_shift))
          .route("/end", web::post().to(workdays::end_shift))
          .route("/{id}", web::get().to(workdays::get_workday))
          .route("/{id}", web::delete().to(workdays::delete_workday)),
      )
      .service(
        web::scope("/reports")
          .route("", web::post().to(reports::request_report))
          .route("/{id}", web::get().to(reports::report_status))
          .route("/{id}", web::delete().to(reports::cancel_report))
          .route("/{id}/download", web::get().to(reports::download_report)),
      ),
  );
}
