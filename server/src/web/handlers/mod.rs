// bazaar_server/src/web/handlers/mod.rs

pub mod affiliate_handlers;
pub mod auth_handlers;
pub mod cart_handlers;
pub mod catalog_handlers;
pub mod order_handlers;
pub mod report_handlers;
pub mod user_handlers;
pub mod workday_handlers;
