// bazaar/src/models/mod.rs

//! Data structures representing stored entities, plus the request payloads the
//! services accept.

pub mod affiliate;
pub mod cart;
pub mod category;
pub mod order;
pub mod product;
pub mod requests;
pub mod user;
pub mod workday;

pub use affiliate::Affiliate;
pub use cart::{CartEntry, ShoppingCart, ShoppingCartProduct, ShoppingCartProductInfo};
pub use category::Category;
pub use order::{LineItem, Order, OrderStatus};
pub use product::{Product, UnitType};
pub use user::{Role, User, UserDto};
pub use workday::WorkDay;

use rust_decimal::{Decimal, RoundingStrategy};

/// Money is kept with two decimals, half away from zero.
pub fn round2(value: Decimal) -> Decimal {
  value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Number of significant decimal places, ignoring trailing zeros.
pub fn decimal_places(value: Decimal) -> u32 {
  value.normalize().scale()
}
