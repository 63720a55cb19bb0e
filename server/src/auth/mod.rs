// bazaar_server/src/auth/mod.rs

pub mod extractor;
pub mod jwt;

pub use extractor::{Admin, Authorized, CurrentUser, Customer, Policy, Staff};
pub use jwt::{Claims, JwtError, JwtService, TokenPair, TokenType};
