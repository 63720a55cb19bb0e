// bazaar/src/lib.rs

//! Bazaar: the domain core of an e-commerce backend.
//!
//! The crate holds everything below the HTTP layer:
//!  - Domain models for the catalog, orders, users, affiliates, work days and carts.
//!  - A storage layer made of repositories sharing one unit of work, backed by
//!    PostgreSQL or by an in-memory twin.
//!  - A read-through cache, list filter strategies and report generators.
//!  - Application services composing the above.
//!  - A small workflow engine running named-step pipelines over shared context.

pub mod cache;
pub mod error;
pub mod filters;
pub mod models;
pub mod reports;
pub mod services;
pub mod storage;
pub mod workflow;

pub use crate::error::{BazaarError, BazaarResult};
pub use crate::services::{ServiceContext, Services};
pub use crate::workflow::{ContextData, Pipeline, PipelineControl, PipelineResult, WorkflowError, Workflows};
