// bazaar/src/workflow/mod.rs

//! Named-step pipelines over a shared, lockable context.
//!
//! A [`Pipeline`] declares its steps up front and gets handlers attached with
//! [`Pipeline::on_step`]. [`Workflows`] stores pipelines keyed by the context type so
//! callers only need to hand over a [`ContextData`].

pub mod context;
pub mod control;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use context::{ContextData, Handler};
pub use control::{PipelineControl, PipelineResult};
pub use error::WorkflowError;
pub use pipeline::{Pipeline, SkipCondition, StepDef};
pub use registry::Workflows;
