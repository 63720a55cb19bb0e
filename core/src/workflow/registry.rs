// bazaar/src/workflow/registry.rs

//! `Workflows<E>`: pipelines registered once at startup and looked up by the
//! type of the context they run on.

use crate::workflow::context::ContextData;
use crate::workflow::control::PipelineResult;
use crate::workflow::error::WorkflowError;
use crate::workflow::pipeline::Pipeline;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, Level};

#[async_trait]
trait ErasedPipeline<AppErr>: Send + Sync
where
  AppErr: std::error::Error + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<PipelineResult, AppErr>;
}

struct PipelineEntry<TData, StepErr, AppErr>
where
  TData: 'static + Send + Sync,
  StepErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pipeline: Arc<Pipeline<TData, StepErr>>,
  _app_err: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<TData, StepErr, AppErr> ErasedPipeline<AppErr> for PipelineEntry<TData, StepErr, AppErr>
where
  TData: 'static + Send + Sync,
  StepErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<StepErr> + From<WorkflowError> + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<PipelineResult, AppErr> {
    let ctx_data = match ctx_obj.downcast::<ContextData<TData>>() {
      Ok(boxed) => *boxed,
      Err(_) => {
        let expected_type = std::any::type_name::<ContextData<TData>>().to_string();
        event!(Level::ERROR, %expected_type, "Context object type mismatch.");
        return Err(AppErr::from(WorkflowError::TypeMismatch { expected_type }));
      }
    };
    self.pipeline.run(ctx_data).await.map_err(AppErr::from)
  }
}

/// Type-keyed pipeline registry returning the application error type `AppErr`.
pub struct Workflows<AppErr = WorkflowError>
where
  AppErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  registry: RwLock<HashMap<TypeId, Arc<dyn ErasedPipeline<AppErr>>>>,
}

impl<AppErr> Workflows<AppErr>
where
  AppErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      registry: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `pipeline` for contexts of type `TData`, replacing any previous one.
  pub fn register_pipeline<TData, StepErr>(&self, pipeline: Pipeline<TData, StepErr>)
  where
    TData: 'static + Send + Sync,
    StepErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
    AppErr: From<StepErr>,
  {
    event!(Level::DEBUG, context_type = %std::any::type_name::<TData>(), "Registering pipeline.");
    let entry = PipelineEntry::<TData, StepErr, AppErr> {
      pipeline: Arc::new(pipeline),
      _app_err: PhantomData,
    };
    self.registry.write().insert(TypeId::of::<TData>(), Arc::new(entry));
  }

  pub fn is_registered<TData: 'static + Send + Sync>(&self) -> bool {
    self.registry.read().contains_key(&TypeId::of::<TData>())
  }

  pub async fn run<TData>(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, AppErr>
  where
    TData: 'static + Send + Sync,
  {
    let entry = self.registry.read().get(&TypeId::of::<TData>()).cloned();
    let entry = entry.ok_or_else(|| {
      let type_name = std::any::type_name::<TData>().to_string();
      event!(Level::ERROR, %type_name, "No pipeline registered.");
      AppErr::from(WorkflowError::NotRegistered { type_name })
    })?;
    entry.run_erased(Box::new(ctx_data)).await
  }
}

impl<AppErr> Default for Workflows<AppErr>
where
  AppErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
