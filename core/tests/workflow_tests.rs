// tests/workflow_tests.rs
mod common;

use bazaar::workflow::SkipCondition;
use bazaar::{ContextData, Pipeline, PipelineControl, PipelineResult, WorkflowError, Workflows};
use common::setup_tracing;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Trace {
  steps: Vec<String>,
  counter: i32,
  stop_at: Option<&'static str>,
}

#[derive(Debug, thiserror::Error)]
enum TestError {
  #[error("workflow: {0}")]
  Workflow(#[from] WorkflowError),
  #[error("handler failed: {0}")]
  Handler(String),
}

fn record(pipeline: &mut Pipeline<Trace, TestError>, step: &'static str) {
  pipeline.on_step(step, move |ctx: ContextData<Trace>| async move {
    let mut trace = ctx.write();
    trace.steps.push(step.to_string());
    trace.counter += 1;
    if trace.stop_at == Some(step) {
      return Ok::<_, TestError>(PipelineControl::Stop);
    }
    Ok(PipelineControl::Continue)
  });
}

fn three_steps() -> Pipeline<Trace, TestError> {
  let mut pipeline = Pipeline::new(&[("one", false, None), ("two", false, None), ("three", false, None)]);
  for step in ["one", "two", "three"] {
    record(&mut pipeline, step);
  }
  pipeline
}

#[tokio::test]
async fn steps_run_in_declaration_order() {
  setup_tracing();
  let pipeline = three_steps();
  assert_eq!(pipeline.step_names(), vec!["one", "two", "three"]);

  let ctx = ContextData::new(Trace::default());
  let result = pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(result, PipelineResult::Completed);
  assert_eq!(ctx.read().steps, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn stop_ends_the_run_early() {
  setup_tracing();
  let pipeline = three_steps();
  let ctx = ContextData::new(Trace {
    stop_at: Some("two"),
    ..Trace::default()
  });
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Stopped);
  assert_eq!(ctx.read().steps, vec!["one", "two"]);
}

#[tokio::test]
async fn handler_errors_propagate_and_halt() {
  setup_tracing();
  let mut pipeline = Pipeline::<Trace, TestError>::new(&[("good", false, None), ("bad", false, None), ("never", false, None)]);
  record(&mut pipeline, "good");
  pipeline.on_step("bad", |_ctx: ContextData<Trace>| async move {
    Err::<PipelineControl, _>(TestError::Handler("boom".to_string()))
  });
  record(&mut pipeline, "never");

  let ctx = ContextData::new(Trace::default());
  match pipeline.run(ctx.clone()).await {
    Err(TestError::Handler(msg)) => assert_eq!(msg, "boom"),
    other => panic!("expected the handler error, got {:?}", other),
  }
  assert_eq!(ctx.read().steps, vec!["good"]);
}

#[tokio::test]
async fn anyhow_errors_convert_through_workflow_error() {
  setup_tracing();
  let mut pipeline = Pipeline::<Trace, TestError>::new(&[("only", false, None)]);
  pipeline.on_step("only", |_ctx: ContextData<Trace>| async move {
    Err::<PipelineControl, _>(WorkflowError::from(anyhow::anyhow!("disk on fire")))
  });
  match pipeline.run(ContextData::new(Trace::default())).await {
    Err(TestError::Workflow(WorkflowError::HandlerError { source })) => {
      assert_eq!(source.to_string(), "disk on fire")
    }
    other => panic!("unexpected result {:?}", other),
  }
}

#[tokio::test]
async fn missing_handler_on_required_step_is_reported() {
  setup_tracing();
  let mut pipeline = Pipeline::<Trace, TestError>::new(&[("one", false, None), ("two", false, None)]);
  record(&mut pipeline, "one");
  match pipeline.run(ContextData::new(Trace::default())).await {
    Err(TestError::Workflow(WorkflowError::HandlerMissing { step_name })) => assert_eq!(step_name, "two"),
    other => panic!("unexpected result {:?}", other),
  }
}

#[tokio::test]
async fn optional_and_skipped_steps() {
  setup_tracing();
  let skip_when_counted: SkipCondition<Trace> = Arc::new(|trace: &Trace| trace.counter > 0);
  let mut pipeline = Pipeline::<Trace, TestError>::new(&[
    ("first", false, None),
    ("maybe", true, None),
    ("skipped", false, Some(skip_when_counted)),
    ("last", false, None),
  ]);
  record(&mut pipeline, "first");
  record(&mut pipeline, "skipped");
  record(&mut pipeline, "last");

  let ctx = ContextData::new(Trace::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().steps, vec!["first", "last"]);
}

#[test]
#[should_panic(expected = "not declared")]
fn registering_an_undeclared_step_panics() {
  let mut pipeline = Pipeline::<Trace, TestError>::new(&[("one", false, None)]);
  record(&mut pipeline, "typo");
}

#[tokio::test]
async fn registry_dispatches_by_context_type() {
  setup_tracing();
  let workflows = Workflows::<TestError>::new();
  assert!(!workflows.is_registered::<Trace>());
  workflows.register_pipeline(three_steps());
  assert!(workflows.is_registered::<Trace>());

  let ctx = ContextData::new(Trace::default());
  assert_eq!(workflows.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().counter, 3);

  match workflows.run(ContextData::new(42_u32)).await {
    Err(TestError::Workflow(WorkflowError::NotRegistered { type_name })) => assert!(type_name.contains("u32")),
    other => panic!("unexpected result {:?}", other),
  }
}
