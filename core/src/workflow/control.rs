// bazaar/src/workflow/control.rs

/// Returned by a step handler to decide whether the pipeline goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  Continue,
  /// Halt immediately. Remaining handlers and steps are not run.
  Stop,
}

/// Outcome of a whole pipeline run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  Completed,
  Stopped,
}
