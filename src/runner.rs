//! Plan runner: executes one command's steps in order.
//!
//! Steps run strictly in declaration order from the requested start index.
//! The first failure stops the sequence; the command's `onError` step runs,
//! then its `finally` step runs whether or not anything failed. The failure is
//! returned to the caller only when the command sets `propagateErrors`.

use tracing::{error, info, warn};

use crate::checkpoint::{CheckpointStore, ResumeCheckpoint};
use crate::config::EngineConfig;
use crate::error::{PlanError, Result, TaskExecutionError};
use crate::executor::TaskExecutor;
use crate::plan::{Command, Step};

/// The first failure of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Resume position of the failed step
    pub index: usize,
    /// Message of the original failure
    pub message: String,
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub label: String,
    /// Steps from `tasks` that were attempted
    pub steps_run: usize,
    /// Failure that was handled without being propagated
    pub failure: Option<StepFailure>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs commands with one executor and optional checkpointing.
#[derive(Debug)]
pub struct PlanRunner {
    executor: TaskExecutor,
    checkpoint: Option<CheckpointStore>,
}

impl PlanRunner {
    pub fn new(executor: TaskExecutor) -> Self {
        Self {
            executor,
            checkpoint: None,
        }
    }

    /// Runner for `arguments` with the executable and checkpoint from `config`.
    pub fn from_config(arguments: Vec<String>, config: &EngineConfig) -> Self {
        Self {
            executor: TaskExecutor::new(arguments, config),
            checkpoint: config.checkpoint_path.clone().map(CheckpointStore::new),
        }
    }

    pub fn with_checkpoint(mut self, store: CheckpointStore) -> Self {
        self.checkpoint = Some(store);
        self
    }

    /// Index stored by a previous failed run, if checkpointing is enabled and
    /// a checkpoint exists.
    pub fn checkpoint_index(&self) -> Result<Option<usize>> {
        match &self.checkpoint {
            Some(store) => Ok(store.load()?.map(|c| c.line_number)),
            None => Ok(None),
        }
    }

    /// Run `command` starting at task `start`.
    ///
    /// Returns `Err(PlanError::StepFailed)` carrying the original failure
    /// message only when a step failed and the command propagates errors.
    pub fn run(&self, mut command: Command, start: usize) -> Result<RunOutcome> {
        let len = command.tasks.len();
        if len == 0 {
            return Err(PlanError::NoTasks(command.label));
        }
        if start > len {
            return Err(PlanError::ResumeOutOfRange { index: start, len });
        }

        info!("Executing {}...", command.label);
        if start > 0 {
            info!("Resuming from step {} of {}", start, len);
        }

        let mut failure = None;
        let mut steps_run = 0;
        for (index, step) in command.tasks.iter_mut().enumerate().skip(start) {
            step.resume_index = index;
            info!("Executing step {}: {}", index, describe(step));
            steps_run += 1;

            if let Err(err) = self.executor.execute(step) {
                error!("Step {} failed: {}", err.index, err);
                self.record_failure(&err);
                failure = Some(StepFailure {
                    index: err.index,
                    message: err.to_string(),
                });
                break;
            }
        }

        if let (Some(failed), Some(mut on_error)) = (&failure, command.on_error.take()) {
            info!("Running On Error Task...");
            on_error.resume_index = failed.index;
            if let Err(err) = self.executor.execute(&mut on_error) {
                error!("On error task failed: {}", err);
            }
        }

        if let Some(mut finally) = command.finally.take() {
            info!("Running Finally Task...");
            finally.resume_index = failure.as_ref().map_or(len, |f| f.index);
            if let Err(err) = self.executor.execute(&mut finally) {
                error!("Finally task failed: {}", err);
                if failure.is_none() {
                    self.record_failure(&err);
                    failure = Some(StepFailure {
                        index: err.index,
                        message: err.to_string(),
                    });
                }
            }
        }

        match failure {
            Some(failed) if command.propagate_errors => Err(PlanError::StepFailed {
                index: failed.index,
                message: failed.message,
            }),
            failure => {
                if let Some(failed) = &failure {
                    warn!(
                        "Step {} failed but {} does not propagate errors: {}",
                        failed.index, command.label, failed.message
                    );
                }
                self.clear_checkpoint();
                info!("Finished {}", command.label);
                Ok(RunOutcome {
                    label: command.label,
                    steps_run,
                    failure,
                })
            }
        }
    }

    /// Point the checkpoint at a failed process step. Any other failure
    /// removes it, since an older checkpoint may name a step that has since
    /// succeeded.
    fn record_failure(&self, err: &TaskExecutionError) {
        let Some(store) = &self.checkpoint else {
            return;
        };
        if !err.kind().is_process_failure() {
            self.clear_checkpoint();
            return;
        }
        let checkpoint = ResumeCheckpoint {
            line_number: err.index,
        };
        if let Err(e) = store.save(checkpoint) {
            warn!(
                "Failed to write resume checkpoint {}: {}",
                store.path().display(),
                e
            );
        }
    }

    fn clear_checkpoint(&self) {
        if let Some(store) = &self.checkpoint {
            if let Err(e) = store.clear() {
                warn!(
                    "Failed to remove resume checkpoint {}: {}",
                    store.path().display(),
                    e
                );
            }
        }
    }
}

/// Operator guidance for rerunning after a propagated failure at `index`.
pub fn resume_guidance(index: usize) -> String {
    format!(
        "Re-run with --resume-from {} to retry the failed step, or --resume-from {} to skip it",
        index,
        index + 1
    )
}

fn describe(step: &Step) -> String {
    match (&step.command, &step.children) {
        (Some(command), _) => format!("{} {}", step.task_type, command),
        (None, Some(children)) => format!("{} ({} tasks)", step.task_type, children.len()),
        (None, None) => step.task_type.clone(),
    }
}
