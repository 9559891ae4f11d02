//! Error handling module for the plan executor
//!
//! Step runners fail with [`TaskError`]. The dispatcher wraps every step failure
//! in a [`TaskExecutionError`] carrying the resume index of the failing step, and
//! the plan runner reports plan-level problems through [`PlanError`].

use std::path::PathBuf;
use thiserror::Error;

/// Failure raised while executing a single step.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The step's `type` is not one of `process`, `fileOp` or `parallel`
    #[error("The task type '{0}' is not supported")]
    UnsupportedTaskType(String),

    /// First term of a file operation is not a known verb
    #[error("The operation '{0}' is not supported")]
    UnsupportedOperation(String),

    /// Wrong number of terms, unexpected keyword or bad quoting in a file operation
    #[error("Malformed operation: {0}")]
    MalformedOperation(String),

    /// Empty file operation command
    #[error("Unexpected end of input")]
    UnexpectedEndOfInput,

    /// A `${...}` placeholder could not be resolved
    #[error("Unresolved argument '{placeholder}': {reason}")]
    UnresolvedArgument { placeholder: String, reason: String },

    /// `process`/`fileOp` step without a command
    #[error("A command must be specified for a {0} task")]
    MissingCommand(String),

    /// `parallel` step without children
    #[error("Child tasks must be specified for a parallel task")]
    MissingChildren,

    /// A parallel step listed another parallel step as a child
    #[error("A parallel task cannot contain another parallel task (child {0})")]
    NestedParallel(usize),

    /// The external executable exited with a non-zero code
    #[error("Command failed with error code {0}")]
    ProcessFailed(i32),

    /// The external executable was terminated by a signal
    #[error("Command was terminated by a signal")]
    ProcessTerminated,

    /// The external executable could not be launched
    #[error("Failed to launch '{program}': {source}")]
    ProcessLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// One or more children of a parallel step failed.
    ///
    /// `failures` is ordered by child position; the first entry is the
    /// representative failure.
    #[error("{}", parallel_message(.failures, .total))]
    ParallelFailure {
        failures: Vec<TaskExecutionError>,
        total: usize,
    },

    /// File I/O performed by a file operation failed
    #[error("File operation on {} failed: {source}", .path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A parallel worker thread panicked
    #[error("Parallel task {0} panicked")]
    Panicked(usize),
}

fn parallel_message(failures: &[TaskExecutionError], total: &usize) -> String {
    match failures.first() {
        Some(first) => format!(
            "{} ({} of {} parallel tasks failed)",
            first,
            failures.len(),
            total
        ),
        None => "Parallel tasks failed".to_string(),
    }
}

impl TaskError {
    /// Create a malformed operation error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedOperation(msg.into())
    }

    /// Create an unresolved argument error
    pub fn unresolved(placeholder: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvedArgument {
            placeholder: placeholder.into(),
            reason: reason.into(),
        }
    }

    /// Whether this failure came from an external process, directly or inside a fan-out.
    pub fn is_process_failure(&self) -> bool {
        match self {
            Self::ProcessFailed(_) | Self::ProcessTerminated | Self::ProcessLaunch { .. } => true,
            Self::ParallelFailure { failures, .. } => {
                failures.iter().any(|f| f.source.is_process_failure())
            }
            _ => false,
        }
    }
}

/// Uniform failure produced by the task dispatcher.
///
/// `index` is the resume position of the failing step in its command's task
/// list. Children of a parallel step report their parent's position.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct TaskExecutionError {
    pub index: usize,
    #[source]
    pub source: TaskError,
}

impl TaskExecutionError {
    pub fn new(index: usize, source: TaskError) -> Self {
        Self { index, source }
    }

    /// The wrapped step failure.
    pub fn kind(&self) -> &TaskError {
        &self.source
    }
}

/// Plan-level errors surfaced by loading, validation and the plan runner.
#[derive(Error, Debug)]
pub enum PlanError {
    /// IO errors (plan file, checkpoint)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Plan or checkpoint JSON could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested command is not defined in the plan
    #[error("The command '{0}' is not defined in the plan")]
    CommandNotFound(String),

    /// The command has no tasks
    #[error("The command '{0}' does not define any tasks")]
    NoTasks(String),

    /// Resume index past the end of the task list
    #[error("Cannot resume from step {index}: the command only has {len} tasks")]
    ResumeOutOfRange { index: usize, len: usize },

    /// A step definition failed structural validation
    #[error("Invalid step {location}: {source}")]
    InvalidStep {
        location: String,
        #[source]
        source: TaskError,
    },

    /// A step failed and the command propagates errors
    #[error("{message}")]
    StepFailed { index: usize, message: String },
}

/// Result type alias for plan operations
pub type Result<T> = std::result::Result<T, PlanError>;
