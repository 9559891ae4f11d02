//! Task dispatcher: the single entry point for running one step.
//!
//! Dispatch resolves the step's type, substitutes runtime arguments into its
//! command (rewriting the step in place), runs the matching step runner and
//! wraps any failure with the step's resume index.

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{TaskError, TaskExecutionError};
use crate::file_ops;
use crate::parallel::run_parallel;
use crate::plan::{Step, TaskType};
use crate::process_runner::ProcessRunner;
use crate::substitution::ArgumentResolver;

/// Runs steps. Stateless between calls apart from the read-only arguments, so
/// one executor is shared by every thread of a parallel fan-out.
#[derive(Debug)]
pub struct TaskExecutor {
    resolver: ArgumentResolver,
    process: ProcessRunner,
}

impl TaskExecutor {
    pub fn new(arguments: Vec<String>, config: &EngineConfig) -> Self {
        Self::with_parts(
            ArgumentResolver::new(arguments),
            ProcessRunner::from_config(config),
        )
    }

    pub fn with_parts(resolver: ArgumentResolver, process: ProcessRunner) -> Self {
        Self { resolver, process }
    }

    /// Execute `step`. On return its command holds the substituted text.
    pub fn execute(&self, step: &mut Step) -> Result<(), TaskExecutionError> {
        self.dispatch(step)
            .map_err(|source| TaskExecutionError::new(step.resume_index, source))
    }

    fn dispatch(&self, step: &mut Step) -> Result<(), TaskError> {
        let kind = step.kind()?;

        if let Some(command) = step.command.as_mut() {
            let substituted = self.resolver.substitute(command)?;
            *command = substituted;
        }

        debug!(
            "Dispatching {} step {}: {}",
            kind,
            step.resume_index,
            step.command.as_deref().unwrap_or("")
        );

        match kind {
            TaskType::Process => self.process.run(step.required_command()?),
            TaskType::FileOp => file_ops::execute(step.required_command()?),
            TaskType::Parallel => run_parallel(self, step),
        }
    }
}
