//! Plan Executor Library
//!
//! A declarative task-plan engine: a plan names commands, each command is an
//! ordered list of steps (external process, file operation or parallel
//! fan-out), runtime arguments are substituted into step commands, and a
//! failed run can be resumed from the failing step.

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod file_ops;
pub mod lexer;
pub mod parallel;
pub mod plan;
pub mod process_guard;
pub mod process_runner;
pub mod runner;
pub mod substitution;

pub use checkpoint::{CheckpointStore, ResumeCheckpoint};
pub use config::EngineConfig;
pub use error::{PlanError, TaskError, TaskExecutionError};
pub use executor::TaskExecutor;
pub use file_ops::{FileOperation, FileVerb};
pub use plan::{Command, Plan, Step, TaskType};
pub use process_guard::{ChildRegistry, RunGuard};
pub use process_runner::ProcessRunner;
pub use runner::{PlanRunner, RunOutcome, StepFailure, resume_guidance};
pub use substitution::ArgumentResolver;
