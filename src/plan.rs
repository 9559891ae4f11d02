//! Plan documents: named commands made of ordered steps.
//!
//! A plan file is a JSON object mapping command names to commands:
//!
//! ```json
//! {
//!   "createScratch": {
//!     "label": "Create Scratch Org",
//!     "tasks": [
//!       { "type": "process", "command": "force:org:create -a ${0}" },
//!       { "type": "parallel", "children": [
//!           { "type": "process", "command": "force:source:push" },
//!           { "type": "fileOp", "command": "write done to status.txt" }
//!       ] }
//!     ],
//!     "onError": { "type": "fileOp", "command": "write failed to status.txt" },
//!     "finally": { "type": "process", "command": "force:org:list" },
//!     "propagateErrors": true
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use strum::{Display, EnumIter, EnumString};

use crate::error::{PlanError, Result, TaskError};

/// Step types understood by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum TaskType {
    /// Spawn the wrapped external executable
    #[strum(serialize = "process")]
    Process,
    /// Run a file-operation command (`replace`, `move`, `delete`, `append`, `write`)
    #[strum(to_string = "fileOp", serialize = "fs")]
    FileOp,
    /// Fan the step's children out concurrently
    #[strum(serialize = "parallel")]
    Parallel,
}

/// One unit of work inside a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Declared type, resolved with [`Step::kind`]. Kept as text so an unknown
    /// type fails when the step runs rather than when the plan loads.
    #[serde(rename = "type")]
    pub task_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, alias = "parallelTasks", skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Step>>,

    /// Resumption position: the index in the owning command's `tasks` at which
    /// a rerun should start if this step fails. Set by the plan runner, and
    /// copied from a parallel step onto its children. Not the child's own
    /// offset inside a fan-out.
    #[serde(skip)]
    pub resume_index: usize,
}

impl Step {
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            command: None,
            children: None,
            resume_index: 0,
        }
    }

    /// A `process` step running `command` through the external executable.
    pub fn process(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::new(TaskType::Process.to_string())
        }
    }

    /// A `fileOp` step.
    pub fn file_op(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::new(TaskType::FileOp.to_string())
        }
    }

    /// A `parallel` step fanning out `children`.
    pub fn parallel(children: Vec<Step>) -> Self {
        Self {
            children: Some(children),
            ..Self::new(TaskType::Parallel.to_string())
        }
    }

    /// Resolve the declared type.
    pub fn kind(&self) -> std::result::Result<TaskType, TaskError> {
        self.task_type
            .parse()
            .map_err(|_| TaskError::UnsupportedTaskType(self.task_type.clone()))
    }

    /// The command text, required to be present and non-blank.
    pub fn required_command(&self) -> std::result::Result<&str, TaskError> {
        match self.command.as_deref() {
            Some(command) if !command.trim().is_empty() => Ok(command),
            _ => Err(TaskError::MissingCommand(self.task_type.clone())),
        }
    }

    /// Check the step's shape without executing anything.
    pub fn validate(&self) -> std::result::Result<(), TaskError> {
        match self.kind()? {
            TaskType::Process | TaskType::FileOp => self.required_command().map(|_| ()),
            TaskType::Parallel => {
                let children = self.parallel_children()?;
                children.iter().try_for_each(Step::validate)
            }
        }
    }

    /// Children of a parallel step, checked to be non-empty and free of nested
    /// parallel steps.
    pub fn parallel_children(&self) -> std::result::Result<&[Step], TaskError> {
        let children = match self.children.as_deref() {
            Some(children) if !children.is_empty() => children,
            _ => return Err(TaskError::MissingChildren),
        };
        if let Some(position) = children
            .iter()
            .position(|child| matches!(child.kind(), Ok(TaskType::Parallel)))
        {
            return Err(TaskError::NestedParallel(position));
        }
        Ok(children)
    }
}

/// A named, ordered sequence of steps plus its error policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Cosmetic, only logged
    #[serde(default)]
    pub label: String,

    pub tasks: Vec<Step>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<Step>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finally: Option<Step>,

    #[serde(default)]
    pub propagate_errors: bool,
}

impl Command {
    pub fn new(label: impl Into<String>, tasks: Vec<Step>) -> Self {
        Self {
            label: label.into(),
            tasks,
            on_error: None,
            finally: None,
            propagate_errors: false,
        }
    }

    pub fn with_on_error(mut self, step: Step) -> Self {
        self.on_error = Some(step);
        self
    }

    pub fn with_finally(mut self, step: Step) -> Self {
        self.finally = Some(step);
        self
    }

    pub fn propagating(mut self, propagate: bool) -> Self {
        self.propagate_errors = propagate;
        self
    }

    /// Validate every step, including the on-error and finally steps.
    pub fn validate(&self) -> Result<()> {
        for (index, step) in self.tasks.iter().enumerate() {
            step.validate().map_err(|source| PlanError::InvalidStep {
                location: format!("tasks[{}]", index),
                source,
            })?;
        }
        if let Some(step) = &self.on_error {
            step.validate().map_err(|source| PlanError::InvalidStep {
                location: "onError".to_string(),
                source,
            })?;
        }
        if let Some(step) = &self.finally {
            step.validate().map_err(|source| PlanError::InvalidStep {
                location: "finally".to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

/// All commands available to a run, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    commands: BTreeMap<String, Command>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a plan from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn insert(&mut self, name: impl Into<String>, command: Command) {
        self.commands.insert(name.into(), command);
    }

    /// Look up a command by name; it must exist and have at least one task.
    pub fn command(&self, name: &str) -> Result<&Command> {
        let command = self
            .commands
            .get(name)
            .ok_or_else(|| PlanError::CommandNotFound(name.to_string()))?;
        if command.tasks.is_empty() {
            return Err(PlanError::NoTasks(name.to_string()));
        }
        Ok(command)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Command)> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
