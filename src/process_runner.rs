//! External process steps.
//!
//! A process step's command is split into terms and handed to the wrapped
//! executable as its arguments. Standard input, output and error are inherited
//! and the child stays in the executor's process group, so the tool talks to
//! the terminal directly (prompts included) and nothing is buffered here.

use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::TaskError;
use crate::lexer::split_terms;
use crate::process_guard::{CHILDREN, KillOnParentExit};

/// Runs process steps against one external executable.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    executable: String,
    use_shell: bool,
}

impl ProcessRunner {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            use_shell: false,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            use_shell: config.use_shell,
        }
    }

    /// Launch through `sh -c` instead of a direct executable lookup.
    pub fn with_shell(mut self, use_shell: bool) -> Self {
        self.use_shell = use_shell;
        self
    }

    /// Run the executable with `command`'s terms and wait for it to exit.
    pub fn run(&self, command: &str) -> Result<(), TaskError> {
        let args = split_terms(command)?;
        info!("Running {} {}", self.executable, args.join(" "));

        let mut process = self.build_command(&args);
        process
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_parent_exit();

        let mut child = process.spawn().map_err(|source| self.launch_error(source))?;
        let tracked = CHILDREN.track(child.id());
        let status = child.wait().map_err(|source| self.launch_error(source))?;
        drop(tracked);

        debug!("{} exited with {}", self.executable, status);
        exit_status_result(status)
    }

    fn build_command(&self, args: &[String]) -> Command {
        if !self.use_shell {
            let mut command = Command::new(&self.executable);
            command.args(args);
            return command;
        }

        let line = std::iter::once(self.executable.as_str())
            .chain(args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ");

        let mut command = Command::new("sh");
        command.arg("-c").arg(line);
        command
    }

    fn launch_error(&self, source: std::io::Error) -> TaskError {
        TaskError::ProcessLaunch {
            program: self.executable.clone(),
            source,
        }
    }
}

fn exit_status_result(status: ExitStatus) -> Result<(), TaskError> {
    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(TaskError::ProcessFailed(code)),
        None => Err(TaskError::ProcessTerminated),
    }
}

/// Quote one word for `sh`.
fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}
