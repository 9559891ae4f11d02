//! Runtime argument substitution for step commands.
//!
//! `${0}`, `${1}`, ... resolve positionally against the arguments supplied to
//! the run; `${NAME}` resolves against the process environment.

use regex::Regex;
use std::collections::HashSet;
use std::fmt;

use crate::error::TaskError;

const PLACEHOLDER_PATTERN: &str = r"\$\{([0-9]+|[A-Za-z_][A-Za-z0-9_]*)\}";

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves `${...}` placeholders against positional arguments and the environment.
pub struct ArgumentResolver {
    arguments: Vec<String>,
    pattern: Regex,
    env: EnvLookup,
}

impl ArgumentResolver {
    /// Resolver reading environment placeholders from the process environment.
    pub fn new(arguments: Vec<String>) -> Self {
        Self::with_env_lookup(arguments, |name| std::env::var(name).ok())
    }

    /// Resolver with a custom environment source.
    pub fn with_env_lookup<F>(arguments: Vec<String>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            arguments,
            // The pattern is a compile-time constant
            pattern: Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"),
            env: Box::new(env),
        }
    }

    /// Substitute every placeholder in `command`.
    ///
    /// Each round takes the first remaining placeholder, resolves it and
    /// replaces all of its occurrences, then rescans. A placeholder that
    /// reappears after it was substituted (an argument value containing it)
    /// is rejected instead of looping forever.
    pub fn substitute(&self, command: &str) -> Result<String, TaskError> {
        let mut command = command.to_string();
        let mut substituted = HashSet::new();

        loop {
            let (placeholder, token) = match self.pattern.captures(&command) {
                Some(caps) => (caps[0].to_string(), caps[1].to_string()),
                None => return Ok(command),
            };
            if !substituted.insert(placeholder.clone()) {
                return Err(TaskError::unresolved(
                    placeholder,
                    "an argument value refers back to the placeholder",
                ));
            }
            let value = self.resolve(&placeholder, &token)?;
            command = command.replace(&placeholder, &value);
        }
    }

    fn resolve(&self, placeholder: &str, token: &str) -> Result<String, TaskError> {
        match token.parse::<usize>() {
            Ok(position) => {
                if self.arguments.is_empty() {
                    return Err(TaskError::unresolved(placeholder, "no arguments were supplied"));
                }
                match self.arguments.get(position) {
                    Some(value) if !value.is_empty() => Ok(value.clone()),
                    Some(_) => Err(TaskError::unresolved(
                        placeholder,
                        format!("argument {} is empty", position),
                    )),
                    None => Err(TaskError::unresolved(
                        placeholder,
                        format!(
                            "argument {} was not supplied ({} given)",
                            position,
                            self.arguments.len()
                        ),
                    )),
                }
            }
            Err(_) => match (self.env)(token) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(TaskError::unresolved(
                    placeholder,
                    format!("environment variable {} is not set", token),
                )),
            },
        }
    }
}

impl fmt::Debug for ArgumentResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentResolver")
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}
