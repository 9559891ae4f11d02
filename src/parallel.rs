//! Parallel fan-out of a step's children.
//!
//! Each child runs on its own scoped thread through the full dispatcher, so it
//! gets argument substitution like any top-level step. The coordinator joins
//! every child before returning; a failing child does not cancel its siblings.
//! When several children fail, the one at the lowest position is reported
//! first. Children touching the same file race; the engine does not order them.

use std::thread;
use tracing::{debug, info};

use crate::error::{TaskError, TaskExecutionError};
use crate::executor::TaskExecutor;
use crate::plan::Step;

/// Run the children of a `parallel` step concurrently and wait for all of them.
pub fn run_parallel(executor: &TaskExecutor, step: &mut Step) -> Result<(), TaskError> {
    // Shape checks happen before any child starts
    step.parallel_children()?;

    let resume_index = step.resume_index;
    let children = step.children.as_mut().ok_or(TaskError::MissingChildren)?;
    let total = children.len();
    for child in children.iter_mut() {
        child.resume_index = resume_index;
    }

    info!("Running {} tasks in parallel", total);

    let results: Vec<Result<(), TaskExecutionError>> = thread::scope(|scope| {
        let handles: Vec<_> = children
            .iter_mut()
            .map(|child| scope.spawn(move || executor.execute(child)))
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(position, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(TaskExecutionError::new(
                        resume_index,
                        TaskError::Panicked(position),
                    ))
                })
            })
            .collect()
    });

    let failures: Vec<TaskExecutionError> = results.into_iter().filter_map(Result::err).collect();
    if failures.is_empty() {
        debug!("All {} parallel tasks completed", total);
        return Ok(());
    }

    Err(TaskError::ParallelFailure { failures, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process_runner::ProcessRunner;
    use crate::substitution::ArgumentResolver;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn executor(args: &[&str]) -> TaskExecutor {
        TaskExecutor::with_parts(
            ArgumentResolver::with_env_lookup(
                args.iter().map(|s| s.to_string()).collect(),
                |_| None,
            ),
            ProcessRunner::new("sh"),
        )
    }

    fn write_script(dir: &TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_children_succeed() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let mut step = Step::parallel(vec![
            Step::file_op(format!("write A to {}", a.display())),
            Step::file_op(format!("write B to {}", b.display())),
        ]);

        run_parallel(&executor(&[]), &mut step).unwrap();
        assert_eq!(fs::read_to_string(a).unwrap(), "A");
        assert_eq!(fs::read_to_string(b).unwrap(), "B");
    }

    #[test]
    fn test_children_run_concurrently() {
        let dir = TempDir::new().unwrap();
        let sleeper = write_script(&dir, "sleep.sh", "sleep 1\n");
        let mut step = Step::parallel(vec![
            Step::process(sleeper.clone()),
            Step::process(sleeper.clone()),
            Step::process(sleeper),
        ]);

        let start = Instant::now();
        run_parallel(&executor(&[]), &mut step).unwrap();
        assert!(start.elapsed() < Duration::from_millis(2500));
    }

    #[test]
    fn test_failure_waits_for_siblings_and_keeps_their_effects() {
        let dir = TempDir::new().unwrap();
        let fail = write_script(&dir, "fail.sh", "exit 1\n");
        let marker = dir.path().join("marker.txt");
        let slow = write_script(
            &dir,
            "slow.sh",
            &format!("sleep 0.3\nprintf done > {}\n", marker.display()),
        );
        let mut step = Step::parallel(vec![Step::process(fail), Step::process(slow)]);
        step.resume_index = 7;

        let err = run_parallel(&executor(&[]), &mut step).unwrap_err();
        match err {
            TaskError::ParallelFailure { failures, total } => {
                assert_eq!(total, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 7);
                assert!(matches!(failures[0].kind(), TaskError::ProcessFailed(1)));
            }
            other => panic!("Expected ParallelFailure, got {:?}", other),
        }
        assert_eq!(fs::read_to_string(marker).unwrap(), "done");
    }

    #[test]
    fn test_lowest_position_failure_reported_first() {
        let dir = TempDir::new().unwrap();
        let slow_fail = write_script(&dir, "slow_fail.sh", "sleep 0.3\nexit 4\n");
        let fast_fail = write_script(&dir, "fast_fail.sh", "exit 5\n");
        let mut step = Step::parallel(vec![Step::process(slow_fail), Step::process(fast_fail)]);

        let err = run_parallel(&executor(&[]), &mut step).unwrap_err();
        match err {
            TaskError::ParallelFailure { failures, .. } => {
                assert_eq!(failures.len(), 2);
                assert!(matches!(failures[0].kind(), TaskError::ProcessFailed(4)));
                assert!(matches!(failures[1].kind(), TaskError::ProcessFailed(5)));
            }
            other => panic!("Expected ParallelFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_parallel_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        let mut step = Step::parallel(vec![
            Step::file_op(format!("write x to {}", out.display())),
            Step::parallel(vec![Step::process("true")]),
        ]);

        assert!(matches!(
            run_parallel(&executor(&[]), &mut step),
            Err(TaskError::NestedParallel(1))
        ));
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_children() {
        let mut step = Step::new("parallel");
        assert!(matches!(
            run_parallel(&executor(&[]), &mut step),
            Err(TaskError::MissingChildren)
        ));
    }

    #[test]
    fn test_children_receive_substitution_and_parent_index() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        let mut step = Step::parallel(vec![Step::file_op(format!(
            "write ${{0}} to {}",
            out.display()
        ))]);
        step.resume_index = 3;

        run_parallel(&executor(&["substituted"]), &mut step).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "substituted");

        let children = step.children.as_ref().unwrap();
        assert_eq!(children[0].resume_index, 3);
        assert!(children[0].command.as_ref().unwrap().starts_with("write substituted"));
    }
}
