//! plan-executor - Main entry point

use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use plan_executor::cli::{Cli, Commands, RunArgs};
use plan_executor::{
    EngineConfig, Plan, PlanError, PlanRunner, RunGuard, process_guard, resume_guidance,
};

/// Initialize the tracing subscriber; RUST_LOG overrides the default level
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let result = match cli.command {
        Commands::Run(args) => run_command(&args),
        Commands::Validate { planfile } => validate_plan(&planfile),
        Commands::List { planfile } => list_commands(&planfile),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            if let Some(PlanError::StepFailed { index, .. }) = e.downcast_ref::<PlanError>() {
                eprintln!("{}", resume_guidance(*index));
            }
            ExitCode::FAILURE
        }
    }
}

fn load_plan(planfile: &Path) -> Result<Plan> {
    if !planfile.exists() {
        anyhow::bail!("Plan file {} does not exist", planfile.display());
    }
    Plan::load_from_file(planfile)
        .with_context(|| format!("Failed to load plan file {}", planfile.display()))
}

fn engine_config(args: &RunArgs) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(executable) = &args.executable {
        config = config.with_executable(executable.clone());
    }
    if args.shell {
        config = config.with_shell(true);
    }
    if args.no_checkpoint {
        config = config.with_checkpoint(None);
    } else if let Some(path) = &args.checkpoint {
        config = config.with_checkpoint(Some(path.clone()));
    }
    config
}

fn run_command(args: &RunArgs) -> Result<()> {
    let plan = load_plan(&args.planfile)?;
    let command = plan.command(&args.command)?.clone();

    let config = engine_config(args);
    debug!("Engine configuration: {:?}", config);

    let runner = PlanRunner::from_config(args.arguments.clone(), &config);

    let start = match (args.resume_from, args.resume) {
        (Some(index), _) => index,
        (None, true) => match runner.checkpoint_index()? {
            Some(index) => {
                info!("Resuming from checkpoint at step {}", index);
                index
            }
            None => {
                warn!("No resume checkpoint found, starting from the first step");
                0
            }
        },
        (None, false) => 0,
    };

    // Terminates any process step still running if we leave early
    let guard = RunGuard::new();
    let outcome = runner.run(command, start);
    debug!("{} process step(s) still running", guard.live_children());
    drop(guard);

    let outcome = outcome?;
    match &outcome.failure {
        Some(failure) => {
            error!("Step {} failed: {}", failure.index, failure.message);
            println!("Finished {} with a handled failure", outcome.label);
        }
        None => println!("Finished {}!", outcome.label),
    }
    Ok(())
}

fn validate_plan(planfile: &Path) -> Result<()> {
    let plan = load_plan(planfile)?;
    let mut invalid = 0;
    for (name, command) in plan.iter() {
        let checked = if command.tasks.is_empty() {
            Err(PlanError::NoTasks(name.clone()))
        } else {
            command.validate()
        };
        match checked {
            Ok(()) => println!("✓ {} ({} tasks)", name, command.tasks.len()),
            Err(e) => {
                invalid += 1;
                println!("✗ {}: {}", name, e);
            }
        }
    }
    if invalid > 0 {
        anyhow::bail!("{} of {} commands are invalid", invalid, plan.len());
    }
    Ok(())
}

fn list_commands(planfile: &Path) -> Result<()> {
    let plan = load_plan(planfile)?;
    for (name, command) in plan.iter() {
        println!("{:<24} {} ({} tasks)", name, command.label, command.tasks.len());
    }
    Ok(())
}
