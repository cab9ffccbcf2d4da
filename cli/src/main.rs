//! forkwatch CLI binary
//!
//! Runs programs as supervised children and reports how they ended.

#![allow(unused_crate_dependencies)]

use clap::{Parser, Subcommand};
use cli::{CliError, Report};
use forkwatch_core::config::load_jobs_from_toml_path;
use forkwatch_core::{utils, ChildId, Reaped, SpawnRequest, Supervisor, SupervisorConfig};
use nix::sys::signal::Signal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

#[derive(Parser)]
#[command(name = "forkwatch")]
#[command(about = "Run programs as supervised child processes and report how they ended")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch one program and wait for it
    Run {
        /// Extra environment variable, KEY=VALUE (repeatable)
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = cli::parse_env_assignment)]
        env: Vec<(String, String)>,
        /// Start from an empty environment instead of inheriting it
        #[arg(long)]
        clear_env: bool,
        /// Execute the program path literally, without searching PATH
        #[arg(long)]
        no_path_search: bool,
        /// Kill the child with SIGKILL after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
        /// Program to run
        program: String,
        /// Arguments passed to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Launch every job of a TOML file and reap them as they finish
    Batch {
        /// Path to the jobs file
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
        /// Print one JSON object per job
        #[arg(long)]
        json: bool,
    },
    /// Classify a raw wait status (decimal or 0x hex)
    Decode {
        /// Raw status as filled in by waitpid
        #[arg(value_parser = cli::parse_raw_status, allow_hyphen_values = true)]
        raw: i32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = utils::init_tracing(&cli.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let result = match cli.command {
        Commands::Run {
            env,
            clear_env,
            no_path_search,
            timeout_secs,
            json,
            program,
            args,
        } => {
            let request = cli::build_request(&program, &args, env, clear_env, !no_path_search);
            run(request, timeout_secs.map(Duration::from_secs), json).await
        }
        Commands::Batch { config, json } => {
            match tokio::task::spawn_blocking(move || batch(config, json)).await {
                Ok(result) => result,
                Err(e) => Err(CliError::CommandFailed(format!("batch task failed: {}", e))),
            }
        }
        Commands::Decode { raw } => {
            println!("{}", cli::describe_raw_status(raw));
            Ok(0)
        }
    };

    match result {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error [{}]: {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}

/// Interval between status polls while a timeout is armed
const POLL_INTERVAL: Duration = Duration::from_millis(20);

async fn run(request: SpawnRequest, timeout: Option<Duration>, json: bool) -> cli::Result<i32> {
    let mut supervisor = Supervisor::new(SupervisorConfig::default());
    let id = supervisor.spawn(&request)?;
    if !json {
        println!("PID {}: Started child PID {}.", std::process::id(), id);
    }

    if let Some(limit) = timeout {
        if let Some(reaped) = poll_until_deadline(&mut supervisor, id, limit, json).await? {
            return finish(&reaped, &request.program, json);
        }
        warn!("Child PID {} still running after {:?}; killing it", id, limit);
        // Not yet reaped, so the pid cannot have been reused
        supervisor.signal(id, Signal::SIGKILL)?;
    }

    let reaped = tokio::task::spawn_blocking(move || await_termination(&mut supervisor, id, json))
        .await
        .map_err(|e| CliError::CommandFailed(format!("wait task failed: {}", e)))??;
    finish(&reaped, &request.program, json)
}

/// Poll `id` until it terminates or `limit` elapses; `None` on timeout
async fn poll_until_deadline(
    supervisor: &mut Supervisor,
    id: ChildId,
    limit: Duration,
    json: bool,
) -> cli::Result<Option<Reaped>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(reaped) = supervisor.try_wait_for(id)? {
            if reaped.state.is_terminal() {
                return Ok(Some(reaped));
            }
            report_stop(&reaped, json);
            continue;
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        tokio::time::sleep((deadline - now).min(POLL_INTERVAL)).await;
    }
}

fn finish(reaped: &Reaped, program: &str, json: bool) -> cli::Result<i32> {
    let report = Report::new(reaped, program, None);
    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}", cli::describe(reaped));
    }
    Ok(report.exit_code)
}

fn report_stop(reaped: &Reaped, json: bool) {
    debug!("Child PID {} {}; waiting for it to continue", reaped.id, reaped.state);
    if !json {
        println!("{}", cli::describe(reaped));
    }
}

/// Wait for `id` until it terminates, reporting stops along the way
fn await_termination(
    supervisor: &mut Supervisor,
    id: ChildId,
    json: bool,
) -> cli::Result<Reaped> {
    loop {
        let reaped = supervisor.wait_for(id)?;
        if reaped.state.is_terminal() {
            return Ok(reaped);
        }
        report_stop(&reaped, json);
    }
}

fn batch(config: PathBuf, json: bool) -> cli::Result<i32> {
    let jobs = load_jobs_from_toml_path(&config)?;
    let mut supervisor = Supervisor::new(jobs.supervisor);
    let mut names: HashMap<ChildId, (String, String)> = HashMap::new();
    let mut all_succeeded = true;

    for job in &jobs.jobs {
        match supervisor.spawn(&job.request) {
            Ok(id) => {
                names.insert(id, (job.name.clone(), job.request.program.clone()));
            }
            Err(e) => {
                all_succeeded = false;
                eprintln!("{}\tnot started: {}", job.name, e);
            }
        }
    }

    while !supervisor.is_empty() {
        let reaped = supervisor.reap_any()?;
        if !reaped.state.is_terminal() {
            debug!("Child PID {} {}", reaped.id, reaped.state);
            continue;
        }
        let (name, program) = names
            .remove(&reaped.id)
            .unwrap_or_else(|| (reaped.id.to_string(), String::new()));
        let report = Report::new(&reaped, &program, Some(name.clone()));
        all_succeeded &= report.exit_code == 0;

        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!("{}\t{}", name, cli::describe(&reaped));
        }
    }

    Ok(if all_succeeded { 0 } else { 1 })
}
