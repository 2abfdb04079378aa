//! piebot CLI - run the pipeline, replay journals, manage runtime state.
//!
//! `run` wires the whole stack together: security config from the
//! environment, journal under the runtime root, the built-in tools behind
//! the registry choke point, role routing from `router.yaml`, and one
//! orchestrated observation. Exit status follows the run verdict.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use piebot_audit::{AuditJournal, replay_audit_log};
use piebot_engine::Orchestrator;
use piebot_memory::StateAdapter;
use piebot_models::ModelRouter;
use piebot_policy::{PolicyEngine, SecurityConfig};
use piebot_tools::builtins::{
    fs_list_dir_spec, fs_read_file_spec, git_apply_patch_spec, git_diff_spec,
};
use piebot_tools::{ApprovalGate, ToolRegistry};
use piebot_types::{JsonMap, Observation};

/// Subdirectories expected under the runtime root.
const RUNTIME_DIRS: [&str; 5] = [
    "state",
    "memory",
    "logs",
    "artifacts",
    "artifacts/diffs",
];

const STATE_FILENAME: &str = "state.json";

#[derive(Parser, Debug)]
#[command(name = "piebot", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive one observation through the plan/execute/critique pipeline
    Run {
        /// Runtime directory (journal, artifacts, state)
        #[arg(long, default_value = "runtime")]
        runtime: PathBuf,
        /// Repository root that read tools resolve against
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Path to the role routing document
        #[arg(long, default_value = "configs/router.yaml")]
        router: PathBuf,
        /// Repo-relative file to read; omitting it runs a no-op observation
        #[arg(long)]
        read_file: Option<String>,
        /// How many attempts the critic may spend before a retry becomes a failure
        #[arg(long, default_value_t = 2)]
        max_attempts: u32,
    },
    /// Verify and replay an audit journal
    Replay {
        /// Path to the audit.jsonl file
        log: PathBuf,
    },
    /// Initialize the durable state file if it does not exist
    InitState {
        #[arg(long, default_value = "runtime")]
        runtime: PathBuf,
    },
    /// Create the runtime directory layout
    SetupRuntime {
        #[arg(long, default_value = "runtime")]
        runtime: PathBuf,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match dispatch(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Run {
            runtime,
            repo,
            router,
            read_file,
            max_attempts,
        } => run(&runtime, &repo, &router, read_file, max_attempts),
        Commands::Replay { log } => replay(&log),
        Commands::InitState { runtime } => init_state(&runtime),
        Commands::SetupRuntime { runtime } => setup_runtime(&runtime),
    }
}

fn run(
    runtime: &PathBuf,
    repo: &PathBuf,
    router_path: &PathBuf,
    read_file: Option<String>,
    max_attempts: u32,
) -> Result<ExitCode> {
    let security = SecurityConfig::from_env();
    let journal = Arc::new(AuditJournal::for_runtime(runtime).context("opening audit journal")?);

    let mut tools = ToolRegistry::new(
        PolicyEngine::new(security.clone()),
        ApprovalGate::new(security.approval_token.clone()),
        Arc::clone(&journal),
        repo.clone(),
        runtime.clone(),
    );
    tools.register(fs_list_dir_spec())?;
    tools.register(fs_read_file_spec())?;
    tools.register(git_diff_spec())?;
    tools.register(git_apply_patch_spec())?;

    let router = ModelRouter::load(router_path).context("loading router config")?;
    let orchestrator = Orchestrator::new(tools, journal, router).with_max_attempts(max_attempts);

    let run_id = Uuid::new_v4().simple().to_string();
    let observation = match read_file {
        Some(path) => {
            let mut data = JsonMap::new();
            data.insert("path".to_string(), serde_json::Value::String(path));
            Observation::new(run_id, "file_read", data)
        }
        None => {
            let mut data = JsonMap::new();
            data.insert("text".to_string(), serde_json::Value::String(String::new()));
            Observation::new(run_id, "text", data)
        }
    };

    tracing::info!(run_id = %observation.run_id, kind = %observation.kind, "starting run");
    let result = orchestrator.run_once(&observation);
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(if result.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn replay(log: &PathBuf) -> Result<ExitCode> {
    match replay_audit_log(log) {
        Ok(summary) => {
            println!(
                "REPLAY OK: run_id={} events={} state_hash={}",
                summary.run_id, summary.events, summary.replay_state_hash
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("REPLAY FAIL: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn init_state(runtime: &PathBuf) -> Result<ExitCode> {
    let state_path = runtime.join("state").join(STATE_FILENAME);
    let adapter = StateAdapter::load_or_init(&state_path).context("initializing state")?;
    println!("OK: state initialized at {}", adapter.path().display());
    Ok(ExitCode::SUCCESS)
}

fn setup_runtime(runtime: &PathBuf) -> Result<ExitCode> {
    for rel in RUNTIME_DIRS {
        std::fs::create_dir_all(runtime.join(rel))
            .with_context(|| format!("creating {rel}"))?;
    }
    // Sentinel to catch accidental commits of generated data.
    std::fs::write(
        runtime.join(".generated"),
        "This directory is generated-only. Do not commit.\n",
    )
    .context("writing sentinel")?;
    println!("OK: runtime initialized at {}", runtime.display());
    Ok(ExitCode::SUCCESS)
}
