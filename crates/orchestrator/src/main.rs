use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use orchestrator::{cli_commands, load_manager_defaults, Manager, ManagerConfig};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "bugorch", about = "Bug-triage orchestrator: reproduce, minimize and triage a GitHub issue")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the manager end to end: preflight, reproduce, minimize, triage.
    Run(RunArgs),
    /// Print manager/worker session status for a run.
    Status {
        #[arg(long)]
        run_id: String,
        #[arg(long, default_value = "runs")]
        runs_root: PathBuf,
    },
    /// Attach to the manager's or a worker's tmux session.
    Attach {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        worker: String,
        #[arg(long, default_value = "runs")]
        runs_root: PathBuf,
    },
    /// Send a line of text to a worker's tmux pane.
    Send {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        worker: String,
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "runs")]
        runs_root: PathBuf,
    },
    /// Kill every session for a run and mark it stopped.
    Stop {
        #[arg(long)]
        run_id: String,
        #[arg(long, default_value = "runs")]
        runs_root: PathBuf,
    },
    /// List every run directory and its terminal status.
    List {
        #[arg(long, default_value = "runs")]
        runs_root: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    issue_url: String,
    #[arg(long)]
    repo_path: Option<PathBuf>,
    #[arg(long)]
    runs_root: Option<PathBuf>,
    #[arg(long)]
    min_workers: Option<u32>,
    #[arg(long)]
    max_workers: Option<u32>,
    #[arg(long)]
    timeout_sec: Option<u64>,
    #[arg(long)]
    poll_interval_sec: Option<u64>,
    #[arg(long)]
    repro_validation_runs: Option<u32>,
    #[arg(long)]
    repro_min_matches: Option<u32>,
    #[arg(long)]
    validation_python_version: Option<String>,
    #[arg(long)]
    worker_model: Option<String>,
    #[arg(long)]
    manager_model: Option<String>,
    /// Explicit path to a bugorch.toml config file (overrides BUGORCH_CONFIG
    /// and the default ./bugorch.toml lookup).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn make_run_id() -> String {
    format!("run-{}", chrono::Utc::now().format("%Y%m%d%H%M%S"))
}

async fn run_command(args: RunArgs) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir()?;
    let defaults = load_manager_defaults(args.config.as_deref(), &cwd)?;

    let run_id = args.run_id.unwrap_or_else(make_run_id);
    let repo_path = args.repo_path.unwrap_or(defaults.repo_path);
    let runs_root = args.runs_root.unwrap_or(defaults.runs_root);

    let config = ManagerConfig {
        run_id: run_id.clone(),
        issue_url: args.issue_url,
        repo_path,
        runs_root,
        min_workers: args.min_workers.unwrap_or(defaults.min_workers),
        max_workers: args.max_workers.unwrap_or(defaults.max_workers),
        timeout_sec: args.timeout_sec.unwrap_or(defaults.timeout_sec),
        poll_interval_sec: args.poll_interval_sec.unwrap_or(defaults.poll_interval_sec),
        repro_validation_runs: args.repro_validation_runs.unwrap_or(defaults.repro_validation_runs),
        repro_min_matches: args.repro_min_matches.unwrap_or(defaults.repro_min_matches),
        validation_python_version: args.validation_python_version.unwrap_or(defaults.validation_python_version),
        worker_model: args.worker_model.unwrap_or(defaults.worker_model),
        manager_model: args.manager_model.unwrap_or(defaults.manager_model),
    };

    info!(run_id = %run_id, "starting run");
    let mut manager = Manager::new(config);
    let decision = manager.run().await?;
    println!("{}", serde_json::to_string_pretty(&decision)?);

    Ok(match decision.status.as_str() {
        "ok" => 0,
        "needs-human" => 2,
        _ => 1,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Run(args) => run_command(args).await?,
        Commands::Status { run_id, runs_root } => {
            cli_commands::status(&run_id, &runs_root).await?;
            0
        }
        Commands::Attach { run_id, worker, runs_root } => {
            if let Err(err) = cli_commands::attach(&run_id, &worker, &runs_root) {
                error!("attach failed: {err}");
                1
            } else {
                0
            }
        }
        Commands::Send { run_id, worker, text, runs_root } => {
            cli_commands::send(&run_id, &worker, &text, &runs_root).await?;
            0
        }
        Commands::Stop { run_id, runs_root } => {
            cli_commands::stop(&run_id, &runs_root).await?;
            0
        }
        Commands::List { runs_root } => {
            cli_commands::list(&runs_root)?;
            0
        }
    };

    std::process::exit(exit_code);
}
