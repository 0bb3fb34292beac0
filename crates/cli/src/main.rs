mod agent;
mod config;
mod coordinator;
mod logging;
mod report;

use anyhow::Context;
use clap::{Parser, Subcommand};
use common::QuarantineLayout;
use reaper::{AuditLog, CleanupAction, LockManager};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::AgentRun;
use crate::config::AgentConfig;
use crate::report::format_bytes;

/// `--agent` value that runs every known agent in sequence.
const ALL_AGENTS: &str = "all";

#[derive(Parser)]
#[command(name = "cleanup-agent")]
#[command(about = "Finds unreferenced JS/TS files and moves them into a shared quarantine", long_about = None)]
struct Cli {
    /// Workspace root (defaults to the current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Increase console verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan, analyze and quarantine unused files for one agent.
    Run {
        /// Agent profile (backend, frontend, a name from the config file, or
        /// `all` to run every one of them in sequence).
        #[arg(long, default_value = "backend")]
        agent: String,
        /// Config file (defaults to <root>/cleanup-agents.toml when present).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Report findings without moving anything.
        #[arg(long)]
        dry_run: bool,
        /// Reachability rounds (1 single hop, 0 until nothing changes).
        #[arg(long)]
        depth: Option<usize>,
        /// Write the JSON report to this file.
        #[arg(long)]
        report: Option<PathBuf>,
        /// How long to wait for another agent's lock.
        #[arg(long)]
        lock_timeout_ms: Option<u64>,
    },
    /// Generate a shell script that restores the files of a session.
    Rollback {
        /// Session id, or a timestamp prefix such as 2026-10-19T08:30.
        session: String,
    },
    /// List recorded sessions.
    History,
    /// Remove the shared lock if NAME holds it.
    ReleaseLock {
        #[arg(long)]
        agent: String,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let root = resolve_root(cli.root)?;
    let layout = QuarantineLayout::new(&root);
    logging::init_logging(cli.verbose, file_sink(&cli.command, &layout).as_deref())?;

    match cli.command {
        Commands::Run {
            agent,
            config,
            dry_run,
            depth,
            report,
            lock_timeout_ms,
        } => {
            let load = |name: &str| -> anyhow::Result<AgentConfig> {
                let mut cfg = AgentConfig::load(name, &root, config.as_deref())?;
                if dry_run {
                    cfg.dry_run = true;
                }
                if let Some(depth) = depth {
                    cfg.depth = depth;
                }
                if let Some(ms) = lock_timeout_ms {
                    cfg.lock_timeout = Duration::from_millis(ms);
                }
                Ok(cfg)
            };
            if agent == ALL_AGENTS {
                let configs = AgentConfig::declared_agents(&root, config.as_deref())?
                    .iter()
                    .map(|name| load(name.as_str()))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                cmd_run_all(configs, &root, dry_run, report.as_deref())
            } else {
                cmd_run(load(&agent)?, &root, report.as_deref())
            }
        }
        Commands::Rollback { session } => cmd_rollback(&layout, &session),
        Commands::History => cmd_history(&layout),
        Commands::ReleaseLock { agent } => cmd_release_lock(&layout, &agent),
    }
}

/// Absolute, symlink-free workspace root. Quarantine targets and rollback
/// scripts are built from it, so they must not depend on the cwd.
fn resolve_root(root: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    dunce::canonicalize(&root)
        .with_context(|| format!("Workspace root {} does not exist", root.display()))
}

/// Log file for `command`. Read-only commands only log to a file when a
/// run already created `logs/`.
fn file_sink(command: &Commands, layout: &QuarantineLayout) -> Option<PathBuf> {
    match command {
        Commands::Run { .. } => Some(layout.agent_log_file()),
        _ if layout.logs_dir.is_dir() => Some(layout.agent_log_file()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

fn cmd_run(config: AgentConfig, root: &Path, report_path: Option<&Path>) -> anyhow::Result<()> {
    let mut run = AgentRun::new(config, root);
    let result = run.execute();
    tracing::debug!(
        session = %run.session_id(),
        state = ?run.state(),
        transitions = ?run.transitions(),
        "run finished"
    );
    let report = result?;

    print!("{}", report.render());
    if let Some(path) = report_path {
        report.write_json(path)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn cmd_run_all(
    configs: Vec<AgentConfig>,
    root: &Path,
    dry_run: bool,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    let report = coordinator::run_all(configs, root, dry_run)?;

    for result in &report.results {
        if let Some(agent_report) = &result.report {
            print!("{}", agent_report.render());
            println!();
        }
    }
    print!("{}", report.render());
    println!(
        "Unified report written to {}",
        coordinator::report_path(&QuarantineLayout::new(root)).display()
    );
    if let Some(path) = report_path {
        report.write_json(path)?;
        println!("Report written to {}", path.display());
    }

    if report.failed() > 0 {
        anyhow::bail!("{} of {} agents failed", report.failed(), report.results.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// rollback / history / release-lock
// ---------------------------------------------------------------------------

fn cmd_rollback(layout: &QuarantineLayout, session: &str) -> anyhow::Result<()> {
    let script = AuditLog::new(layout)
        .generate_rollback(session)
        .with_context(|| format!("Failed to generate rollback for {:?}", session))?;
    println!("{}", script.display());
    Ok(())
}

fn cmd_history(layout: &QuarantineLayout) -> anyhow::Result<()> {
    let audit = AuditLog::new(layout);
    let sessions = audit.sessions()?;
    let totals = audit.totals()?;

    println!("+------------------------------------------+");
    println!("| CLEANUP HISTORY                          |");
    println!("+------------------------------------------+");
    println!("| Entries        : {:>22} |", sessions.len());
    println!("| Move sessions  : {:>22} |", reaper::move_session_count(&sessions));
    println!("| Files moved    : {:>22} |", totals.total_files_moved);
    println!("| Size recovered : {:>22} |", format_bytes(totals.total_size_recovered));
    println!("+------------------------------------------+");

    if sessions.is_empty() {
        println!("No sessions recorded.");
        return Ok(());
    }
    for s in &sessions {
        let detail = match &s.action {
            CleanupAction::Scan {
                files_scanned,
                unused_found,
                duplicates_found,
            } => format!(
                "{} scanned, {} unused, {} duplicate names",
                files_scanned, unused_found, duplicates_found
            ),
            CleanupAction::Move {
                files_moved,
                size_recovered,
                ..
            } => format!("{} moved, {}", files_moved, format_bytes(*size_recovered)),
        };
        println!(
            "  {} {} {:<8} {:<5} {}",
            s.timestamp_string(),
            s.session_id,
            s.agent,
            s.action.name(),
            detail
        );
    }
    Ok(())
}

fn cmd_release_lock(layout: &QuarantineLayout, agent: &str) -> anyhow::Result<()> {
    let lock = LockManager::new(layout);
    if lock.release(agent) {
        println!("Lock released for {}", agent);
        return Ok(());
    }
    match lock.current() {
        Some(record) => anyhow::bail!(
            "Lock is held by {} (pid {}), not {}",
            record.agent,
            record.pid,
            agent
        ),
        None => {
            println!("No lock present");
            Ok(())
        }
    }
}
