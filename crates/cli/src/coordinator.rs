//! `run --agent all`: every agent in turn, one unified report.
//!
//! Agents run strictly one after another, each taking and releasing the
//! shared lock itself. A failing agent is recorded and the rest still run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::QuarantineLayout;
use reaper::UsageMap;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::agent::AgentRun;
use crate::config::AgentConfig;
use crate::report::{format_bytes, AgentReport};

/// Usage map key and report name of the coordinator.
pub const COORDINATOR_NAME: &str = "coordinator";

const REPORT_FILE: &str = "multi-agent-cleanup.json";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutcome {
    pub agent: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub time_taken_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AgentReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorTotals {
    pub files_scanned: usize,
    pub files_moved: usize,
    pub files_skipped: usize,
    pub size_recovered: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorReport {
    pub coordinator: String,
    pub timestamp: DateTime<Utc>,
    pub dry_run: bool,
    pub agents: Vec<String>,
    pub totals: CoordinatorTotals,
    pub results: Vec<AgentOutcome>,
}

impl CoordinatorReport {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn render(&self) -> String {
        let t = &self.totals;
        let mode = if self.dry_run { "dry run" } else { "execute" };
        let mut out = String::new();

        let _ = writeln!(out, "+------------------------------------------+");
        let _ = writeln!(out, "| CLEANUP COORDINATOR                      |");
        let _ = writeln!(out, "+------------------------------------------+");
        let _ = writeln!(out, "| Mode               : {:>19} |", mode);
        let _ = writeln!(out, "| Agents run         : {:>19} |", self.results.len());
        let _ = writeln!(out, "| Agents failed      : {:>19} |", self.failed());
        let _ = writeln!(out, "| Files scanned      : {:>19} |", t.files_scanned);
        let _ = writeln!(out, "| Files moved        : {:>19} |", t.files_moved);
        let _ = writeln!(out, "| Kept by safety     : {:>19} |", t.files_skipped);
        let _ = writeln!(out, "| Size recovered     : {:>19} |", format_bytes(t.size_recovered));
        let _ = writeln!(out, "+------------------------------------------+");

        for result in &self.results {
            match (&result.report, &result.error) {
                (Some(report), _) => {
                    let _ = writeln!(
                        out,
                        "  ok    {:<10} {} scanned, {} unused, {} moved ({} ms)",
                        result.agent,
                        report.summary.total_files,
                        report.summary.unused_total(),
                        report.summary.files_moved,
                        result.time_taken_ms
                    );
                }
                (None, error) => {
                    let _ = writeln!(
                        out,
                        "  FAIL  {:<10} {}",
                        result.agent,
                        error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        }
        out
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        Ok(())
    }
}

/// Where the unified report is always written.
pub fn report_path(layout: &QuarantineLayout) -> PathBuf {
    layout.logs_dir.join(REPORT_FILE)
}

/// Runs `configs` in order and records the combined outcome.
///
/// Individual agent failures end up in the report, not in the `Err` arm.
/// `Err` means the unified report or the usage map could not be written.
pub fn run_all(configs: Vec<AgentConfig>, root: &Path, dry_run: bool) -> Result<CoordinatorReport> {
    let root = dunce::canonicalize(root)
        .with_context(|| format!("Workspace root {} does not exist", root.display()))?;
    let root = root.as_path();
    let layout = QuarantineLayout::new(root);
    let agents: Vec<String> = configs.iter().map(|c| c.agent.clone()).collect();
    tracing::info!(agents = ?agents, dry_run, "Starting coordinated cleanup");

    let mut totals = CoordinatorTotals::default();
    let mut results = Vec::with_capacity(configs.len());
    let mut moved_files: Vec<String> = Vec::new();

    for config in configs {
        let agent = config.agent.clone();
        let started = Instant::now();
        let outcome = AgentRun::new(config, root).execute();
        let time_taken_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(report) => {
                totals.files_scanned += report.summary.total_files;
                totals.files_moved += report.summary.files_moved;
                totals.files_skipped += report.summary.candidates_skipped;
                totals.size_recovered += report.summary.size_recovered;
                moved_files.extend(report.details.moved_files.iter().map(|r| {
                    r.source_path
                        .strip_prefix(&layout.workspace_root)
                        .unwrap_or(&r.source_path)
                        .to_string_lossy()
                        .replace('\\', "/")
                }));
                results.push(AgentOutcome {
                    agent,
                    success: true,
                    error: None,
                    time_taken_ms,
                    report: Some(report),
                });
            }
            Err(e) => {
                tracing::error!(agent = %agent, error = %format!("{:#}", e), "Agent failed, continuing");
                results.push(AgentOutcome {
                    agent,
                    success: false,
                    error: Some(format!("{:#}", e)),
                    time_taken_ms,
                    report: None,
                });
            }
        }
    }

    let report = CoordinatorReport {
        coordinator: COORDINATOR_NAME.to_string(),
        timestamp: Utc::now(),
        dry_run,
        agents,
        totals,
        results,
    };

    report.write_json(&report_path(&layout))?;
    layout
        .ensure_dirs()
        .context("Failed to create quarantine directories")?;
    let status = if report.failed() == 0 {
        "completed"
    } else {
        "completed_with_errors"
    };
    UsageMap::new(&layout)
        .update(
            COORDINATOR_NAME,
            &serde_json::json!({
                "timestamp": report.timestamp,
                "dryRun": dry_run,
                "status": status,
                "totals": report.totals,
                "movedFiles": moved_files,
            }),
        )
        .context("Failed to update usage map")?;

    tracing::info!(
        failed = report.failed(),
        moved = report.totals.files_moved,
        "Coordinated cleanup finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn workspace(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(name);
        fs::remove_dir_all(&root).ok();
        fs::create_dir_all(root.join("src/lib")).unwrap();
        fs::create_dir_all(root.join("src/app")).unwrap();
        fs::write(root.join("src/lib/helper.ts"), "export function helper() {}\n").unwrap();
        fs::write(
            root.join("src/app/page.ts"),
            "export const page = 1;\n",
        )
        .unwrap();
        root
    }

    fn backend(dry_run: bool) -> AgentConfig {
        let mut config = AgentConfig::profile("backend");
        config.scope = vec!["src/lib".into()];
        config.dry_run = dry_run;
        config.grace_period = Duration::ZERO;
        config
    }

    #[test]
    fn test_failed_agent_does_not_stop_the_rest() {
        let root = workspace("test_coordinator_continues");
        let configs = vec![AgentConfig::profile("docs"), backend(false)];

        let report = run_all(configs, &root, false).unwrap();
        assert_eq!(report.agents, vec!["docs", "backend"]);
        assert_eq!(report.failed(), 1);
        assert!(!report.results[0].success);
        assert!(report.results[0].error.as_deref().unwrap().contains("no scope"));
        assert!(report.results[1].success);
        assert_eq!(report.totals.files_scanned, 1);
        assert_eq!(report.totals.files_moved, 1);
        assert!(!root.join("src/lib/helper.ts").exists());

        let layout = QuarantineLayout::new(&root);
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(report_path(&layout)).unwrap()).unwrap();
        assert_eq!(written["coordinator"], "coordinator");
        assert_eq!(written["results"][0]["success"], false);
        assert_eq!(written["totals"]["filesMoved"], 1);

        let map = UsageMap::new(&layout).read();
        let entry = map.agent(COORDINATOR_NAME).unwrap();
        assert_eq!(entry["status"], "completed_with_errors");
        assert_eq!(entry["movedFiles"], serde_json::json!(["src/lib/helper.ts"]));

        let text = report.render();
        assert!(text.contains("| Agents failed      :                   1 |"));
        assert!(text.contains("FAIL  docs"));

        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_dry_run_reports_without_moving() {
        let root = workspace("test_coordinator_dry_run");
        let report = run_all(vec![backend(true)], &root, true).unwrap();

        assert_eq!(report.failed(), 0);
        assert!(report.dry_run);
        assert_eq!(report.totals.files_moved, 0);
        assert!(root.join("src/lib/helper.ts").exists());

        let map = UsageMap::new(&QuarantineLayout::new(&root)).read();
        assert_eq!(map.agent(COORDINATOR_NAME).unwrap()["status"], "completed");

        fs::remove_dir_all(root).ok();
    }
}
