//! Run report: console table and JSON document.

use anatomist::naming::NamingViolation;
use anatomist::{DuplicateGroup, SkippedCandidate, UnusedFiles};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::QuarantineRecord;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;
use uuid::Uuid;

const UNITS: &[&str] = &["Bytes", "KB", "MB", "GB"];

/// Human-readable size with at most two decimals (`1536` → `1.5 KB`).
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let fixed = format!("{:.2}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// A file the mover could not relocate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedMove {
    pub relative_path: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_files: usize,
    pub total_size: u64,
    pub skipped_files: usize,
    pub unused_utilities: usize,
    pub unused_middleware: usize,
    pub unused_api_routes: usize,
    pub orphaned_modules: usize,
    pub unreachable_files: usize,
    /// Unused files kept in place by the candidate filter.
    pub candidates_skipped: usize,
    pub duplicate_functions: usize,
    pub naming_violations: usize,
    pub files_moved: usize,
    pub failed_moves: usize,
    pub size_recovered: u64,
}

impl ReportSummary {
    /// Unused files across all buckets, after filtering.
    pub fn unused_total(&self) -> usize {
        self.unused_utilities
            + self.unused_middleware
            + self.unused_api_routes
            + self.orphaned_modules
            + self.unreachable_files
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetails {
    pub unused: UnusedFiles,
    pub duplicate_functions: Vec<DuplicateGroup>,
    pub naming_violations: Vec<NamingViolation>,
    pub moved_files: Vec<QuarantineRecord>,
    pub failed_moves: Vec<FailedMove>,
    pub skipped_files: Vec<String>,
    pub skipped_candidates: Vec<SkippedCandidate>,
}

/// Outcome of one agent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReport {
    pub agent: String,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub dry_run: bool,
    pub summary: ReportSummary,
    pub details: ReportDetails,
}

impl AgentReport {
    /// Compact summary stored in the shared usage map.
    ///
    /// `referenced` lists the files this agent's sources import; other agents
    /// leave those in place.
    pub fn usage_summary(&self, referenced: &BTreeSet<String>) -> serde_json::Value {
        serde_json::json!({
            "sessionId": self.session_id,
            "timestamp": self.timestamp,
            "dryRun": self.dry_run,
            "summary": self.summary,
            "unusedFiles": self
                .details
                .unused
                .iter()
                .map(|f| f.relative_path.as_str())
                .collect::<Vec<_>>(),
            "duplicateFunctions": self.details.duplicate_functions,
            "referencedFiles": referenced,
        })
    }

    /// Boxed console table followed by per-file listings.
    pub fn render(&self) -> String {
        let s = &self.summary;
        let mode = if self.dry_run { "dry run" } else { "execute" };
        let mut out = String::new();

        let _ = writeln!(out, "+------------------------------------------+");
        let _ = writeln!(out, "| CLEANUP AGENT: {:<25} |", truncate(&self.agent, 25));
        let _ = writeln!(out, "+------------------------------------------+");
        let _ = writeln!(out, "| Mode               : {:>19} |", mode);
        let _ = writeln!(out, "| Files scanned      : {:>19} |", s.total_files);
        let _ = writeln!(out, "| Total size         : {:>19} |", format_bytes(s.total_size));
        let _ = writeln!(out, "| Skipped (errors)   : {:>19} |", s.skipped_files);
        let _ = writeln!(out, "| Unused utilities   : {:>19} |", s.unused_utilities);
        let _ = writeln!(out, "| Unused middleware  : {:>19} |", s.unused_middleware);
        let _ = writeln!(out, "| Unused API routes  : {:>19} |", s.unused_api_routes);
        let _ = writeln!(out, "| Orphaned modules   : {:>19} |", s.orphaned_modules);
        let _ = writeln!(out, "| Unreachable files  : {:>19} |", s.unreachable_files);
        let _ = writeln!(out, "| Kept by safety     : {:>19} |", s.candidates_skipped);
        let _ = writeln!(out, "| Duplicate functions: {:>19} |", s.duplicate_functions);
        let _ = writeln!(out, "| Naming violations  : {:>19} |", s.naming_violations);
        let _ = writeln!(out, "| Files moved        : {:>19} |", s.files_moved);
        let _ = writeln!(out, "| Failed moves       : {:>19} |", s.failed_moves);
        let _ = writeln!(out, "| Size recovered     : {:>19} |", format_bytes(s.size_recovered));
        let _ = writeln!(out, "+------------------------------------------+");
        let _ = writeln!(out, "Session: {}", self.session_id);

        if self.details.unused.is_empty() {
            let _ = writeln!(out, "\nNo unused files detected.");
        } else {
            let _ = writeln!(out, "\nUNUSED FILES:");
            for file in self.details.unused.iter() {
                let _ = writeln!(
                    out,
                    "  {} ({})",
                    file.relative_path,
                    format_bytes(file.size)
                );
            }
        }

        if !self.details.skipped_candidates.is_empty() {
            let _ = writeln!(out, "\nKEPT IN PLACE:");
            for skipped in &self.details.skipped_candidates {
                let _ = writeln!(out, "  {} - {}", skipped.relative_path, skipped.reason);
            }
        }

        if !self.details.duplicate_functions.is_empty() {
            let _ = writeln!(out, "\nDUPLICATE FUNCTIONS:");
            for group in &self.details.duplicate_functions {
                let _ = writeln!(out, "  {} x{}: {}", group.name, group.count, group.files.join(", "));
            }
        }

        if !self.details.failed_moves.is_empty() {
            let _ = writeln!(out, "\nFAILED MOVES:");
            for failed in &self.details.failed_moves {
                let _ = writeln!(out, "  {} - {}", failed.relative_path, failed.error);
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

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
