//! One agent run: lock, scan, analyze, filter, quarantine, log, release.

use anatomist::naming::naming_violations;
use anatomist::{
    classify_unused, find_duplicates, find_textual_references, referenced_paths,
    scan_with_extensions, CandidateFilter, ImportResolver, ScriptReferences, UsageGraph,
    UsagePolicy,
};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use common::{QuarantineLayout, QuarantineRecord};
use reaper::{AuditLog, CleanupAction, LockManager, Quarantine, UsageMap};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::report::{AgentReport, FailedMove, ReportDetails, ReportSummary};

/// Where a run currently is. `Failed` can follow any other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    LockPending,
    Scanning,
    Analyzing,
    Moving,
    Logged,
    Released,
    Failed,
}

pub struct AgentRun {
    config: AgentConfig,
    layout: QuarantineLayout,
    session_id: Uuid,
    state: RunState,
    transitions: Vec<RunState>,
}

impl AgentRun {
    /// `root` is canonicalised when it exists; a missing root fails at scan time.
    pub fn new(config: AgentConfig, root: &Path) -> Self {
        let root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            config,
            layout: QuarantineLayout::new(&root),
            session_id: Uuid::new_v4(),
            state: RunState::Idle,
            transitions: vec![RunState::Idle],
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn transitions(&self) -> &[RunState] {
        &self.transitions
    }

    fn enter(&mut self, next: RunState) {
        tracing::debug!(session = %self.session_id, from = ?self.state, to = ?next, "state transition");
        self.state = next;
        self.transitions.push(next);
    }

    /// Runs the whole cycle once. The lock is released on every path out of
    /// the locked phases, successful or not.
    pub fn execute(&mut self) -> Result<AgentReport> {
        if let Err(e) = self.config.validate() {
            self.enter(RunState::Failed);
            return Err(e);
        }
        let agent = self.config.agent.clone();
        tracing::info!(agent = %agent, session = %self.session_id, dry_run = self.config.dry_run, "Starting cleanup");

        if let Err(e) = self.layout.ensure_dirs() {
            self.enter(RunState::Failed);
            return Err(e).context("Failed to create quarantine directories");
        }

        let lock = LockManager::new(&self.layout);
        self.enter(RunState::LockPending);
        match lock.acquire(&agent, self.config.lock_timeout) {
            Ok(true) => {}
            Ok(false) => {
                self.enter(RunState::Failed);
                bail!("Could not acquire the cleanup lock for {:?}", agent);
            }
            Err(e) => {
                self.enter(RunState::Failed);
                return Err(e).context("Failed to acquire the cleanup lock");
            }
        }

        let outcome = self.run_locked();
        let released = lock.release(&agent);

        match outcome {
            Ok(report) => {
                if !released {
                    tracing::warn!(agent = %agent, "Lock was no longer held at release");
                }
                self.enter(RunState::Released);
                tracing::info!(
                    agent = %agent,
                    unused = report.summary.unused_total(),
                    kept = report.summary.candidates_skipped,
                    moved = report.summary.files_moved,
                    "Cleanup finished"
                );
                Ok(report)
            }
            Err(e) => {
                self.enter(RunState::Failed);
                tracing::error!(agent = %agent, error = %e, "Cleanup failed");
                Err(e)
            }
        }
    }

    fn run_locked(&mut self) -> Result<AgentReport> {
        let config = self.config.clone();
        let root = self.layout.workspace_root.clone();

        self.enter(RunState::Scanning);
        let resolver = ImportResolver::from_aliases(config.aliases.clone());
        let scanned = scan_with_extensions(&root, &config.scope, &config.extensions, &resolver)
            .with_context(|| format!("Failed to scan {}", root.display()))?;
        tracing::info!(files = scanned.records.len(), skipped = scanned.skipped.len(), "Scan complete");

        self.enter(RunState::Analyzing);
        let scripts = ScriptReferences::load(&root.join(&config.manifest))
            .with_context(|| format!("Failed to read manifest {}", config.manifest))?;
        let graph = UsageGraph::build(&scanned.records, &resolver);
        let policy = UsagePolicy::default()
            .with_entry_points(config.entry_points.iter().cloned())
            .with_script_references(scripts)
            .with_depth(config.depth)
            .with_mode(config.mode);
        let mut unused = classify_unused(&graph, &policy)?;

        let usage_map = UsageMap::new(&self.layout);
        let search_hits = if config.verify_search && !unused.is_empty() {
            find_textual_references(&root, unused.iter(), &resolver)?
        } else {
            BTreeMap::new()
        };
        let skipped_candidates = CandidateFilter::new(SystemTime::now())
            .with_search_hits(search_hits)
            .with_other_agents(usage_map.read().referenced_by_others(&config.agent))
            .with_grace_period(config.grace_period)
            .with_critical_names(config.check_critical_names)
            .apply(&mut unused);
        let referenced = referenced_paths(&scanned.records, &resolver, |p| root.join(p).is_file());

        let duplicates = find_duplicates(&scanned.records);
        let naming = if config.check_naming {
            naming_violations(scanned.records.iter().map(|r| r.relative_path.as_str()))
        } else {
            Vec::new()
        };
        tracing::info!(
            unused = unused.total(),
            duplicates = duplicates.len(),
            naming = naming.len(),
            kept = skipped_candidates.len(),
            unresolved_imports = graph.stats.unresolved_count(),
            "Analysis complete"
        );

        self.enter(RunState::Moving);
        let mut moved: Vec<QuarantineRecord> = Vec::new();
        let mut failed: Vec<FailedMove> = Vec::new();
        if config.dry_run {
            tracing::info!(candidates = unused.total(), "Dry run, nothing moved");
        } else {
            let quarantine = Quarantine::new(&self.layout);
            for file in unused.iter() {
                match quarantine.move_to_quarantine(&file.path, &config.agent, config.preserve_structure) {
                    Ok(record) => moved.push(record),
                    Err(e) => {
                        tracing::warn!(file = %file.relative_path, error = %e, "Failed to quarantine file");
                        failed.push(FailedMove {
                            relative_path: file.relative_path.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        let audit = AuditLog::new(&self.layout);
        audit
            .log_action(
                self.session_id,
                &config.agent,
                CleanupAction::Scan {
                    files_scanned: scanned.records.len(),
                    unused_found: unused.total(),
                    duplicates_found: duplicates.len(),
                },
            )
            .context("Failed to record scan")?;
        if !moved.is_empty() {
            audit
                .log_action(self.session_id, &config.agent, CleanupAction::moved(moved.clone()))
                .context("Failed to record moved files")?;
        }

        let report = AgentReport {
            agent: config.agent.clone(),
            session_id: self.session_id,
            timestamp: Utc::now(),
            dry_run: config.dry_run,
            summary: ReportSummary {
                total_files: scanned.records.len(),
                total_size: scanned.total_size(),
                skipped_files: scanned.skipped.len(),
                unused_utilities: unused.unused_utilities.len(),
                unused_middleware: unused.unused_middleware.len(),
                unused_api_routes: unused.unused_api_routes.len(),
                orphaned_modules: unused.orphaned_modules.len(),
                unreachable_files: unused.unreachable_files.len(),
                candidates_skipped: skipped_candidates.len(),
                duplicate_functions: duplicates.len(),
                naming_violations: naming.len(),
                files_moved: moved.len(),
                failed_moves: failed.len(),
                size_recovered: moved.iter().map(|r| r.size).sum(),
            },
            details: ReportDetails {
                unused,
                duplicate_functions: duplicates,
                naming_violations: naming,
                moved_files: moved,
                failed_moves: failed,
                skipped_files: scanned
                    .skipped
                    .into_iter()
                    .map(|s| s.relative_path)
                    .collect(),
                skipped_candidates,
            },
        };

        usage_map
            .update(&config.agent, &report.usage_summary(&referenced))
            .context("Failed to update usage map")?;
        self.enter(RunState::Logged);

        Ok(report)
    }
}
