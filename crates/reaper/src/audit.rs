//! # Audit Log
//!
//! Every agent run appends its actions to `cleanup-log.jsonl`, one
//! [`CleanupSession`] per line. Running totals live next to it in
//! `cleanup-log.json` and are rewritten atomically. Both writes happen while
//! holding an exclusive advisory lock on `cleanup-log.lock`.
//!
//! A rollback script can be generated for any recorded run, selected either by
//! its session id or by a prefix of its timestamp.

use chrono::{DateTime, SecondsFormat, Utc};
use common::{QuarantineLayout, QuarantineRecord};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::guard::{write_atomic, FileGuard};

/// What a session entry records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "details", rename_all = "lowercase")]
pub enum CleanupAction {
    #[serde(rename_all = "camelCase")]
    Scan {
        files_scanned: usize,
        unused_found: usize,
        duplicates_found: usize,
    },
    #[serde(rename_all = "camelCase")]
    Move {
        files_moved: usize,
        size_recovered: u64,
        moved_files: Vec<QuarantineRecord>,
    },
}

impl CleanupAction {
    pub fn name(&self) -> &'static str {
        match self {
            CleanupAction::Scan { .. } => "scan",
            CleanupAction::Move { .. } => "move",
        }
    }

    /// Builds a `Move` entry, deriving the counts from `moved_files`.
    pub fn moved(moved_files: Vec<QuarantineRecord>) -> Self {
        CleanupAction::Move {
            files_moved: moved_files.len(),
            size_recovered: moved_files.iter().map(|r| r.size).sum(),
            moved_files,
        }
    }
}

/// One line of `cleanup-log.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSession {
    pub session_id: Uuid,
    pub agent: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub action: CleanupAction,
}

impl CleanupSession {
    /// Timestamp exactly as it is written to the log.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

/// Contents of `cleanup-log.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CleanupTotals {
    pub total_files_moved: u64,
    pub total_size_recovered: u64,
    /// Stamped by every entry, scan or move.
    pub last_cleanup: Option<DateTime<Utc>>,
    /// Entries logged, scan and move alike.
    pub session_count: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("No move sessions match {0:?}")]
    NoSessions(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Session log, totals file and rollback generator for one workspace.
#[derive(Debug, Clone)]
pub struct AuditLog {
    session_log: PathBuf,
    totals_file: PathBuf,
    lock_file: PathBuf,
    layout: QuarantineLayout,
}

impl AuditLog {
    pub fn new(layout: &QuarantineLayout) -> Self {
        Self {
            session_log: layout.session_log_file.clone(),
            totals_file: layout.cleanup_log_file.clone(),
            lock_file: layout.audit_lock_file.clone(),
            layout: layout.clone(),
        }
    }

    /// Appends one entry and updates the totals.
    pub fn log_action(
        &self,
        session_id: Uuid,
        agent: &str,
        action: CleanupAction,
    ) -> Result<CleanupSession, AuditError> {
        let session = CleanupSession {
            session_id,
            agent: agent.to_string(),
            timestamp: Utc::now(),
            action,
        };

        let _guard = FileGuard::acquire(&self.lock_file)?;

        let mut line = serde_json::to_string(&session)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.session_log)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;

        let mut totals = self.read_totals()?;
        totals.session_count += 1;
        totals.last_cleanup = Some(session.timestamp);
        if let CleanupAction::Move {
            files_moved,
            size_recovered,
            ..
        } = &session.action
        {
            totals.total_files_moved += *files_moved as u64;
            totals.total_size_recovered += size_recovered;
        }
        write_atomic(&self.totals_file, &serde_json::to_string_pretty(&totals)?)?;

        tracing::info!(
            session = %session_id,
            agent,
            action = session.action.name(),
            "Cleanup action logged"
        );
        Ok(session)
    }

    /// Every recorded entry, oldest first. Malformed lines are skipped.
    pub fn sessions(&self) -> Result<Vec<CleanupSession>, AuditError> {
        let raw = match fs::read_to_string(&self.session_log) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sessions = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    tracing::warn!(line = idx + 1, error = %e, "Skipping malformed audit entry")
                }
            }
        }
        Ok(sessions)
    }

    pub fn totals(&self) -> Result<CleanupTotals, AuditError> {
        self.read_totals()
    }

    /// Writes a shell script undoing every move recorded for `selector`.
    ///
    /// A selector that parses as a UUID matches that session id exactly; any
    /// other string matches entries whose timestamp starts with it. Entries are
    /// undone newest first, and files within an entry in reverse move order.
    ///
    /// # Errors
    /// `NoSessions` if no move entry matches.
    pub fn generate_rollback(&self, selector: &str) -> Result<PathBuf, AuditError> {
        let selected = select_sessions(self.sessions()?, selector);
        let moves: Vec<&QuarantineRecord> = selected
            .iter()
            .rev()
            .filter_map(|s| match &s.action {
                CleanupAction::Move { moved_files, .. } => Some(moved_files),
                CleanupAction::Scan { .. } => None,
            })
            .flat_map(|files| files.iter().rev())
            .collect();

        if moves.is_empty() {
            return Err(AuditError::NoSessions(selector.to_string()));
        }

        let script = render_rollback(selector, &moves);
        fs::create_dir_all(&self.layout.logs_dir)?;
        let path = self.layout.rollback_script(selector);
        fs::write(&path, script)?;
        make_executable(&path)?;

        tracing::info!(path = %path.display(), files = moves.len(), "Rollback script generated");
        Ok(path)
    }

    fn read_totals(&self) -> Result<CleanupTotals, AuditError> {
        match fs::read_to_string(&self.totals_file) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(CleanupTotals::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Number of distinct sessions that moved at least one file.
pub fn move_session_count(sessions: &[CleanupSession]) -> usize {
    sessions
        .iter()
        .filter(|s| matches!(s.action, CleanupAction::Move { .. }))
        .map(|s| s.session_id)
        .collect::<std::collections::HashSet<_>>()
        .len()
}

fn select_sessions(sessions: Vec<CleanupSession>, selector: &str) -> Vec<CleanupSession> {
    match Uuid::parse_str(selector) {
        Ok(id) => sessions.into_iter().filter(|s| s.session_id == id).collect(),
        Err(_) => sessions
            .into_iter()
            .filter(|s| s.timestamp_string().starts_with(selector))
            .collect(),
    }
}

fn render_rollback(selector: &str, moves: &[&QuarantineRecord]) -> String {
    let mut lines = vec![
        "#!/bin/bash".to_string(),
        "# Rollback script generated by cleanup-agent".to_string(),
        format!("# Session: {}", selector),
        format!(
            "# Generated: {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        String::new(),
    ];

    for record in moves {
        let source = record.source_path.to_string_lossy();
        let target = record.target_path.to_string_lossy();
        let parent = record
            .source_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());
        lines.push(format!("# Restoring {}", source));
        lines.push(format!("mkdir -p {}", shell_words::quote(&parent)));
        lines.push(format!(
            "mv {} {}",
            shell_words::quote(&target),
            shell_words::quote(&source)
        ));
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
