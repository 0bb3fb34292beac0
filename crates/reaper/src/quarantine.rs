//! Relocation of unused files into the shared quarantine tree.
//!
//! ## Layout
//! `{quarantine}/{agent}/{ts}/{relative path}` where `{ts}` is the RFC 3339
//! move time with `:` and `.` replaced by `-`. With `preserve_structure` off
//! only the file name is kept.
//!
//! Moves are a plain `rename`, so the quarantine must live on the same
//! filesystem as the sources. Nothing is ever deleted or overwritten.

use chrono::{DateTime, SecondsFormat, Utc};
use common::{QuarantineLayout, QuarantineRecord};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum QuarantineError {
    #[error("Source file not found: {0}")]
    SourceMissing(PathBuf),

    #[error("{0} is outside the workspace root")]
    OutsideWorkspace(PathBuf),

    #[error("Invalid agent name: {0:?}")]
    InvalidAgent(String),

    #[error("Quarantine target already exists: {0}")]
    TargetExists(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Moves files under `{workspace}/src/.shared_quarantine`.
#[derive(Debug, Clone)]
pub struct Quarantine {
    workspace_root: PathBuf,
    quarantine_dir: PathBuf,
}

impl Quarantine {
    pub fn new(layout: &QuarantineLayout) -> Self {
        Self {
            workspace_root: layout.workspace_root.clone(),
            quarantine_dir: layout.quarantine_dir.clone(),
        }
    }

    /// Moves `source` into the quarantine for `agent` and hashes the result.
    ///
    /// A relative `source` is taken relative to the workspace root.
    ///
    /// # Errors
    /// - `SourceMissing`: `source` does not exist
    /// - `OutsideWorkspace`: `preserve_structure` is set and `source` is not
    ///   under the workspace root
    /// - `InvalidAgent`: `agent` is empty or is not a single path component
    /// - `TargetExists`: something already sits at the computed target
    /// - `Io`: rename (e.g. cross-device) or hashing failed
    pub fn move_to_quarantine(
        &self,
        source: &Path,
        agent: &str,
        preserve_structure: bool,
    ) -> Result<QuarantineRecord, QuarantineError> {
        self.move_at(source, agent, preserve_structure, Utc::now())
    }

    fn move_at(
        &self,
        source: &Path,
        agent: &str,
        preserve_structure: bool,
        now: DateTime<Utc>,
    ) -> Result<QuarantineRecord, QuarantineError> {
        validate_agent(agent)?;

        let source = if source.is_absolute() {
            source.to_path_buf()
        } else {
            self.workspace_root.join(source)
        };
        let source = match dunce::canonicalize(&source) {
            Ok(p) => p,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(QuarantineError::SourceMissing(source))
            }
            Err(e) => return Err(e.into()),
        };
        let metadata = fs::metadata(&source)?;
        if !metadata.is_file() {
            return Err(QuarantineError::SourceMissing(source));
        }

        // Targets hang off the canonical root so records never hold a
        // cwd-relative path.
        let root = dunce::canonicalize(&self.workspace_root)?;
        let quarantine_dir = match self.quarantine_dir.strip_prefix(&self.workspace_root) {
            Ok(rel) => root.join(rel),
            Err(_) => std::path::absolute(&self.quarantine_dir)?,
        };
        let target_dir = quarantine_dir.join(agent).join(timestamp_dir_name(now));
        let target = if preserve_structure {
            let relative = source
                .strip_prefix(&root)
                .map_err(|_| QuarantineError::OutsideWorkspace(source.clone()))?;
            target_dir.join(relative)
        } else {
            let name = source
                .file_name()
                .ok_or_else(|| QuarantineError::SourceMissing(source.clone()))?;
            target_dir.join(name)
        };

        if target.exists() {
            return Err(QuarantineError::TargetExists(target));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::rename(&source, &target)?;
        let hash = hash_file(&target)?;

        tracing::info!(
            source = %source.display(),
            target = %target.display(),
            size = metadata.len(),
            "File moved to quarantine"
        );

        Ok(QuarantineRecord {
            source_path: source,
            target_path: target,
            size: metadata.len(),
            hash,
            timestamp: now,
        })
    }
}

/// Lowercase hex SHA-256 of a file's contents.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// `2026-10-19T08:30:00.123Z` → `2026-10-19T08-30-00-123Z`.
pub fn timestamp_dir_name(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

fn validate_agent(agent: &str) -> Result<(), QuarantineError> {
    let bad = agent.is_empty()
        || agent == "."
        || agent == ".."
        || agent.contains(['/', '\\']);
    if bad {
        return Err(QuarantineError::InvalidAgent(agent.to_string()));
    }
    Ok(())
}
