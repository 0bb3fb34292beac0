//! On-disk layout of the shared quarantine area.
//!
//! ```text
//! {root}/src/.shared_quarantine/.lock               lock record (JSON)
//! {root}/src/.shared_quarantine/.lock.guard         advisory lock target
//! {root}/src/.shared_quarantine/usage-map.json
//! {root}/src/.shared_quarantine/cleanup-log.json    running totals
//! {root}/src/.shared_quarantine/cleanup-log.jsonl   sessions, one per line
//! {root}/src/.shared_quarantine/{agent}/{ts}/...    quarantined files
//! {root}/logs/cleanup-agents.log
//! {root}/logs/rollback-{session}.sh
//! ```

use std::path::{Path, PathBuf};

/// Agent subdirectories created up front so concurrent agents never race on mkdir.
pub const DEFAULT_AGENT_DIRS: &[&str] = &["frontend", "backend", "shared"];

/// Resolved paths of every shared file, anchored at one workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantineLayout {
    pub workspace_root: PathBuf,
    pub quarantine_dir: PathBuf,
    pub lock_file: PathBuf,
    pub lock_guard_file: PathBuf,
    pub usage_map_file: PathBuf,
    pub cleanup_log_file: PathBuf,
    pub session_log_file: PathBuf,
    pub audit_lock_file: PathBuf,
    pub logs_dir: PathBuf,
}

impl QuarantineLayout {
    pub fn new(workspace_root: &Path) -> Self {
        let quarantine_dir = workspace_root.join("src").join(".shared_quarantine");
        let logs_dir = workspace_root.join("logs");
        Self {
            workspace_root: workspace_root.to_path_buf(),
            lock_file: quarantine_dir.join(".lock"),
            lock_guard_file: quarantine_dir.join(".lock.guard"),
            usage_map_file: quarantine_dir.join("usage-map.json"),
            cleanup_log_file: quarantine_dir.join("cleanup-log.json"),
            session_log_file: quarantine_dir.join("cleanup-log.jsonl"),
            audit_lock_file: quarantine_dir.join("cleanup-log.lock"),
            quarantine_dir,
            logs_dir,
        }
    }

    /// Structured log sink shared by all agents.
    pub fn agent_log_file(&self) -> PathBuf {
        self.logs_dir.join("cleanup-agents.log")
    }

    /// Per-agent quarantine root (`.shared_quarantine/{agent}`).
    pub fn agent_dir(&self, agent: &str) -> PathBuf {
        self.quarantine_dir.join(agent)
    }

    /// Rollback script path. Characters outside `[A-Za-z0-9_-]` become `-`.
    ///
    /// # Examples
    /// ```
    /// # use common::QuarantineLayout;
    /// # use std::path::Path;
    /// let layout = QuarantineLayout::new(Path::new("/ws"));
    /// assert_eq!(
    ///     layout.rollback_script("2026-10-19T10:00"),
    ///     Path::new("/ws/logs/rollback-2026-10-19T10-00.sh"),
    /// );
    /// ```
    pub fn rollback_script(&self, session: &str) -> PathBuf {
        let safe: String = session
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        self.logs_dir.join(format!("rollback-{}.sh", safe))
    }

    /// Creates the quarantine root, the default agent subdirectories and the logs dir.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.quarantine_dir)?;
        for agent in DEFAULT_AGENT_DIRS {
            std::fs::create_dir_all(self.agent_dir(agent))?;
        }
        std::fs::create_dir_all(&self.logs_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_paths_are_anchored_at_root() {
        let layout = QuarantineLayout::new(Path::new("/ws"));
        assert_eq!(
            layout.lock_file,
            Path::new("/ws/src/.shared_quarantine/.lock")
        );
        assert_eq!(
            layout.cleanup_log_file,
            Path::new("/ws/src/.shared_quarantine/cleanup-log.json")
        );
        assert_eq!(
            layout.agent_log_file(),
            Path::new("/ws/logs/cleanup-agents.log")
        );
        assert_eq!(
            layout.agent_dir("backend"),
            Path::new("/ws/src/.shared_quarantine/backend")
        );
    }

    #[test]
    fn test_rollback_script_sanitises_id() {
        let layout = QuarantineLayout::new(Path::new("/ws"));
        let path = layout.rollback_script("../etc/passwd");
        assert_eq!(path, Path::new("/ws/logs/rollback----etc-passwd.sh"));
    }

    #[test]
    fn test_ensure_dirs() {
        let tmp = std::env::temp_dir().join("test_layout_ensure_dirs");
        fs::remove_dir_all(&tmp).ok();

        let layout = QuarantineLayout::new(&tmp);
        layout.ensure_dirs().unwrap();
        assert!(layout.agent_dir("frontend").is_dir());
        assert!(layout.agent_dir("backend").is_dir());
        assert!(layout.agent_dir("shared").is_dir());
        assert!(layout.logs_dir.is_dir());

        // Idempotent.
        layout.ensure_dirs().unwrap();

        fs::remove_dir_all(tmp).ok();
    }
}
