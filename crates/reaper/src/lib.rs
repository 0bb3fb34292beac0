//! # The Reaper: Quarantine, Lock and Audit Trail
//!
//! Everything that mutates the shared quarantine area lives here:
//! - [`lock::LockManager`]: cross-agent mutual exclusion.
//! - [`quarantine::Quarantine`]: moves unused files aside, never deletes.
//! - [`audit::AuditLog`]: append-only session log and rollback scripts.
//! - [`usage_map::UsageMap`]: latest findings of every agent.
//!
//! Nothing in this crate knows how files were judged unused; callers pass
//! paths and summaries in.

pub mod audit;
pub mod guard;
pub mod lock;
pub mod quarantine;
pub mod usage_map;

pub use audit::{
    move_session_count, AuditError, AuditLog, CleanupAction, CleanupSession, CleanupTotals,
};
pub use lock::{LockError, LockManager, LockRecord, DEFAULT_LOCK_TIMEOUT};
pub use quarantine::{hash_file, Quarantine, QuarantineError};
pub use usage_map::{UsageMap, UsageMapDocument, UsageMapError};

/// Errors from reaper operations.
#[derive(Debug, thiserror::Error)]
pub enum ReaperError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Quarantine(#[from] QuarantineError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    UsageMap(#[from] UsageMapError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_wrapping_keeps_message() {
        let err = ReaperError::from(LockError::Timeout {
            holder: "backend".into(),
        });
        assert_eq!(
            err.to_string(),
            "Lock acquisition timeout. Lock held by backend"
        );

        let err = ReaperError::from(AuditError::NoSessions("abc".into()));
        assert!(err.to_string().contains("abc"));
    }
}
