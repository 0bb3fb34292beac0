//! Cross-process lock shared by every cleanup agent.
//!
//! The token is a JSON [`LockRecord`] in `.shared_quarantine/.lock`. Every
//! read-check-write of that record happens while holding an exclusive
//! advisory lock on `.lock.guard`, so two agents can never both observe
//! "no lock" and both write a record.
//!
//! ## Acquisition
//! 1. No record (or an unreadable one): write ours, done.
//! 2. Record older than the staleness threshold: delete it and retry at once.
//!    The holder's liveness is not checked.
//! 3. Record owned by the caller: rewrite it with a fresh timestamp.
//! 4. Record owned by another agent: back off `min(1000 * 2^n, 5000)` ms and
//!    retry, failing with [`LockError::Timeout`] once the timeout has elapsed.
//!    After [`MAX_RETRIES`] waits `acquire` gives up with `Ok(false)`.

use chrono::{DateTime, Utc};
use common::QuarantineLayout;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::guard::{write_atomic, FileGuard};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_millis(300_000);
pub const MAX_RETRIES: u32 = 10;

const BASE_BACKOFF_MS: u64 = 1_000;
const MAX_BACKOFF_MS: u64 = 5_000;

/// Contents of the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub agent: String,
    pub timestamp: DateTime<Utc>,
    pub pid: u32,
}

impl LockRecord {
    fn now(agent: &str) -> Self {
        Self {
            agent: agent.to_string(),
            timestamp: Utc::now(),
            pid: std::process::id(),
        }
    }

    /// Age relative to now; records stamped in the future are age zero.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Lock acquisition timeout. Lock held by {holder}")]
    Timeout { holder: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// File-based mutual exclusion between agents sharing one quarantine.
#[derive(Debug, Clone)]
pub struct LockManager {
    lock_file: PathBuf,
    guard_file: PathBuf,
    stale_after: Duration,
}

impl LockManager {
    pub fn new(layout: &QuarantineLayout) -> Self {
        Self {
            lock_file: layout.lock_file.clone(),
            guard_file: layout.lock_guard_file.clone(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn lock_file(&self) -> &Path {
        &self.lock_file
    }

    /// Acquires the lock for `agent`.
    ///
    /// Returns `Ok(true)` once the record is written, `Ok(false)` if every
    /// retry was spent waiting without the timeout elapsing.
    ///
    /// # Errors
    /// - `Timeout`: another agent held a fresh lock for longer than `timeout`
    /// - `Io` / `Serde`: the guard or the record could not be written
    pub fn acquire(&self, agent: &str, timeout: Duration) -> Result<bool, LockError> {
        let start = Instant::now();
        let mut retries: u32 = 0;

        while retries < MAX_RETRIES {
            let holder = {
                let _guard = FileGuard::acquire(&self.guard_file)?;
                match self.read_record() {
                    Some(record) if record.age() > self.stale_after => {
                        tracing::warn!(
                            holder = %record.agent,
                            pid = record.pid,
                            age_ms = record.age().as_millis() as u64,
                            "Removing expired lock"
                        );
                        remove_if_present(&self.lock_file)?;
                        continue;
                    }
                    Some(record) if record.agent != agent => record.agent,
                    _ => {
                        self.write_record(agent)?;
                        tracing::info!(agent, "Lock acquired");
                        return Ok(true);
                    }
                }
            };

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(LockError::Timeout { holder });
            }

            let backoff = Duration::from_millis(backoff_ms(retries)).min(timeout - elapsed);
            tracing::info!(
                agent,
                holder = %holder,
                retry_in_ms = backoff.as_millis() as u64,
                "Waiting for lock"
            );
            std::thread::sleep(backoff);
            retries += 1;
        }

        tracing::warn!(agent, retries, "Gave up waiting for lock");
        Ok(false)
    }

    /// Deletes the record if `agent` owns it.
    ///
    /// Returns `false` without touching anything when the record is missing
    /// or owned by someone else. Never fails; problems are logged.
    pub fn release(&self, agent: &str) -> bool {
        let _guard = match FileGuard::acquire(&self.guard_file) {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!(agent, error = %e, "Could not take lock guard for release");
                return false;
            }
        };

        match self.read_record() {
            Some(record) if record.agent == agent => match std::fs::remove_file(&self.lock_file) {
                Ok(()) => {
                    tracing::info!(agent, "Lock released");
                    true
                }
                Err(e) => {
                    tracing::warn!(agent, error = %e, "Failed to remove lock file");
                    false
                }
            },
            Some(record) => {
                tracing::warn!(agent, holder = %record.agent, "Lock owned by another agent, not released");
                false
            }
            None => false,
        }
    }

    /// Current record, if a readable one exists.
    pub fn current(&self) -> Option<LockRecord> {
        self.read_record()
    }

    /// Reads the record. Any failure other than "not found" is logged and
    /// treated as no lock.
    fn read_record(&self) -> Option<LockRecord> {
        let raw = match std::fs::read_to_string(&self.lock_file) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.lock_file.display(), error = %e, "Unreadable lock file, treating as absent");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(path = %self.lock_file.display(), error = %e, "Corrupt lock file, treating as absent");
                None
            }
        }
    }

    fn write_record(&self, agent: &str) -> Result<(), LockError> {
        let json = serde_json::to_string_pretty(&LockRecord::now(agent))?;
        write_atomic(&self.lock_file, &json)?;
        Ok(())
    }
}

fn backoff_ms(retries: u32) -> u64 {
    BASE_BACKOFF_MS
        .saturating_mul(1u64 << retries.min(16))
        .min(MAX_BACKOFF_MS)
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
