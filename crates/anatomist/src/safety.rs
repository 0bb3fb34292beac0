//! Candidate filter applied between classification and quarantine.
//!
//! Checks run in a fixed order and the first failing one names the skip
//! reason: textual reference, claim by another agent, recent modification,
//! critical-sounding file name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use common::FileRecord;
use regex::Regex;
use serde::Serialize;

use crate::graph::UnusedFiles;

/// Files modified more recently than this are left alone.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(7 * 24 * 60 * 60);

static CRITICAL_NAME: OnceLock<Regex> = OnceLock::new();

fn critical_name() -> &'static Regex {
    CRITICAL_NAME.get_or_init(|| {
        Regex::new(r"(?i)middleware|provider|context|config|setup|init").expect("Invalid critical name regex")
    })
}

/// Why an unused candidate was kept in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SkipReason {
    /// Another project file mentions the candidate's path.
    FoundBySearch { file: String },
    /// Listed in another agent's `referencedFiles`.
    ReferencedByAgent { agent: String },
    RecentlyModified,
    StatFailed { error: String },
    CriticalName,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FoundBySearch { file } => write!(f, "Found usage in project-wide search ({})", file),
            Self::ReferencedByAgent { agent } => write!(f, "Referenced by other agent ({})", agent),
            Self::RecentlyModified => write!(f, "File modified recently (within grace period)"),
            Self::StatFailed { error } => write!(f, "Cannot access file stats: {}", error),
            Self::CriticalName => write!(f, "File name suggests critical functionality"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedCandidate {
    pub relative_path: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct CandidateFilter {
    search_hits: BTreeMap<String, String>,
    other_agents: BTreeMap<String, String>,
    grace_period: Duration,
    check_critical_names: bool,
    now: SystemTime,
}

impl CandidateFilter {
    /// Filter with the default grace period and name check, measured from `now`.
    pub fn new(now: SystemTime) -> Self {
        Self {
            search_hits: BTreeMap::new(),
            other_agents: BTreeMap::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
            check_critical_names: true,
            now,
        }
    }

    /// `candidate → referencing file`, as returned by
    /// [`find_textual_references`](crate::verify::find_textual_references).
    pub fn with_search_hits(mut self, hits: BTreeMap<String, String>) -> Self {
        self.search_hits = hits;
        self
    }

    /// `relative path → agent` for files other agents depend on.
    pub fn with_other_agents(mut self, claims: BTreeMap<String, String>) -> Self {
        self.other_agents = claims;
        self
    }

    /// A zero period disables the modification check.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_critical_names(mut self, enabled: bool) -> Self {
        self.check_critical_names = enabled;
        self
    }

    /// First check `record` fails, if any.
    pub fn check(&self, record: &FileRecord) -> Option<SkipReason> {
        if let Some(file) = self.search_hits.get(&record.relative_path) {
            return Some(SkipReason::FoundBySearch { file: file.clone() });
        }
        if let Some(agent) = self.other_agents.get(&record.relative_path) {
            return Some(SkipReason::ReferencedByAgent {
                agent: agent.clone(),
            });
        }
        if !self.grace_period.is_zero() {
            match std::fs::metadata(&record.path).and_then(|m| m.modified()) {
                Ok(modified) => {
                    // A future mtime counts as age zero.
                    let age = self.now.duration_since(modified).unwrap_or_default();
                    if age < self.grace_period {
                        return Some(SkipReason::RecentlyModified);
                    }
                }
                Err(e) => {
                    return Some(SkipReason::StatFailed {
                        error: e.to_string(),
                    })
                }
            }
        }
        if self.check_critical_names && critical_name().is_match(&record.file_name) {
            return Some(SkipReason::CriticalName);
        }
        None
    }

    /// Removes every failing candidate from `unused` and returns the skips,
    /// in bucket order.
    pub fn apply(&self, unused: &mut UnusedFiles) -> Vec<SkippedCandidate> {
        let mut skipped = Vec::new();
        unused.retain(|record| match self.check(record) {
            Some(reason) => {
                tracing::info!(file = %record.relative_path, %reason, "candidate skipped");
                skipped.push(SkippedCandidate {
                    relative_path: record.relative_path.clone(),
                    reason,
                });
                false
            }
            None => true,
        });
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::path::{Path, PathBuf};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn write_aged(root: &Path, rel: &str, age: Duration) -> FileRecord {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "export const x = 1;\n").unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - age)
            .unwrap();
        FileRecord::new(path, rel, 20, vec![], vec![])
    }

    fn unused_of(records: Vec<FileRecord>) -> UnusedFiles {
        UnusedFiles {
            unused_utilities: records,
            ..Default::default()
        }
    }

    #[test]
    fn test_grace_period() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = write_aged(dir.path(), "src/lib/fresh.ts", DAY);
        let old = write_aged(dir.path(), "src/lib/old.ts", 30 * DAY);
        let filter = CandidateFilter::new(SystemTime::now());

        assert_eq!(filter.check(&fresh), Some(SkipReason::RecentlyModified));
        assert_eq!(filter.check(&old), None);
        assert_eq!(filter.clone().with_grace_period(Duration::ZERO).check(&fresh), None);
    }

    #[test]
    fn test_missing_file_is_kept() {
        let gone = FileRecord::new(PathBuf::from("/definitely/not/here/x.ts"), "src/lib/x.ts", 1, vec![], vec![]);
        let reason = CandidateFilter::new(SystemTime::now()).check(&gone);
        assert!(matches!(reason, Some(SkipReason::StatFailed { .. })), "{reason:?}");
    }

    #[test]
    fn test_critical_names_are_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let filter = CandidateFilter::new(SystemTime::now());
        for rel in [
            "src/lib/AuthProvider.tsx",
            "src/lib/theme-context.ts",
            "src/lib/tailwind.config.ts",
            "src/lib/setupTests.ts",
            "src/lib/initDb.ts",
            "src/middleware/MIDDLEWARE.ts",
        ] {
            let record = write_aged(dir.path(), rel, 30 * DAY);
            assert_eq!(filter.check(&record), Some(SkipReason::CriticalName), "{rel}");
        }
        let plain = write_aged(dir.path(), "src/lib/format-date.ts", 30 * DAY);
        assert_eq!(filter.check(&plain), None);
        let critical_dir = write_aged(dir.path(), "src/config/dates.ts", 30 * DAY);
        assert_eq!(filter.check(&critical_dir), None, "only the base name is checked");
        assert_eq!(
            filter.with_critical_names(false).check(&write_aged(dir.path(), "src/lib/initDb.ts", 30 * DAY)),
            None
        );
    }

    #[test]
    fn test_check_order_and_apply() {
        let dir = tempfile::tempdir().unwrap();
        let searched = write_aged(dir.path(), "src/lib/config-loader.ts", DAY);
        let claimed = write_aged(dir.path(), "src/lib/claimed.ts", DAY);
        let fresh = write_aged(dir.path(), "src/lib/fresh.ts", DAY);
        let dead = write_aged(dir.path(), "src/lib/dead.ts", 30 * DAY);

        let filter = CandidateFilter::new(SystemTime::now())
            .with_search_hits(BTreeMap::from([(
                "src/lib/config-loader.ts".to_string(),
                "src/app/page.tsx".to_string(),
            )]))
            .with_other_agents(BTreeMap::from([(
                "src/lib/claimed.ts".to_string(),
                "frontend".to_string(),
            )]));

        let mut unused = unused_of(vec![searched, claimed, fresh, dead]);
        let skipped = filter.apply(&mut unused);

        let reasons: Vec<(&str, String)> = skipped
            .iter()
            .map(|s| (s.relative_path.as_str(), s.reason.to_string()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("src/lib/config-loader.ts", "Found usage in project-wide search (src/app/page.tsx)".to_string()),
                ("src/lib/claimed.ts", "Referenced by other agent (frontend)".to_string()),
                ("src/lib/fresh.ts", "File modified recently (within grace period)".to_string()),
            ]
        );
        assert_eq!(
            unused.iter().map(|f| f.relative_path.as_str()).collect::<Vec<_>>(),
            vec!["src/lib/dead.ts"]
        );

        let json = serde_json::to_value(&skipped[1]).unwrap();
        assert_eq!(json["relativePath"], "src/lib/claimed.ts");
        assert_eq!(json["reason"]["kind"], "referencedByAgent");
        assert_eq!(json["reason"]["agent"], "frontend");
    }
}
