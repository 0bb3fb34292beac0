//! Shared `usage-map.json`: the latest findings summary of every agent.

use chrono::{DateTime, Utc};
use common::QuarantineLayout;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::guard::{write_atomic, FileGuard};

/// Agent slots present in a freshly created map.
const BUILTIN_AGENTS: &[&str] = &["frontend", "backend", "shared"];

/// Top-level keys that belong to the map itself, never to an agent.
pub const RESERVED_KEYS: &[&str] = &["crossReferences", "lastUpdated"];

/// Contents of `usage-map.json`.
///
/// Agent entries are stored under the agent's name at the top level, next to
/// `crossReferences` and `lastUpdated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMapDocument {
    #[serde(flatten)]
    pub agents: BTreeMap<String, Value>,
    #[serde(default = "empty_object")]
    pub cross_references: Value,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for UsageMapDocument {
    fn default() -> Self {
        Self {
            agents: BUILTIN_AGENTS
                .iter()
                .map(|a| (a.to_string(), empty_object()))
                .collect(),
            cross_references: empty_object(),
            last_updated: None,
        }
    }
}

impl UsageMapDocument {
    pub fn agent(&self, agent: &str) -> Option<&Value> {
        self.agents.get(agent)
    }

    /// Files listed under `referencedFiles` by any agent other than `agent`,
    /// each mapped to the first such agent in name order.
    pub fn referenced_by_others(&self, agent: &str) -> BTreeMap<String, String> {
        let mut found = BTreeMap::new();
        for (owner, entry) in self.agents.iter().filter(|(name, _)| name.as_str() != agent) {
            let Some(files) = entry.get("referencedFiles").and_then(Value::as_array) else {
                continue;
            };
            for file in files.iter().filter_map(Value::as_str) {
                found
                    .entry(file.to_string())
                    .or_insert_with(|| owner.clone());
            }
        }
        found
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[derive(Debug, thiserror::Error)]
pub enum UsageMapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0:?} is a reserved usage map key")]
    ReservedName(String),
}

#[derive(Debug, Clone)]
pub struct UsageMap {
    path: PathBuf,
    lock_file: PathBuf,
}

impl UsageMap {
    pub fn new(layout: &QuarantineLayout) -> Self {
        Self {
            path: layout.usage_map_file.clone(),
            lock_file: layout.usage_map_file.with_extension("lock"),
        }
    }

    /// Current map. A missing or unreadable file yields a fresh default.
    pub fn read(&self) -> UsageMapDocument {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to read usage map");
                }
                return UsageMapDocument::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Corrupt usage map, starting fresh");
            UsageMapDocument::default()
        })
    }

    /// Replaces `agent`'s entry with `summary` and stamps `lastUpdated`.
    pub fn update<S: Serialize>(
        &self,
        agent: &str,
        summary: &S,
    ) -> Result<UsageMapDocument, UsageMapError> {
        if RESERVED_KEYS.contains(&agent) {
            return Err(UsageMapError::ReservedName(agent.to_string()));
        }
        let _guard = FileGuard::acquire(&self.lock_file)?;

        let mut doc = self.read();
        doc.agents
            .insert(agent.to_string(), serde_json::to_value(summary)?);
        doc.last_updated = Some(Utc::now());
        write_atomic(&self.path, &serde_json::to_string_pretty(&doc)?)?;

        tracing::info!(agent, "Usage map updated");
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn setup() -> (tempfile::TempDir, UsageMap, QuarantineLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = QuarantineLayout::new(dir.path());
        (dir, UsageMap::new(&layout), layout)
    }

    #[test]
    fn test_fresh_map_shape() {
        let (_dir, map, _) = setup();
        let value = serde_json::to_value(map.read()).unwrap();
        assert_eq!(value["frontend"], json!({}));
        assert_eq!(value["backend"], json!({}));
        assert_eq!(value["shared"], json!({}));
        assert_eq!(value["crossReferences"], json!({}));
        assert!(value["lastUpdated"].is_null());
    }

    #[test]
    fn test_update_replaces_only_that_agent() {
        let (_dir, map, layout) = setup();
        map.update("frontend", &json!({"unusedFiles": 3})).unwrap();
        let doc = map.update("backend", &json!({"unusedFiles": 1})).unwrap();

        assert_eq!(doc.agent("frontend"), Some(&json!({"unusedFiles": 3})));
        assert!(doc.last_updated.is_some());

        let on_disk: Value =
            serde_json::from_str(&fs::read_to_string(&layout.usage_map_file).unwrap()).unwrap();
        assert_eq!(on_disk["backend"]["unusedFiles"], 1);
        assert_eq!(on_disk["shared"], json!({}));
    }

    #[test]
    fn test_custom_agent_round_trips() {
        let (_dir, map, _) = setup();
        map.update("docs", &json!({"ok": true})).unwrap();
        assert_eq!(map.read().agent("docs"), Some(&json!({"ok": true})));
    }

    #[test]
    fn test_corrupt_map_starts_fresh() {
        let (_dir, map, layout) = setup();
        fs::create_dir_all(&layout.quarantine_dir).unwrap();
        fs::write(&layout.usage_map_file, "[oops").unwrap();

        assert_eq!(map.read(), UsageMapDocument::default());
        let doc = map.update("backend", &json!({"n": 1})).unwrap();
        assert_eq!(doc.agent("backend"), Some(&json!({"n": 1})));
    }

    #[test]
    fn test_reserved_names_leave_map_intact() {
        let (_dir, map, _) = setup();
        map.update("backend", &json!({"n": 1})).unwrap();

        for name in RESERVED_KEYS {
            let err = map.update(name, &json!({"n": 2})).unwrap_err();
            assert!(matches!(err, UsageMapError::ReservedName(_)));
        }
        assert_eq!(map.read().agent("backend"), Some(&json!({"n": 1})));
    }

    #[test]
    fn test_referenced_by_others_skips_own_entry() {
        let (_dir, map, _) = setup();
        map.update("frontend", &json!({"referencedFiles": ["src/lib/db.ts", "src/lib/a.ts"]}))
            .unwrap();
        map.update("docs", &json!({"referencedFiles": ["src/lib/a.ts", 7]}))
            .unwrap();
        map.update("backend", &json!({"referencedFiles": ["src/lib/own.ts"]}))
            .unwrap();

        let refs = map.read().referenced_by_others("backend");
        assert_eq!(refs.get("src/lib/db.ts").map(String::as_str), Some("frontend"));
        assert_eq!(refs.get("src/lib/a.ts").map(String::as_str), Some("docs"));
        assert!(!refs.contains_key("src/lib/own.ts"));
        assert_eq!(refs.len(), 2);
    }
}
