//! Script-table references from the workspace manifest (`package.json`).
//!
//! A file under `scripts/` counts as used when its base name (or its relative
//! path) occurs anywhere inside a command string of the manifest's `scripts`
//! table. This is plain substring matching, so a short base name can be shielded
//! by an unrelated command that happens to contain it.

use aho_corasick::AhoCorasick;
use common::FileRecord;
use std::collections::HashSet;
use std::path::Path;

use crate::AnatomistError;

/// Command strings of the manifest's `scripts` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptReferences {
    commands: Vec<String>,
}

impl ScriptReferences {
    pub fn from_commands<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    /// Loads `scripts` from a `package.json`.
    ///
    /// A missing manifest yields an empty table; malformed JSON is an error.
    pub fn load(manifest_path: &Path) -> Result<Self, AnatomistError> {
        let raw = match std::fs::read_to_string(manifest_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %manifest_path.display(), "no manifest, script table empty");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&raw)
    }

    /// Parses manifest JSON text. Non-string script values are ignored.
    pub fn parse(raw: &str) -> Result<Self, AnatomistError> {
        let manifest: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| AnatomistError::Manifest(e.to_string()))?;
        let commands = manifest
            .get("scripts")
            .and_then(|s| s.as_object())
            .map(|table| {
                table
                    .values()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self { commands })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Returns the relative paths of `records` referenced by any command.
    ///
    /// Builds one Aho-Corasick automaton over every record's stem and relative
    /// path, then makes a single overlapping pass over each command.
    ///
    /// # Example
    /// ```
    /// use anatomist::ScriptReferences;
    /// use common::FileRecord;
    /// use std::path::PathBuf;
    ///
    /// let refs = ScriptReferences::from_commands(["node scripts/seed-db.mjs --fresh"]);
    /// let seed = FileRecord::new(PathBuf::from("/ws/scripts/seed-db.mjs"), "scripts/seed-db.mjs", 1, vec![], vec![]);
    /// let other = FileRecord::new(PathBuf::from("/ws/scripts/migrate.mjs"), "scripts/migrate.mjs", 1, vec![], vec![]);
    /// let found = refs.referenced([&seed, &other]).unwrap();
    /// assert!(found.contains("scripts/seed-db.mjs"));
    /// assert!(!found.contains("scripts/migrate.mjs"));
    /// ```
    pub fn referenced<'a, I>(&self, records: I) -> Result<HashSet<String>, AnatomistError>
    where
        I: IntoIterator<Item = &'a FileRecord>,
    {
        let mut owners: Vec<&str> = Vec::new();
        let mut patterns: Vec<&str> = Vec::new();
        for record in records {
            owners.push(&record.relative_path);
            patterns.push(record.stem());
            owners.push(&record.relative_path);
            patterns.push(&record.relative_path);
        }

        let mut found = HashSet::new();
        if patterns.is_empty() || self.commands.is_empty() {
            return Ok(found);
        }

        let ac = AhoCorasick::new(&patterns)
            .map_err(|e| AnatomistError::Manifest(format!("AhoCorasick build failed: {}", e)))?;

        for command in &self.commands {
            for mat in ac.find_overlapping_iter(command.as_str()) {
                found.insert(owners[mat.pattern().as_usize()].to_string());
            }
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn script(rel: &str) -> FileRecord {
        FileRecord::new(PathBuf::from("/ws").join(rel), rel, 1, vec![], vec![])
    }

    #[test]
    fn test_parse_scripts_table() {
        let refs = ScriptReferences::parse(
            r#"{"name":"x","scripts":{"seed":"node scripts/seed.mjs","n":42}}"#,
        )
        .unwrap();
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn test_parse_without_scripts() {
        let refs = ScriptReferences::parse(r#"{"name":"x"}"#).unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        let err = ScriptReferences::parse("{not json").unwrap_err();
        assert!(matches!(err, AnatomistError::Manifest(_)));
    }

    #[test]
    fn test_load_missing_manifest_is_empty() {
        let refs = ScriptReferences::load(Path::new("/definitely/not/here/package.json")).unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn test_load_from_disk() {
        let tmp = std::env::temp_dir().join("test_manifest_load");
        fs::create_dir_all(&tmp).ok();
        fs::write(
            tmp.join("package.json"),
            r#"{"scripts":{"clean":"node scripts/agents/backend-cleaner.js"}}"#,
        )
        .ok();

        let refs = ScriptReferences::load(&tmp.join("package.json")).unwrap();
        let found = refs
            .referenced([&script("scripts/agents/backend-cleaner.js")])
            .unwrap();
        assert!(found.contains("scripts/agents/backend-cleaner.js"));

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_overlapping_stems_both_found() {
        let refs = ScriptReferences::from_commands(["tsx scripts/seed-users.ts"]);
        let a = script("scripts/seed.ts");
        let b = script("scripts/seed-users.ts");
        let found = refs.referenced([&a, &b]).unwrap();
        // "seed" is a substring of "seed-users": both count as referenced.
        assert!(found.contains("scripts/seed.ts"));
        assert!(found.contains("scripts/seed-users.ts"));
    }

    #[test]
    fn test_empty_inputs() {
        let refs = ScriptReferences::default();
        assert!(refs.referenced([&script("scripts/a.js")]).unwrap().is_empty());

        let refs = ScriptReferences::from_commands(["node a.js"]);
        assert!(refs.referenced(std::iter::empty()).unwrap().is_empty());
    }
}
