//! Duplicate function detection: exported function names shared across files.
//!
//! Purely a name collision report. Two unrelated functions that happen to
//! share a name are flagged too.

use std::collections::{BTreeMap, BTreeSet};

use common::{ExportKind, FileRecord};
use serde::Serialize;

/// One function name exported by two or more files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub name: String,
    /// Relative paths, sorted.
    pub files: Vec<String>,
    pub count: usize,
}

/// Groups function exports by bare name.
///
/// Result is sorted by name and does not depend on the order of `records`.
///
/// # Example
/// ```
/// use anatomist::find_duplicates;
/// use common::{Export, ExportKind, FileRecord};
/// use std::path::PathBuf;
///
/// let rec = |rel: &str| FileRecord::new(
///     PathBuf::from(rel), rel, 1,
///     vec![Export::named("formatDate", ExportKind::Function)], vec![],
/// );
/// let groups = find_duplicates(&[rec("src/utils/b.ts"), rec("src/lib/a.ts")]);
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[0].files, vec!["src/lib/a.ts", "src/utils/b.ts"]);
/// ```
pub fn find_duplicates(records: &[FileRecord]) -> Vec<DuplicateGroup> {
    let mut owners: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in records {
        for export in record
            .exports
            .iter()
            .filter(|e| e.kind == ExportKind::Function)
        {
            owners
                .entry(export.name.as_str())
                .or_default()
                .insert(record.relative_path.as_str());
        }
    }

    owners
        .into_iter()
        .filter(|(_, files)| files.len() >= 2)
        .map(|(name, files)| DuplicateGroup {
            name: name.to_string(),
            count: files.len(),
            files: files.into_iter().map(str::to_string).collect(),
        })
        .collect()
}
