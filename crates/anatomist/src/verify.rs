//! # Textual Reference Search
//!
//! Second opinion on unused candidates. The usage graph only sees static
//! imports it could resolve; a path written into a dynamic `import()`, a
//! `require` call, a route table or a JSON fixture is invisible to it. This
//! pass greps every project text file for each candidate's workspace path.
//!
//! A hit counts when the path is quoted (`"src/lib/x"`, `'src/lib/x.ts'`) or
//! appears on a line that also contains `import`, `require` or `from`.

use std::collections::BTreeMap;
use std::path::Path;

use aho_corasick::AhoCorasick;
use common::FileRecord;
use walkdir::WalkDir;

use crate::imports::{ImportResolver, RESOLVE_EXTENSIONS};
use crate::path_util::relative_slash_path;
use crate::scan::is_excluded;
use crate::AnatomistError;

/// Extensions of files searched for references.
pub const SEARCH_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "json", "html"];

/// Files above this size are not searched (bundles, lockfiles).
pub const MAX_SEARCH_FILE_SIZE: u64 = 1024 * 1024;

const QUOTES: &[u8] = b"\"'`";
const IMPORT_WORDS: &[&[u8]] = &[b"import", b"require", b"from"];

/// Finds project files that mention a candidate's path.
///
/// Returns `candidate relative path → first referencing file`, both
/// workspace-relative. A candidate never counts as referencing itself.
///
/// # Errors
/// Only if the search automaton cannot be built.
pub fn find_textual_references<'a, I>(
    root: &Path,
    candidates: I,
    resolver: &ImportResolver,
) -> Result<BTreeMap<String, String>, AnatomistError>
where
    I: IntoIterator<Item = &'a FileRecord>,
{
    let mut owners: Vec<&str> = Vec::new();
    let mut patterns: Vec<String> = Vec::new();
    for record in candidates {
        let rel = record.relative_path.as_str();
        let bare = strip_source_extension(rel);
        for form in std::iter::once(bare.to_string())
            .chain(std::iter::once(rel.to_string()))
            .chain(resolver.aliased_forms(bare))
        {
            owners.push(rel);
            patterns.push(form);
        }
    }

    let mut hits: BTreeMap<String, String> = BTreeMap::new();
    if patterns.is_empty() {
        return Ok(hits);
    }
    let ac = AhoCorasick::new(&patterns)
        .map_err(|e| AnatomistError::Search(format!("AhoCorasick build failed: {}", e)))?;

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !(is_excluded(e) || (e.depth() == 1 && e.file_name() == "logs"))
        });

    for entry in walker.flatten() {
        if !entry.file_type().is_file() || !has_search_extension(entry.path()) {
            continue;
        }
        if entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX) > MAX_SEARCH_FILE_SIZE {
            continue;
        }
        let Some(searched) = relative_slash_path(root, entry.path()) else {
            continue;
        };
        let content = match std::fs::read(entry.path()) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(file = %searched, error = %e, "unreadable, not searched");
                continue;
            }
        };

        for mat in ac.find_overlapping_iter(content.as_slice()) {
            let owner = owners[mat.pattern().as_usize()];
            if owner == searched || hits.contains_key(owner) {
                continue;
            }
            if is_reference(&content, mat.start(), mat.end()) {
                tracing::debug!(candidate = owner, file = %searched, "textual reference found");
                hits.insert(owner.to_string(), searched.clone());
            }
        }
    }
    Ok(hits)
}

fn strip_source_extension(relative_path: &str) -> &str {
    match relative_path.rsplit_once('.') {
        Some((stem, ext)) if RESOLVE_EXTENSIONS.contains(&ext) && !stem.ends_with('/') => stem,
        _ => relative_path,
    }
}

fn has_search_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| SEARCH_EXTENSIONS.contains(&ext))
}

fn is_reference(content: &[u8], start: usize, end: usize) -> bool {
    let before = start.checked_sub(1).map(|i| content[i]);
    let after = content.get(end).copied();
    let quoted = before.is_some_and(|b| QUOTES.contains(&b)) && after.is_some_and(|b| QUOTES.contains(&b));
    if quoted {
        return true;
    }

    let line_start = content[..start]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    let line = &content[line_start..start];
    IMPORT_WORDS
        .iter()
        .any(|word| line.windows(word.len()).any(|w| w == *word))
}
