//! # File Scanner
//!
//! Walks the configured scope directories, parses every file with a recognised
//! extension and lowers its top-level [`Declaration`]s into a
//! [`common::FileRecord`]. A missing scope directory or an unparseable file is
//! logged and skipped; it never aborts the scan.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use common::{Export, ExportKind, FileRecord, Import, ImportKind};
use walkdir::{DirEntry, WalkDir};

use crate::imports::ImportResolver;
use crate::parser::ParserHost;
use crate::path_util::relative_slash_path;
use crate::{AnatomistError, Declaration, ImportBinding};

/// Extensions scanned when the caller does not configure any.
pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "js", "mjs"];

/// Directory names never descended into.
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".next",
    ".shared_quarantine",
    "dist",
    "build",
    "coverage",
];

/// A file the scanner gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub relative_path: String,
    pub reason: String,
}

/// Result of one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub records: Vec<FileRecord>,
    pub skipped: Vec<SkippedFile>,
}

impl ScanOutcome {
    pub fn total_size(&self) -> u64 {
        self.records.iter().map(|r| r.size).sum()
    }
}

/// Scans `scope_dirs` (relative to `root`) with the default extension set.
pub fn scan<S: AsRef<str>>(
    root: &Path,
    scope_dirs: &[S],
    resolver: &ImportResolver,
) -> Result<ScanOutcome, AnatomistError> {
    scan_with_extensions(root, scope_dirs, DEFAULT_EXTENSIONS, resolver)
}

/// Scans `scope_dirs` (relative to `root`), parsing files whose extension is in
/// `extensions`.
///
/// Files reached through two overlapping scope directories are recorded once.
///
/// # Errors
/// Only when `root` itself cannot be canonicalized. Everything below it is
/// best-effort.
pub fn scan_with_extensions<S: AsRef<str>, E: AsRef<str>>(
    root: &Path,
    scope_dirs: &[S],
    extensions: &[E],
    resolver: &ImportResolver,
) -> Result<ScanOutcome, AnatomistError> {
    let root = dunce::canonicalize(root)?;
    let mut host = ParserHost::new();
    let mut outcome = ScanOutcome::default();
    let mut seen: HashSet<String> = HashSet::new();

    for scope in scope_dirs {
        let scope = scope.as_ref();
        let dir = root.join(scope);
        if !dir.is_dir() {
            tracing::warn!(scope, "scope directory not found, skipping");
            continue;
        }

        for path in walk_sources(&dir, extensions) {
            let Some(relative_path) = relative_slash_path(&root, &path) else {
                continue;
            };
            if !seen.insert(relative_path.clone()) {
                continue;
            }

            match parse_file(&mut host, &path, &relative_path, resolver) {
                Ok(record) => outcome.records.push(record),
                Err(e) => {
                    tracing::warn!(file = %relative_path, error = %e, "failed to analyze file, skipping");
                    outcome.skipped.push(SkippedFile {
                        relative_path,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    tracing::debug!(
        files = outcome.records.len(),
        skipped = outcome.skipped.len(),
        "scan complete"
    );
    Ok(outcome)
}

/// Source files under `dir` in file-name order. Unreadable entries are dropped.
pub(crate) fn walk_sources<E: AsRef<str>>(dir: &Path, extensions: &[E]) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded(e))
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| extensions.iter().any(|x| x.as_ref() == ext))
        })
        .map(DirEntry::into_path)
        .collect()
}

pub(crate) fn is_excluded(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

fn parse_file(
    host: &mut ParserHost,
    path: &Path,
    relative_path: &str,
    resolver: &ImportResolver,
) -> Result<FileRecord, AnatomistError> {
    let size = std::fs::metadata(path)?.len();
    let decls = host.dissect(path)?;
    let (exports, imports) = lower_declarations(decls, resolver);
    Ok(FileRecord::new(
        path.to_path_buf(),
        relative_path,
        size,
        exports,
        imports,
    ))
}

/// Splits declarations into exports and internal imports.
///
/// Package imports are dropped. Namespace imports carry no name to match
/// against an export, so they are dropped too.
fn lower_declarations(
    decls: Vec<Declaration>,
    resolver: &ImportResolver,
) -> (Vec<Export>, Vec<Import>) {
    let mut exports = Vec::new();
    let mut imports = Vec::new();

    for decl in decls {
        match decl {
            Declaration::Function { name, is_default } => {
                exports.push(export(name, ExportKind::Function, is_default));
            }
            Declaration::Class { name, is_default } => {
                exports.push(export(name, ExportKind::Class, is_default));
            }
            Declaration::Variable { names } => {
                exports.extend(
                    names
                        .into_iter()
                        .map(|name| Export::named(name, ExportKind::Variable)),
                );
            }
            Declaration::Import(spec) => {
                if !resolver.is_internal(&spec.source) {
                    continue;
                }
                for binding in spec.bindings {
                    match binding {
                        ImportBinding::Named { imported, local } => imports.push(Import {
                            name: imported,
                            local,
                            source: spec.source.clone(),
                            kind: ImportKind::Named,
                        }),
                        ImportBinding::Default { local } => {
                            imports.push(Import::default_import(&local, &spec.source));
                        }
                        ImportBinding::Namespace { .. } => {}
                    }
                }
            }
        }
    }

    (exports, imports)
}

fn export(name: String, kind: ExportKind, is_default: bool) -> Export {
    if is_default {
        Export::default_export(name, kind)
    } else {
        Export::named(name, kind)
    }
}
