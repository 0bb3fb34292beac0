//! Shared data model for the cleanup agents.
//!
//! Every crate in the workspace speaks in terms of these types: the scanner
//! produces [`FileRecord`]s, the usage graph reads them, the reaper turns the
//! unused ones into [`QuarantineRecord`]s. All paths that are compared with one
//! another are UTF-8 strings with forward slashes, relative to the workspace root.

pub mod layout;

pub use layout::QuarantineLayout;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What an exported binding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Function,
    Variable,
    Class,
}

/// One top-level export of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
    pub is_default: bool,
}

impl Export {
    pub fn named(name: impl Into<String>, kind: ExportKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_default: false,
        }
    }

    pub fn default_export(name: impl Into<String>, kind: ExportKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_default: true,
        }
    }
}

/// Whether an import binds a named export or the default export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Named,
    Default,
}

/// One import specifier pointing at another file of the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Import {
    /// Name looked up in the target's exports. For named imports this is the
    /// exported name (`foo` in `import { foo as bar }`); for default imports it
    /// is the local binding.
    pub name: String,
    /// Local binding name (`bar` in `import { foo as bar }`).
    pub local: String,
    /// Module specifier exactly as written (`"./a"`, `"@/lib/db"`).
    pub source: String,
    pub kind: ImportKind,
}

impl Import {
    pub fn named(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            local: name.to_string(),
            source: source.to_string(),
            kind: ImportKind::Named,
        }
    }

    pub fn default_import(local: &str, source: &str) -> Self {
        Self {
            name: local.to_string(),
            local: local.to_string(),
            source: source.to_string(),
            kind: ImportKind::Default,
        }
    }
}

/// Path-based classification of a scanned file.
///
/// Only the first four roles can ever be reported as unused; `Other` files
/// are scanned (their imports count) but never quarantined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileRole {
    Utility,
    Middleware,
    ApiRoute,
    Module,
    Other,
}

impl FileRole {
    /// Classifies a workspace-relative path by prefix alone.
    ///
    /// # Examples
    /// ```
    /// # use common::FileRole;
    /// assert_eq!(FileRole::classify("src/lib/db.ts"), FileRole::Utility);
    /// assert_eq!(FileRole::classify("src/app/api/users/route.ts"), FileRole::ApiRoute);
    /// assert_eq!(FileRole::classify("scripts/seed.mjs"), FileRole::Module);
    /// assert_eq!(FileRole::classify("src/library/x.ts"), FileRole::Other);
    /// ```
    pub fn classify(relative_path: &str) -> Self {
        if under(relative_path, "src/lib") || under(relative_path, "src/utils") {
            FileRole::Utility
        } else if under(relative_path, "src/middleware") {
            FileRole::Middleware
        } else if under(relative_path, "src/app")
            && (relative_path.contains("/api/") || relative_path.contains("/route"))
        {
            FileRole::ApiRoute
        } else if under(relative_path, "scripts") {
            FileRole::Module
        } else {
            FileRole::Other
        }
    }
}

/// Component-aware prefix check: `src/lib` matches `src/lib/x.ts`, not `src/library/x.ts`.
fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// One parsed source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the workspace root, forward slashes.
    pub relative_path: String,
    pub file_name: String,
    pub size: u64,
    pub exports: Vec<Export>,
    pub imports: Vec<Import>,
    pub role: FileRole,
}

impl FileRecord {
    /// Builds a record with the role derived from `relative_path`.
    pub fn new(
        path: PathBuf,
        relative_path: impl Into<String>,
        size: u64,
        exports: Vec<Export>,
        imports: Vec<Import>,
    ) -> Self {
        let relative_path = relative_path.into();
        let file_name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(relative_path.as_str())
            .to_string();
        let role = FileRole::classify(&relative_path);
        Self {
            path,
            relative_path,
            file_name,
            size,
            exports,
            imports,
            role,
        }
    }

    pub fn is_utility(&self) -> bool {
        self.role == FileRole::Utility
    }

    pub fn is_middleware(&self) -> bool {
        self.role == FileRole::Middleware
    }

    pub fn is_api_route(&self) -> bool {
        self.role == FileRole::ApiRoute
    }

    pub fn is_module(&self) -> bool {
        self.role == FileRole::Module
    }

    /// Base name without the final extension (`seed` for `scripts/seed.mjs`).
    pub fn stem(&self) -> &str {
        match self.file_name.rfind('.') {
            Some(0) | None => &self.file_name,
            Some(idx) => &self.file_name[..idx],
        }
    }
}

/// One file relocated into the quarantine tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineRecord {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub size: u64,
    /// Lowercase hex SHA-256 of the quarantined bytes.
    pub hash: String,
    pub timestamp: DateTime<Utc>,
}
