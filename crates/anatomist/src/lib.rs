//! # The Anatomist: Module Graph Extraction
//!
//! **Role**: Turns a JavaScript/TypeScript source tree into [`common::FileRecord`]s
//! and decides which files nothing references.
//!
//! **Core Types**:
//! - [`Declaration`]: closed set of top-level facts the parser lowers a module into.
//! - [`graph::UsageGraph`]: export index + resolved import edges.
//! - [`graph::UnusedFiles`]: the unused-file buckets.
//!
//! **Design**:
//! - Tree-sitter grammars for TS/TSX/JS; only top-level statements are inspected.
//! - Import resolution is lexical and considers only files the scan produced.
//! - Usage is a single-hop inbound check unless a deeper policy or the
//!   entry-point reachability walk is requested.

pub mod duplicates;
pub mod graph;
pub mod imports;
pub mod manifest;
pub mod naming;
pub mod parser;
pub mod path_util;
pub mod safety;
pub mod scan;
pub mod verify;

pub use duplicates::{find_duplicates, DuplicateGroup};
pub use graph::{classify_unused, referenced_paths, UnusedFiles, UsageGraph, UsageMode, UsagePolicy};
pub use imports::ImportResolver;
pub use manifest::ScriptReferences;
pub use parser::ParserHost;
pub use safety::{CandidateFilter, SkipReason, SkippedCandidate};
pub use naming::{validate_naming_convention, NamingReport};
pub use scan::{scan, scan_with_extensions, ScanOutcome, SkippedFile};
pub use verify::find_textual_references;

/// A top-level fact extracted from one module.
///
/// `Function`, `Class` and `Variable` are only produced for *exported*
/// declarations; anything not exported is invisible to the usage graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// `export function foo() {}` / `export default function foo() {}`
    Function { name: String, is_default: bool },
    /// `export class Foo {}` / `export default class Foo {}`
    Class { name: String, is_default: bool },
    /// `export const a = 1, b = 2;` (identifier declarators only)
    Variable { names: Vec<String> },
    /// `import ... from "source"`
    Import(ImportSpec),
}

/// One `import` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    pub source: String,
    pub bindings: Vec<ImportBinding>,
}

/// One binding introduced by an `import` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportBinding {
    /// `import { imported as local }`
    Named { imported: String, local: String },
    /// `import local from`
    Default { local: String },
    /// `import * as local from`
    Namespace { local: String },
}

/// Errors produced by the Anatomist crate.
#[derive(Debug, thiserror::Error)]
pub enum AnatomistError {
    /// Tree-sitter parsing failed or produced a tree with syntax errors.
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Byte range exceeds u32::MAX (file too large).
    #[error("Byte range overflow: file size exceeds 4GB limit")]
    ByteRangeOverflow,

    /// Manifest (`package.json`) could not be decoded.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// The reference search could not be set up.
    #[error("Search error: {0}")]
    Search(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = AnatomistError::ParseFailure("bad.ts".into());
        assert_eq!(e.to_string(), "Parse failure: bad.ts");

        let io = AnatomistError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        assert!(io.to_string().starts_with("I/O error"));
    }
}
