//! Tree-sitter based module parser for TypeScript, TSX and JavaScript.
//!
//! File extension determines which grammar is used. Only the top level of the
//! program is inspected: `export` statements wrapping a declaration and
//! `import` statements. Exports nested inside namespaces or conditionals are
//! not seen, and anonymous default exports (`export default () => {}`,
//! `export default { ... }`) produce nothing.

use std::fs::File;
use std::path::Path;

use memmap2::MmapOptions;
use tree_sitter::{Language, Node, Parser};

use crate::{AnatomistError, Declaration, ImportBinding, ImportSpec};

/// Grammar selected for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    TypeScript,
    Tsx,
    JavaScript,
}

impl SourceLanguage {
    /// Picks the grammar from the file extension.
    ///
    /// # Example
    /// ```
    /// use std::path::Path;
    /// use anatomist::parser::SourceLanguage;
    ///
    /// assert_eq!(SourceLanguage::from_path(Path::new("a.ts")), Some(SourceLanguage::TypeScript));
    /// assert_eq!(SourceLanguage::from_path(Path::new("a.mjs")), Some(SourceLanguage::JavaScript));
    /// assert_eq!(SourceLanguage::from_path(Path::new("a.css")), None);
    /// ```
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str())? {
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "js" | "mjs" | "cjs" | "jsx" => Some(Self::JavaScript),
            _ => None,
        }
    }

    fn grammar(self) -> Language {
        match self {
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

/// Parser host that lowers module sources into [`Declaration`]s.
///
/// One host is reused for a whole scan; the grammar is swapped per file.
///
/// # Example
/// ```
/// use anatomist::parser::{ParserHost, SourceLanguage};
/// use anatomist::Declaration;
///
/// let mut host = ParserHost::new();
/// let decls = host
///     .dissect_source(b"export function helper() {}", SourceLanguage::TypeScript)
///     .unwrap();
/// assert_eq!(
///     decls,
///     vec![Declaration::Function { name: "helper".into(), is_default: false }]
/// );
/// ```
pub struct ParserHost {
    parser: Parser,
}

impl ParserHost {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Extracts declarations from a source file using memory-mapped I/O.
    ///
    /// # Errors
    /// - `IoError`: File not found, permission denied, mmap failure
    /// - `ByteRangeOverflow`: File larger than 4GB (tree-sitter u32 limit)
    /// - `ParseFailure`: unsupported extension, or the tree contains syntax errors
    pub fn dissect(&mut self, path: &Path) -> Result<Vec<Declaration>, AnatomistError> {
        let language = SourceLanguage::from_path(path).ok_or_else(|| {
            AnatomistError::ParseFailure(format!("Unsupported file type: {}", path.display()))
        })?;

        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        if file_len > u32::MAX as u64 {
            return Err(AnatomistError::ByteRangeOverflow);
        }
        if file_len == 0 {
            return Ok(Vec::new());
        }

        // SAFETY: The file handle is held for the duration of the mmap lifetime.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        self.dissect_source(&mmap[..], language)
    }

    /// Parses an in-memory buffer with the given grammar.
    pub fn dissect_source(
        &mut self,
        source: &[u8],
        language: SourceLanguage,
    ) -> Result<Vec<Declaration>, AnatomistError> {
        self.parser
            .set_language(&language.grammar())
            .map_err(|e| {
                AnatomistError::ParseFailure(format!(
                    "Failed to load {:?} grammar: {}",
                    language, e
                ))
            })?;

        let tree = self.parser.parse(source, None).ok_or_else(|| {
            AnatomistError::ParseFailure("Tree-sitter parse returned None".to_string())
        })?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(AnatomistError::ParseFailure(format!(
                "Syntax error near line {}",
                first_error_line(root)
            )));
        }

        Ok(lower_program(root, source))
    }
}

impl Default for ParserHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks the direct children of `program`.
fn lower_program(root: Node<'_>, source: &[u8]) -> Vec<Declaration> {
    let mut decls = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "export_statement" => lower_export(child, source, &mut decls),
            "import_statement" => {
                if let Some(spec) = lower_import(child, source) {
                    decls.push(Declaration::Import(spec));
                }
            }
            _ => {}
        }
    }
    decls
}

fn lower_export(node: Node<'_>, source: &[u8], out: &mut Vec<Declaration>) {
    // `export { a, b }`, `export * from`, `export default <expr>` carry no declaration.
    let Some(decl) = node.child_by_field_name("declaration") else {
        return;
    };
    let is_default = has_token(node, "default");

    match decl.kind() {
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = field_text(decl, "name", source) {
                out.push(Declaration::Function { name, is_default });
            }
        }
        "class_declaration" | "abstract_class_declaration" => {
            if let Some(name) = field_text(decl, "name", source) {
                out.push(Declaration::Class { name, is_default });
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = decl.walk();
            let names: Vec<String> = decl
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "variable_declarator")
                .filter_map(|d| d.child_by_field_name("name"))
                .filter(|n| n.kind() == "identifier")
                .filter_map(|n| node_text(n, source))
                .collect();
            if !names.is_empty() {
                out.push(Declaration::Variable { names });
            }
        }
        _ => {}
    }
}

fn lower_import(node: Node<'_>, source: &[u8]) -> Option<ImportSpec> {
    let specifier = unquote(node.child_by_field_name("source")?.utf8_text(source).ok()?);
    let mut bindings = Vec::new();

    let mut cursor = node.walk();
    for clause in node
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "import_clause")
    {
        let mut clause_cursor = clause.walk();
        for part in clause.named_children(&mut clause_cursor) {
            match part.kind() {
                "identifier" => {
                    if let Some(local) = node_text(part, source) {
                        bindings.push(ImportBinding::Default { local });
                    }
                }
                "named_imports" => {
                    let mut spec_cursor = part.walk();
                    for spec in part
                        .named_children(&mut spec_cursor)
                        .filter(|c| c.kind() == "import_specifier")
                    {
                        let Some(imported) = spec
                            .child_by_field_name("name")
                            .and_then(|n| n.utf8_text(source).ok())
                            .map(unquote)
                        else {
                            continue;
                        };
                        let local =
                            field_text(spec, "alias", source).unwrap_or_else(|| imported.clone());
                        bindings.push(ImportBinding::Named { imported, local });
                    }
                }
                "namespace_import" => {
                    let mut ns_cursor = part.walk();
                    let local = part
                        .named_children(&mut ns_cursor)
                        .find(|c| c.kind() == "identifier")
                        .and_then(|c| node_text(c, source));
                    if let Some(local) = local {
                        bindings.push(ImportBinding::Namespace { local });
                    }
                }
                _ => {}
            }
        }
    }

    Some(ImportSpec {
        source: specifier,
        bindings,
    })
}

/// `true` if `node` has a direct (anonymous) child token of the given kind.
fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == token);
    found
}

fn node_text(node: Node<'_>, source: &[u8]) -> Option<String> {
    node.utf8_text(source).ok().map(str::to_string)
}

fn field_text(node: Node<'_>, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .and_then(|n| node_text(n, source))
}

fn unquote(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

/// 1-indexed line of the first ERROR/MISSING node, depth-first.
fn first_error_line(root: Node<'_>) -> usize {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return node.start_position().row + 1;
        }
        let descend = node.has_error() && cursor.goto_first_child();
        if descend {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return root.start_position().row + 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse_ts(source: &str) -> Vec<Declaration> {
        ParserHost::new()
            .dissect_source(source.as_bytes(), SourceLanguage::TypeScript)
            .unwrap()
    }

    fn imports(decls: &[Declaration]) -> Vec<&ImportSpec> {
        decls
            .iter()
            .filter_map(|d| match d {
                Declaration::Import(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_named_function_export() {
        let decls = parse_ts("export function helper(a: number): number { return a; }");
        assert_eq!(
            decls,
            vec![Declaration::Function {
                name: "helper".into(),
                is_default: false
            }]
        );
    }

    #[test]
    fn test_default_named_function_export() {
        let decls = parse_ts("export default function handler() {}");
        assert_eq!(
            decls,
            vec![Declaration::Function {
                name: "handler".into(),
                is_default: true
            }]
        );
    }

    #[test]
    fn test_default_class_export() {
        let decls = parse_ts("export default class Store {}");
        assert_eq!(
            decls,
            vec![Declaration::Class {
                name: "Store".into(),
                is_default: true
            }]
        );
    }

    #[test]
    fn test_anonymous_default_exports_are_not_captured() {
        assert!(parse_ts("export default () => 42;").is_empty());
        assert!(parse_ts("export default { a: 1 };").is_empty());
    }

    #[test]
    fn test_variable_exports() {
        let decls = parse_ts("export const a = 1, b = () => 2;\nexport let { c } = obj;");
        assert_eq!(
            decls,
            vec![Declaration::Variable {
                names: vec!["a".into(), "b".into()]
            }]
        );
    }

    #[test]
    fn test_non_exported_declarations_ignored() {
        let decls = parse_ts("function local() {}\nclass Hidden {}\nconst x = 1;");
        assert!(decls.is_empty());
    }

    #[test]
    fn test_export_clause_ignored() {
        let decls = parse_ts("const a = 1;\nexport { a };");
        assert!(decls.is_empty());
    }

    #[test]
    fn test_import_bindings() {
        let decls = parse_ts(
            "import Default, { foo, bar as baz } from './a';\nimport * as ns from \"../b\";\nimport './side-effect';",
        );
        let specs = imports(&decls);
        assert_eq!(specs.len(), 3);

        assert_eq!(specs[0].source, "./a");
        assert_eq!(
            specs[0].bindings,
            vec![
                ImportBinding::Default {
                    local: "Default".into()
                },
                ImportBinding::Named {
                    imported: "foo".into(),
                    local: "foo".into()
                },
                ImportBinding::Named {
                    imported: "bar".into(),
                    local: "baz".into()
                },
            ]
        );

        assert_eq!(specs[1].source, "../b");
        assert_eq!(
            specs[1].bindings,
            vec![ImportBinding::Namespace { local: "ns".into() }]
        );

        assert_eq!(specs[2].source, "./side-effect");
        assert!(specs[2].bindings.is_empty());
    }

    #[test]
    fn test_javascript_grammar() {
        let decls = ParserHost::new()
            .dissect_source(
                b"import { x } from './x.mjs';\nexport async function run() { await x(); }\n",
                SourceLanguage::JavaScript,
            )
            .unwrap();
        assert_eq!(decls.len(), 2);
        assert!(matches!(&decls[1], Declaration::Function { name, .. } if name == "run"));
    }

    #[test]
    fn test_syntax_error_is_parse_failure() {
        let result = ParserHost::new()
            .dissect_source(b"export function (", SourceLanguage::TypeScript);
        assert!(matches!(result, Err(AnatomistError::ParseFailure(_))));
    }

    #[test]
    fn test_dissect_file_and_empty_file() {
        let tmp = std::env::temp_dir().join("test_parser_dissect_file");
        fs::create_dir_all(&tmp).ok();

        let file = tmp.join("mod.ts");
        fs::write(&file, "export class Repo {}\n").ok();
        let empty = tmp.join("empty.ts");
        fs::write(&empty, "").ok();

        let mut host = ParserHost::new();
        let decls = host.dissect(&file).unwrap();
        assert_eq!(
            decls,
            vec![Declaration::Class {
                name: "Repo".into(),
                is_default: false
            }]
        );
        assert!(host.dissect(&empty).unwrap().is_empty());

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_unsupported_extension() {
        let mut host = ParserHost::new();
        let result = host.dissect(Path::new("/tmp/whatever.css"));
        assert!(matches!(result, Err(AnatomistError::ParseFailure(_))));
    }
}
