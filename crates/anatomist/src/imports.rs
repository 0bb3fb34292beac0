//! # Import Resolution
//!
//! Maps an import specifier to a workspace-relative file that the scan produced.
//! Relative specifiers (`./a`, `../lib/b`) are joined lexically against the
//! importing file's directory. Alias prefixes (`@/` → `src/`) are only honoured
//! when configured; with the default empty alias map, aliased imports stay
//! unresolved.
//!
//! Resolution never touches the filesystem: candidates are checked against a
//! caller-supplied predicate (normally "is this path in the scan?").

use crate::path_util::{join_lexical, parent_dir};

/// Extensions tried, in order, for an extension-less specifier.
pub const RESOLVE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs"];

/// Pluggable specifier resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResolver {
    /// `(prefix, replacement)` pairs, longest prefix first.
    aliases: Vec<(String, String)>,
}

impl ImportResolver {
    /// Resolver that only understands relative specifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an alias prefix, e.g. `("@/", "src/")`.
    ///
    /// # Example
    /// ```
    /// use anatomist::ImportResolver;
    ///
    /// let resolver = ImportResolver::new().with_alias("@/", "src/");
    /// assert!(resolver.is_internal("@/lib/db"));
    /// assert_eq!(resolver.candidate_base("@/lib/db", "src/app/page.ts").as_deref(), Some("src/lib/db"));
    /// ```
    pub fn with_alias(mut self, prefix: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.aliases.push((prefix.into(), replacement.into()));
        self.aliases
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        self
    }

    /// Builds a resolver from an alias table (config file form).
    pub fn from_aliases<I, K, V>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        aliases
            .into_iter()
            .fold(Self::new(), |r, (k, v)| r.with_alias(k, v))
    }

    /// `true` for specifiers that point inside the workspace.
    ///
    /// Package imports (`react`, `@supabase/supabase-js`) are external and
    /// never recorded by the scanner.
    pub fn is_internal(&self, specifier: &str) -> bool {
        specifier.starts_with('.')
            || specifier.starts_with('/')
            || self.alias_for(specifier).is_some()
    }

    /// Lexical target of `specifier` before extension probing.
    ///
    /// `None` for root-absolute specifiers (`/x`), package imports, and
    /// relative paths that climb out of the workspace.
    pub fn candidate_base(&self, specifier: &str, importer: &str) -> Option<String> {
        if is_relative(specifier) {
            return join_lexical(parent_dir(importer), specifier);
        }
        let (prefix, replacement) = self.alias_for(specifier)?;
        let rest = &specifier[prefix.len()..];
        join_lexical(replacement, rest)
    }

    /// Resolves `specifier` (as written in `importer`) to a known file.
    ///
    /// Lookup order: exact path, `<base>.<ext>`, `<base>/index.<ext>`. A `.js`
    /// suffix written against a TypeScript source (`./a.js` → `a.ts`) is also
    /// tried.
    ///
    /// # Example
    /// ```
    /// use anatomist::ImportResolver;
    ///
    /// let known = ["src/lib/a.ts", "src/lib/db/index.ts"];
    /// let exists = |p: &str| known.contains(&p);
    /// let resolver = ImportResolver::new();
    ///
    /// assert_eq!(resolver.resolve("./a", "src/lib/b.ts", exists).as_deref(), Some("src/lib/a.ts"));
    /// assert_eq!(resolver.resolve("./db", "src/lib/b.ts", exists).as_deref(), Some("src/lib/db/index.ts"));
    /// assert_eq!(resolver.resolve("@/lib/a", "src/lib/b.ts", exists), None);
    /// ```
    pub fn resolve<F>(&self, specifier: &str, importer: &str, exists: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        let base = self.candidate_base(specifier, importer)?;
        if base.is_empty() {
            return None;
        }

        if exists(&base) {
            return Some(base);
        }
        for ext in RESOLVE_EXTENSIONS {
            let candidate = format!("{}.{}", base, ext);
            if exists(&candidate) {
                return Some(candidate);
            }
        }
        for ext in RESOLVE_EXTENSIONS {
            let candidate = format!("{}/index.{}", base, ext);
            if exists(&candidate) {
                return Some(candidate);
            }
        }
        if let Some(stem) = base.strip_suffix(".js") {
            for ext in ["ts", "tsx"] {
                let candidate = format!("{}.{}", stem, ext);
                if exists(&candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Spellings of `relative_path` through each alias whose replacement
    /// prefixes it (`src/lib/db` → `@/lib/db`).
    pub fn aliased_forms(&self, relative_path: &str) -> Vec<String> {
        self.aliases
            .iter()
            .filter(|(_, replacement)| !replacement.is_empty())
            .filter_map(|(prefix, replacement)| {
                let rest = relative_path.strip_prefix(replacement.as_str())?;
                Some(format!("{}{}", prefix, rest))
            })
            .collect()
    }

    fn alias_for(&self, specifier: &str) -> Option<(&str, &str)> {
        self.aliases
            .iter()
            .find(|(prefix, _)| specifier.starts_with(prefix.as_str()))
            .map(|(p, r)| (p.as_str(), r.as_str()))
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}
