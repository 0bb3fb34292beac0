//! # Usage Graph Builder
//!
//! Two-pass pipeline over scanned [`FileRecord`]s:
//! 1. **Index Pass**: `(relative_path, export_name) → file`.
//! 2. **Link Pass**: resolve every import against the index; only imports that
//!    land on a real export become edges.
//!
//! Classification runs in one of two [`UsageMode`]s. `Inbound` is a check of
//! configurable depth: with the default depth of 1 a file imported only by
//! another unused file still counts as used. `Reachability` walks file links
//! breadth-first from framework entry files and flags whatever it never
//! reaches, which is how component trees are judged.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::OnceLock;

use common::{FileRecord, FileRole, ImportKind};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::imports::ImportResolver;
use crate::manifest::ScriptReferences;
use crate::AnatomistError;

/// Files that are always considered used.
pub const DEFAULT_ENTRY_POINTS: &[&str] = &[
    "src/lib/utils.ts",
    "src/lib/supabase.ts",
    "src/lib/database.ts",
];

static FRAMEWORK_ENTRY: OnceLock<Regex> = OnceLock::new();
static PROTECTED_FILE: OnceLock<Regex> = OnceLock::new();

/// `(relative_path, export_name)`.
pub type ExportKey = (String, String);

/// Statistics about the usage graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub file_count: usize,
    pub export_count: usize,
    pub import_count: usize,
    pub resolved_count: usize,
}

impl GraphStats {
    pub fn unresolved_count(&self) -> usize {
        self.import_count - self.resolved_count
    }
}

/// Export index plus resolved import edges.
///
/// Node weights are indices into [`UsageGraph::files`]; edge weights are the
/// imported export name.
pub struct UsageGraph {
    files: Vec<FileRecord>,
    export_index: BTreeMap<ExportKey, usize>,
    import_edges: BTreeMap<String, BTreeSet<ExportKey>>,
    graph: DiGraph<usize, String>,
    nodes: Vec<NodeIndex>,
    /// File-level links: importer index → indices of files it imports from,
    /// whether or not the imported name matched an export.
    file_links: Vec<BTreeSet<usize>>,
    pub stats: GraphStats,
}

impl UsageGraph {
    /// Builds the graph from one scan's records.
    ///
    /// A default import matches the target's default export whatever its
    /// declared name; a named import matches the export of that name.
    pub fn build(records: &[FileRecord], resolver: &ImportResolver) -> Self {
        let files = records.to_vec();
        let mut graph = DiGraph::with_capacity(files.len(), 0);
        let nodes: Vec<NodeIndex> = (0..files.len()).map(|i| graph.add_node(i)).collect();
        let mut stats = GraphStats {
            file_count: files.len(),
            ..GraphStats::default()
        };

        // Pass 1: index exports.
        let mut export_index = BTreeMap::new();
        let mut default_exports: HashMap<&str, &str> = HashMap::new();
        let mut by_path: HashMap<&str, usize> = HashMap::new();
        for (i, file) in files.iter().enumerate() {
            by_path.insert(&file.relative_path, i);
            for export in &file.exports {
                export_index.insert((file.relative_path.clone(), export.name.clone()), i);
                if export.is_default {
                    default_exports.insert(&file.relative_path, &export.name);
                }
                stats.export_count += 1;
            }
        }

        // Pass 2: resolve imports to export keys.
        let mut import_edges: BTreeMap<String, BTreeSet<ExportKey>> = BTreeMap::new();
        let mut links: Vec<(usize, usize, String)> = Vec::new();
        let mut file_links: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); files.len()];
        for (i, file) in files.iter().enumerate() {
            for import in &file.imports {
                stats.import_count += 1;
                let Some(target) = resolver.resolve(&import.source, &file.relative_path, |p| {
                    by_path.contains_key(p)
                }) else {
                    tracing::trace!(file = %file.relative_path, source = %import.source, "unresolved import");
                    continue;
                };
                if let Some(&target_file) = by_path.get(target.as_str()) {
                    if target_file != i {
                        file_links[i].insert(target_file);
                    }
                }

                let name = match import.kind {
                    ImportKind::Default => default_exports
                        .get(target.as_str())
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| import.name.clone()),
                    ImportKind::Named => import.name.clone(),
                };
                let key = (target, name);
                let Some(&target_idx) = export_index.get(&key) else {
                    continue;
                };

                stats.resolved_count += 1;
                links.push((i, target_idx, key.1.clone()));
                import_edges
                    .entry(file.relative_path.clone())
                    .or_default()
                    .insert(key);
            }
        }

        for (from, to, name) in links {
            graph.add_edge(nodes[from], nodes[to], name);
        }

        tracing::debug!(
            files = stats.file_count,
            exports = stats.export_count,
            resolved = stats.resolved_count,
            unresolved = stats.unresolved_count(),
            "usage graph built"
        );

        Self {
            files,
            export_index,
            import_edges,
            graph,
            nodes,
            file_links,
            stats,
        }
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// The file exporting `name` from `relative_path`, if indexed.
    pub fn exporter(&self, relative_path: &str, name: &str) -> Option<&FileRecord> {
        self.export_index
            .get(&(relative_path.to_string(), name.to_string()))
            .map(|&i| &self.files[i])
    }

    /// Resolved export keys imported by `relative_path`.
    pub fn edges_from(&self, relative_path: &str) -> Option<&BTreeSet<ExportKey>> {
        self.import_edges.get(relative_path)
    }

    /// `true` if `from` imports `name` from `to`.
    pub fn has_edge(&self, from: &str, to: &str, name: &str) -> bool {
        self.edges_from(from)
            .is_some_and(|keys| keys.contains(&(to.to_string(), name.to_string())))
    }

    /// Relative paths of the other files importing from `relative_path`, sorted.
    pub fn importers_of(&self, relative_path: &str) -> Vec<&str> {
        let Some(idx) = self
            .files
            .iter()
            .position(|f| f.relative_path == relative_path)
        else {
            return Vec::new();
        };
        let importers: BTreeSet<&str> = self
            .importer_indices(idx)
            .filter(|&j| j != idx)
            .map(|j| self.files[j].relative_path.as_str())
            .collect();
        importers.into_iter().collect()
    }

    /// Files `relative_path` imports from, sorted. Name mismatches still link.
    pub fn links_from(&self, relative_path: &str) -> Vec<&str> {
        let Some(idx) = self
            .files
            .iter()
            .position(|f| f.relative_path == relative_path)
        else {
            return Vec::new();
        };
        let mut linked: Vec<&str> = self.file_links[idx]
            .iter()
            .map(|&j| self.files[j].relative_path.as_str())
            .collect();
        linked.sort_unstable();
        linked
    }

    fn importer_indices(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph
            .neighbors_directed(self.nodes[idx], Direction::Incoming)
            .map(|n| self.graph[n])
    }
}

/// How [`classify_unused`] decides a file is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageMode {
    /// Used means imported by another file, checked to `depth` rounds.
    /// Only utility, middleware, API route and script files are candidates.
    #[default]
    Inbound,
    /// Used means reachable over file links from an entry file. Every
    /// scanned file is a candidate unless it matches a framework-protected
    /// pattern (pages, layouts, routes, tests, type declarations, ...).
    Reachability,
}

/// What counts as used besides an inbound import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsagePolicy {
    pub mode: UsageMode,
    pub entry_points: BTreeSet<String>,
    pub script_references: ScriptReferences,
    /// Reachability rounds: 1 is a single-hop check, `n` ignores edges from
    /// files found unused in earlier rounds for up to `n` rounds, 0 runs until
    /// nothing changes.
    pub depth: usize,
}

impl Default for UsagePolicy {
    fn default() -> Self {
        Self {
            mode: UsageMode::Inbound,
            entry_points: DEFAULT_ENTRY_POINTS.iter().map(|s| s.to_string()).collect(),
            script_references: ScriptReferences::default(),
            depth: 1,
        }
    }
}

impl UsagePolicy {
    pub fn with_entry_points<I, S>(mut self, entry_points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry_points = entry_points.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_script_references(mut self, refs: ScriptReferences) -> Self {
        self.script_references = refs;
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_mode(mut self, mode: UsageMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Unused files bucketed by role, each bucket sorted by relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnusedFiles {
    pub unused_utilities: Vec<FileRecord>,
    pub unused_middleware: Vec<FileRecord>,
    pub unused_api_routes: Vec<FileRecord>,
    pub orphaned_modules: Vec<FileRecord>,
    /// Files with no role-specific bucket (components, hooks, styles).
    /// Only filled in [`UsageMode::Reachability`].
    pub unreachable_files: Vec<FileRecord>,
}

impl UnusedFiles {
    pub fn total(&self) -> usize {
        self.unused_utilities.len()
            + self.unused_middleware.len()
            + self.unused_api_routes.len()
            + self.orphaned_modules.len()
            + self.unreachable_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total_size(&self) -> u64 {
        self.iter().map(|f| f.size).sum()
    }

    /// Keeps only the files `keep` accepts, visiting buckets in [`iter`](Self::iter) order.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&FileRecord) -> bool,
    {
        for bucket in [
            &mut self.unused_utilities,
            &mut self.unused_middleware,
            &mut self.unused_api_routes,
            &mut self.orphaned_modules,
            &mut self.unreachable_files,
        ] {
            bucket.retain(|f| keep(f));
        }
    }

    /// All buckets in a fixed order: utilities, middleware, API routes,
    /// modules, then unreachable files.
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.unused_utilities
            .iter()
            .chain(&self.unused_middleware)
            .chain(&self.unused_api_routes)
            .chain(&self.orphaned_modules)
            .chain(&self.unreachable_files)
    }
}

/// Classifies every unprotected file the policy's mode finds unused.
///
/// Always protected: entry points and `scripts/` files referenced from the
/// manifest's script table. In `Inbound` mode role `Other` is protected too
/// and imports a file makes of itself are ignored.
///
/// # Errors
/// Only if the script matcher cannot be built.
pub fn classify_unused(
    graph: &UsageGraph,
    policy: &UsagePolicy,
) -> Result<UnusedFiles, AnatomistError> {
    let files = graph.files();
    let scripted = policy
        .script_references
        .referenced(files.iter().filter(|f| f.is_module()))?;

    let dead = match policy.mode {
        UsageMode::Inbound => inbound_dead(graph, policy, &scripted),
        UsageMode::Reachability => unreachable(graph, policy, &scripted),
    };

    let mut ordered: Vec<&FileRecord> = dead.iter().map(|&i| &files[i]).collect();
    ordered.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    let mut unused = UnusedFiles::default();
    for file in ordered {
        let bucket = match file.role {
            FileRole::Utility => &mut unused.unused_utilities,
            FileRole::Middleware => &mut unused.unused_middleware,
            FileRole::ApiRoute => &mut unused.unused_api_routes,
            FileRole::Module => &mut unused.orphaned_modules,
            FileRole::Other => &mut unused.unreachable_files,
        };
        bucket.push(file.clone());
    }
    Ok(unused)
}

fn inbound_dead(
    graph: &UsageGraph,
    policy: &UsagePolicy,
    scripted: &HashSet<String>,
) -> HashSet<usize> {
    let files = graph.files();
    let candidates: Vec<usize> = (0..files.len())
        .filter(|&i| {
            let f = &files[i];
            f.role != FileRole::Other
                && !policy.entry_points.contains(&f.relative_path)
                && !scripted.contains(&f.relative_path)
        })
        .collect();

    let rounds = if policy.depth == 0 {
        usize::MAX
    } else {
        policy.depth
    };

    let mut dead: HashSet<usize> = HashSet::new();
    for round in 0..rounds {
        let next: HashSet<usize> = candidates
            .iter()
            .copied()
            .filter(|&i| {
                !graph
                    .importer_indices(i)
                    .any(|j| j != i && !dead.contains(&j))
            })
            .collect();
        if next == dead {
            break;
        }
        tracing::trace!(round, unused = next.len(), "inbound round");
        dead = next;
    }
    dead
}

/// Breadth-first walk over file links.
///
/// Roots: configured entry points, scripted modules, framework entry files,
/// and files under `src/app` that nothing links to. Unreached files that do
/// not match a protected pattern are dead.
fn unreachable(
    graph: &UsageGraph,
    policy: &UsagePolicy,
    scripted: &HashSet<String>,
) -> HashSet<usize> {
    let files = graph.files();
    let linked: HashSet<usize> = graph.file_links.iter().flatten().copied().collect();

    let mut queue: VecDeque<usize> = (0..files.len())
        .filter(|&i| {
            let rel = files[i].relative_path.as_str();
            policy.entry_points.contains(rel)
                || scripted.contains(rel)
                || is_framework_entry(rel)
                || (rel.starts_with("src/app/") && !linked.contains(&i))
        })
        .collect();
    tracing::trace!(roots = queue.len(), "reachability roots");

    let mut reached: HashSet<usize> = HashSet::new();
    while let Some(i) = queue.pop_front() {
        if !reached.insert(i) {
            continue;
        }
        queue.extend(graph.file_links[i].iter().filter(|j| !reached.contains(*j)));
    }

    (0..files.len())
        .filter(|i| !reached.contains(i) && !is_protected_file(&files[*i].relative_path))
        .collect()
}

/// Every workspace-relative file the records import, resolved through
/// `exists` rather than the scanned set.
///
/// This is what an agent publishes as "referenced" so agents scanning other
/// directories do not quarantine files it depends on.
pub fn referenced_paths<F>(
    records: &[FileRecord],
    resolver: &ImportResolver,
    exists: F,
) -> BTreeSet<String>
where
    F: Fn(&str) -> bool,
{
    records
        .iter()
        .flat_map(|file| {
            file.imports
                .iter()
                .filter_map(|import| resolver.resolve(&import.source, &file.relative_path, &exists))
        })
        .collect()
}

/// Next.js files the framework loads by convention.
pub fn is_framework_entry(relative_path: &str) -> bool {
    FRAMEWORK_ENTRY
        .get_or_init(|| {
            Regex::new(
                r"/(page|layout|loading|error|not-found|global-error|template)\.(tsx?|jsx?)$|/(route|middleware|instrumentation)\.(ts|js)$",
            )
            .expect("Invalid entry regex")
        })
        .is_match(relative_path)
}

/// Files never reported by the reachability walk.
pub fn is_protected_file(relative_path: &str) -> bool {
    is_framework_entry(relative_path)
        || PROTECTED_FILE
            .get_or_init(|| {
                Regex::new(
                    r"\.(test|spec|stories)\.(tsx?|jsx?)$|(^|/)__(tests|mocks)__/|\.d\.ts$|(middleware|instrumentation)\.(ts|js)$|(opengraph-image|apple-icon|icon)\.(tsx?|jsx?)$",
                )
                .expect("Invalid protection regex")
            })
            .is_match(relative_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Export, ExportKind, Import};
    use std::path::PathBuf;

    fn record(rel: &str, exports: &[&str], imports: Vec<Import>) -> FileRecord {
        FileRecord::new(
            PathBuf::from("/ws").join(rel),
            rel,
            100,
            exports
                .iter()
                .map(|n| Export::named(*n, ExportKind::Function))
                .collect(),
            imports,
        )
    }

    fn paths(bucket: &[FileRecord]) -> Vec<&str> {
        bucket.iter().map(|f| f.relative_path.as_str()).collect()
    }

    fn classify(records: &[FileRecord], policy: &UsagePolicy) -> UnusedFiles {
        let graph = UsageGraph::build(records, &ImportResolver::new());
        classify_unused(&graph, policy).unwrap()
    }

    #[test]
    fn test_relative_import_marks_used() {
        let records = vec![
            record("src/lib/a.ts", &["foo"], vec![]),
            record("src/lib/b.ts", &["bar"], vec![Import::named("foo", "./a")]),
        ];
        let graph = UsageGraph::build(&records, &ImportResolver::new());
        assert!(graph.has_edge("src/lib/b.ts", "src/lib/a.ts", "foo"));
        assert_eq!(graph.importers_of("src/lib/a.ts"), vec!["src/lib/b.ts"]);
        assert_eq!(graph.stats.resolved_count, 1);

        let unused = classify_unused(&graph, &UsagePolicy::default()).unwrap();
        assert_eq!(paths(&unused.unused_utilities), vec!["src/lib/b.ts"]);
    }

    #[test]
    fn test_helper_unused_used_referenced_by_route() {
        let records = vec![
            record("src/utils/helper.ts", &["helper"], vec![]),
            record("src/utils/used.ts", &["used"], vec![]),
            record(
                "src/app/api/x/route.ts",
                &["GET"],
                vec![Import::named("used", "../../../utils/used")],
            ),
        ];
        let unused = classify(&records, &UsagePolicy::default());
        assert_eq!(paths(&unused.unused_utilities), vec!["src/utils/helper.ts"]);
        assert_eq!(paths(&unused.unused_api_routes), vec!["src/app/api/x/route.ts"]);
        assert!(unused.iter().all(|f| f.relative_path != "src/utils/used.ts"));
    }

    #[test]
    fn test_classification_is_idempotent() {
        let records = vec![
            record("src/middleware/auth.ts", &["auth"], vec![]),
            record("scripts/seed.mjs", &[], vec![]),
            record("src/lib/a.ts", &["a"], vec![Import::named("auth", "../middleware/auth")]),
        ];
        let graph = UsageGraph::build(&records, &ImportResolver::new());
        let first = classify_unused(&graph, &UsagePolicy::default()).unwrap();
        let second = classify_unused(&graph, &UsagePolicy::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(paths(&first.orphaned_modules), vec!["scripts/seed.mjs"]);
        assert!(first.unused_middleware.is_empty());
    }

    #[test]
    fn test_unknown_export_name_is_not_an_edge() {
        let records = vec![
            record("src/lib/a.ts", &["foo"], vec![]),
            record("src/lib/b.ts", &[], vec![Import::named("nope", "./a")]),
        ];
        let graph = UsageGraph::build(&records, &ImportResolver::new());
        assert!(graph.edges_from("src/lib/b.ts").is_none());
        assert_eq!(graph.stats.unresolved_count(), 1);
    }

    #[test]
    fn test_default_import_matches_default_export() {
        let mut target = record("src/lib/store.ts", &[], vec![]);
        target
            .exports
            .push(Export::default_export("Store", ExportKind::Class));
        let records = vec![
            target,
            record("src/lib/b.ts", &[], vec![Import::default_import("MyStore", "./store")]),
        ];
        let graph = UsageGraph::build(&records, &ImportResolver::new());
        assert!(graph.has_edge("src/lib/b.ts", "src/lib/store.ts", "Store"));
        assert!(graph.exporter("src/lib/store.ts", "Store").is_some());
    }

    #[test]
    fn test_self_import_does_not_count() {
        let records = vec![record(
            "src/lib/loop.ts",
            &["me"],
            vec![Import::named("me", "./loop")],
        )];
        let unused = classify(&records, &UsagePolicy::default());
        assert_eq!(paths(&unused.unused_utilities), vec!["src/lib/loop.ts"]);
    }

    #[test]
    fn test_entry_points_and_other_role_are_protected() {
        let records = vec![
            record("src/lib/utils.ts", &["cn"], vec![]),
            record("src/components/button.ts", &["Button"], vec![]),
        ];
        let unused = classify(&records, &UsagePolicy::default());
        assert!(unused.is_empty());

        let unused = classify(
            &records,
            &UsagePolicy::default().with_entry_points(Vec::<String>::new()),
        );
        assert_eq!(paths(&unused.unused_utilities), vec!["src/lib/utils.ts"]);
    }

    #[test]
    fn test_script_reference_protects_module() {
        let records = vec![
            record("scripts/agents/backend-cleaner.js", &[], vec![]),
            record("scripts/old-migrate.js", &[], vec![]),
        ];
        let policy = UsagePolicy::default().with_script_references(
            ScriptReferences::from_commands(["node scripts/agents/backend-cleaner.js"]),
        );
        let unused = classify(&records, &policy);
        assert_eq!(paths(&unused.orphaned_modules), vec!["scripts/old-migrate.js"]);
    }

    #[test]
    fn test_depth_controls_cascade() {
        // c is imported only by b, b only by a, nothing imports a.
        let records = vec![
            record("src/lib/a.ts", &["a"], vec![Import::named("b", "./b")]),
            record("src/lib/b.ts", &["b"], vec![Import::named("c", "./c")]),
            record("src/lib/c.ts", &["c"], vec![]),
        ];

        let single = classify(&records, &UsagePolicy::default());
        assert_eq!(paths(&single.unused_utilities), vec!["src/lib/a.ts"]);

        let two = classify(&records, &UsagePolicy::default().with_depth(2));
        assert_eq!(
            paths(&two.unused_utilities),
            vec!["src/lib/a.ts", "src/lib/b.ts"]
        );

        let fixpoint = classify(&records, &UsagePolicy::default().with_depth(0));
        assert_eq!(fixpoint.total(), 3);
        assert_eq!(fixpoint.total_size(), 300);
    }

    #[test]
    fn test_alias_resolution_is_pluggable() {
        let records = vec![
            record("src/lib/db.ts", &["db"], vec![]),
            record("src/app/api/x/route.ts", &["GET"], vec![Import::named("db", "@/lib/db")]),
        ];

        let blind = UsageGraph::build(&records, &ImportResolver::new());
        let unused = classify_unused(&blind, &UsagePolicy::default()).unwrap();
        assert_eq!(paths(&unused.unused_utilities), vec!["src/lib/db.ts"]);

        let aliased = UsageGraph::build(&records, &ImportResolver::new().with_alias("@/", "src/"));
        let unused = classify_unused(&aliased, &UsagePolicy::default()).unwrap();
        assert!(unused.unused_utilities.is_empty());
    }

    #[test]
    fn test_reachability_walks_component_tree() {
        let records = vec![
            record(
                "src/app/dashboard/page.tsx",
                &["Page"],
                vec![
                    Import::named("Button", "../../components/Button"),
                    // Export name mismatch still links the files.
                    Import::named("Header", "../../components/Header"),
                ],
            ),
            record("src/components/Button.tsx", &["Button"], vec![Import::named("useAuth", "../hooks/use-auth")]),
            record("src/components/Header.tsx", &["SiteHeader"], vec![]),
            record("src/hooks/use-auth.ts", &["useAuth"], vec![]),
            record("src/components/Dead.tsx", &["Dead"], vec![Import::named("Button", "./Button")]),
            record("src/components/Dead.test.tsx", &[], vec![Import::named("Dead", "./Dead")]),
            record("src/types/env.d.ts", &[], vec![]),
        ];
        let graph = UsageGraph::build(&records, &ImportResolver::new());
        assert_eq!(
            graph.links_from("src/app/dashboard/page.tsx"),
            vec!["src/components/Button.tsx", "src/components/Header.tsx"]
        );

        let inbound = classify_unused(&graph, &UsagePolicy::default()).unwrap();
        assert!(inbound.is_empty());

        let policy = UsagePolicy::default().with_mode(UsageMode::Reachability);
        let unused = classify_unused(&graph, &policy).unwrap();
        assert_eq!(paths(&unused.unreachable_files), vec!["src/components/Dead.tsx"]);
        assert_eq!(unused.total(), 1);
    }

    #[test]
    fn test_unlinked_app_files_are_roots() {
        let records = vec![
            record("src/app/providers.tsx", &["Providers"], vec![Import::named("cn", "../lib/cn")]),
            record("src/lib/cn.ts", &["cn"], vec![]),
            record("src/lib/stale.ts", &["stale"], vec![]),
        ];
        let policy = UsagePolicy::default()
            .with_entry_points(Vec::<String>::new())
            .with_mode(UsageMode::Reachability);
        let unused = classify(&records, &policy);
        assert_eq!(paths(&unused.unused_utilities), vec!["src/lib/stale.ts"]);
        assert!(unused.unreachable_files.is_empty());
    }

    #[test]
    fn test_protected_patterns() {
        for path in [
            "src/app/page.tsx",
            "src/app/blog/[slug]/layout.jsx",
            "src/app/api/users/route.ts",
            "src/middleware.ts",
            "src/components/Card.stories.tsx",
            "src/hooks/__tests__/use-x.ts",
            "src/app/opengraph-image.tsx",
            "src/types/global.d.ts",
        ] {
            assert!(is_protected_file(path), "{path} should be protected");
        }
        for path in ["src/components/Card.tsx", "src/app/dashboard/widgets.tsx", "src/lib/page-utils.ts"] {
            assert!(!is_protected_file(path), "{path} should not be protected");
        }
    }

    #[test]
    fn test_referenced_paths_use_the_filesystem() {
        let records = vec![record(
            "src/components/Nav.tsx",
            &["Nav"],
            vec![
                Import::named("db", "@/lib/db"),
                Import::named("x", "./missing"),
                Import::named("React", "react"),
            ],
        )];
        let resolver = ImportResolver::new().with_alias("@/", "src/");
        let on_disk = ["src/lib/db.ts"];
        let referenced = referenced_paths(&records, &resolver, |p| on_disk.contains(&p));
        assert_eq!(referenced.into_iter().collect::<Vec<_>>(), vec!["src/lib/db.ts"]);
    }
}
