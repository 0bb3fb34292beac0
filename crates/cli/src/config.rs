//! Agent configuration: built-in profiles, an optional TOML file, CLI overrides.
//!
//! ```toml
//! [agents.backend]
//! scope = ["src/lib", "src/utils"]
//! depth = 2
//!
//! [agents.backend.aliases]
//! "@/" = "src/"
//!
//! [agents.docs]
//! scope = ["docs/snippets"]
//! mode = "reachability"
//! grace_period_days = 0
//! ```
//!
//! Fields left out of the file keep the profile's value.

use anatomist::UsageMode;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Looked up in the workspace root when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "cleanup-agents.toml";

const BACKEND_SCOPE: &[&str] = &["src/lib", "src/middleware", "src/utils", "scripts"];
const FRONTEND_SCOPE: &[&str] = &["src/app", "src/components", "src/hooks", "src/styles"];
const BACKEND_EXTENSIONS: &[&str] = &["ts", "js", "mjs"];
const FRONTEND_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs"];
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Agents `run --agent all` runs when the config file declares no others.
pub const BUILTIN_AGENTS: &[&str] = &["frontend", "backend"];

/// Names with a meaning of their own on the command line or in the usage map.
pub const RESERVED_AGENT_NAMES: &[&str] = &["all", crate::coordinator::COORDINATOR_NAME];

/// Everything one agent run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub agent: String,
    pub scope: Vec<String>,
    pub extensions: Vec<String>,
    pub entry_points: Vec<String>,
    /// Import alias prefixes, e.g. `@/` → `src/`.
    pub aliases: BTreeMap<String, String>,
    /// Manifest whose `scripts` table shields `scripts/` files, relative to the root.
    pub manifest: String,
    pub preserve_structure: bool,
    pub dry_run: bool,
    pub depth: usize,
    pub mode: UsageMode,
    pub lock_timeout: Duration,
    pub check_naming: bool,
    /// Keep candidates whose path shows up in a project-wide text search.
    pub verify_search: bool,
    /// Keep candidates modified more recently than this. Zero disables.
    pub grace_period: Duration,
    pub check_critical_names: bool,
}

impl AgentConfig {
    /// Built-in profile for `agent`. Unknown agents start with an empty scope.
    ///
    /// The frontend profile walks component trees from Next.js entry files and
    /// resolves `@/` to `src/`; everything else uses the inbound check.
    pub fn profile(agent: &str) -> Self {
        let (scope, extensions): (&[&str], &[&str]) = match agent {
            "backend" => (BACKEND_SCOPE, BACKEND_EXTENSIONS),
            "frontend" => (FRONTEND_SCOPE, FRONTEND_EXTENSIONS),
            _ => (&[], BACKEND_EXTENSIONS),
        };
        let (mode, aliases) = match agent {
            "frontend" => (
                UsageMode::Reachability,
                BTreeMap::from([("@/".to_string(), "src/".to_string())]),
            ),
            _ => (UsageMode::Inbound, BTreeMap::new()),
        };
        Self {
            agent: agent.to_string(),
            scope: to_strings(scope),
            extensions: to_strings(extensions),
            entry_points: to_strings(anatomist::graph::DEFAULT_ENTRY_POINTS),
            aliases,
            manifest: "package.json".to_string(),
            preserve_structure: true,
            dry_run: false,
            depth: 1,
            mode,
            lock_timeout: reaper::DEFAULT_LOCK_TIMEOUT,
            check_naming: true,
            verify_search: true,
            grace_period: anatomist::safety::DEFAULT_GRACE_PERIOD,
            check_critical_names: true,
        }
    }

    /// Agents declared under `[agents.*]` in the config file, built-ins first.
    pub fn declared_agents(root: &Path, explicit: Option<&Path>) -> Result<Vec<String>> {
        let mut agents = to_strings(BUILTIN_AGENTS);
        if let Some(file) = read_config_file(root, explicit)? {
            agents.extend(file.agents.into_keys().filter(|name| !BUILTIN_AGENTS.contains(&name.as_str())));
        }
        Ok(agents)
    }

    /// Profile for `agent` with the matching `[agents.<name>]` table applied.
    ///
    /// With `explicit` unset, `<root>/cleanup-agents.toml` is used if present.
    pub fn load(agent: &str, root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::profile(agent);
        if let Some(file) = read_config_file(root, explicit)? {
            if let Some(overrides) = file.agents.get(agent) {
                config.apply(overrides);
                tracing::debug!(agent, "applied config overrides");
            }
        }
        Ok(config)
    }

    /// Rejects configurations no run could do anything useful with.
    ///
    /// The agent name becomes a usage map key and a quarantine directory, so
    /// it must be a single path segment that no other part of the map uses.
    pub fn validate(&self) -> Result<()> {
        let name = self.agent.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            bail!("invalid agent name {:?}", name);
        }
        if RESERVED_AGENT_NAMES.contains(&name) || reaper::usage_map::RESERVED_KEYS.contains(&name) {
            bail!("agent name {:?} is reserved", name);
        }
        if self.scope.is_empty() {
            bail!("agent {:?} has no scope directories configured", self.agent);
        }
        if self.extensions.is_empty() {
            bail!("agent {:?} has no file extensions configured", self.agent);
        }
        Ok(())
    }

    fn apply(&mut self, o: &AgentOverrides) {
        if let Some(v) = &o.scope {
            self.scope = v.clone();
        }
        if let Some(v) = &o.extensions {
            self.extensions = v.clone();
        }
        if let Some(v) = &o.entry_points {
            self.entry_points = v.clone();
        }
        if let Some(v) = &o.aliases {
            self.aliases = v.clone();
        }
        if let Some(v) = &o.manifest {
            self.manifest = v.clone();
        }
        if let Some(v) = o.preserve_structure {
            self.preserve_structure = v;
        }
        if let Some(v) = o.dry_run {
            self.dry_run = v;
        }
        if let Some(v) = o.depth {
            self.depth = v;
        }
        if let Some(v) = o.mode {
            self.mode = v;
        }
        if let Some(v) = o.lock_timeout_ms {
            self.lock_timeout = Duration::from_millis(v);
        }
        if let Some(v) = o.check_naming {
            self.check_naming = v;
        }
        if let Some(v) = o.verify_search {
            self.verify_search = v;
        }
        if let Some(v) = o.grace_period_days {
            self.grace_period = DAY * v;
        }
        if let Some(v) = o.check_critical_names {
            self.check_critical_names = v;
        }
    }
}

/// Explicit path, else `<root>/cleanup-agents.toml` when it exists.
fn read_config_file(root: &Path, explicit: Option<&Path>) -> Result<Option<ConfigFile>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = root.join(DEFAULT_CONFIG_FILE);
            if !candidate.is_file() {
                return Ok(None);
            }
            candidate
        }
    };

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let file: ConfigFile = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    tracing::debug!(path = %path.display(), agents = file.agents.len(), "config file loaded");
    Ok(Some(file))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    agents: BTreeMap<String, AgentOverrides>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentOverrides {
    scope: Option<Vec<String>>,
    extensions: Option<Vec<String>>,
    entry_points: Option<Vec<String>>,
    aliases: Option<BTreeMap<String, String>>,
    manifest: Option<String>,
    preserve_structure: Option<bool>,
    dry_run: Option<bool>,
    depth: Option<usize>,
    mode: Option<UsageMode>,
    lock_timeout_ms: Option<u64>,
    check_naming: Option<bool>,
    verify_search: Option<bool>,
    grace_period_days: Option<u32>,
    check_critical_names: Option<bool>,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_builtin_profiles() {
        let backend = AgentConfig::profile("backend");
        assert_eq!(
            backend.scope,
            vec!["src/lib", "src/middleware", "src/utils", "scripts"]
        );
        assert_eq!(backend.extensions, vec!["ts", "js", "mjs"]);
        assert!(!backend.dry_run);
        assert_eq!(backend.depth, 1);
        assert_eq!(backend.lock_timeout, Duration::from_secs(30));

        assert_eq!(backend.mode, UsageMode::Inbound);
        assert!(backend.aliases.is_empty());
        assert_eq!(backend.grace_period, Duration::from_secs(7 * 24 * 60 * 60));
        assert!(backend.verify_search && backend.check_critical_names);

        let frontend = AgentConfig::profile("frontend");
        assert!(frontend.extensions.contains(&"tsx".to_string()));
        assert_eq!(frontend.scope[0], "src/app");
        assert_eq!(frontend.mode, UsageMode::Reachability);
        assert_eq!(frontend.aliases.get("@/").map(String::as_str), Some("src/"));

        assert!(AgentConfig::profile("docs").validate().is_err());
    }

    #[test]
    fn test_missing_default_file_keeps_profile() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::load("backend", dir.path(), None).unwrap();
        assert_eq!(config, AgentConfig::profile("backend"));
    }

    #[test]
    fn test_file_overrides_only_named_agent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            r#"
[agents.backend]
scope = ["src/lib"]
depth = 0
lock_timeout_ms = 500

[agents.backend.aliases]
"@/" = "src/"

[agents.docs]
scope = ["docs"]
mode = "reachability"
grace_period_days = 0
verify_search = false
"#,
        )
        .unwrap();

        let backend = AgentConfig::load("backend", dir.path(), None).unwrap();
        assert_eq!(backend.scope, vec!["src/lib"]);
        assert_eq!(backend.depth, 0);
        assert_eq!(backend.lock_timeout, Duration::from_millis(500));
        assert_eq!(backend.aliases.get("@/").map(String::as_str), Some("src/"));
        assert_eq!(backend.extensions, vec!["ts", "js", "mjs"]);

        let docs = AgentConfig::load("docs", dir.path(), None).unwrap();
        assert!(docs.validate().is_ok());
        assert_eq!(docs.mode, UsageMode::Reachability);
        assert_eq!(docs.grace_period, Duration::ZERO);
        assert!(!docs.verify_search);

        assert_eq!(
            AgentConfig::declared_agents(dir.path(), None).unwrap(),
            vec!["frontend", "backend", "docs"]
        );

        let frontend = AgentConfig::load("frontend", dir.path(), None).unwrap();
        assert_eq!(frontend, AgentConfig::profile("frontend"));
    }

    #[test]
    fn test_explicit_file_must_exist_and_parse() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AgentConfig::load("backend", dir.path(), Some(dir.path().join("nope.toml").as_path())).is_err());

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[agents.backend]\nscop = []\n").unwrap();
        assert!(AgentConfig::load("backend", dir.path(), Some(bad.as_path())).is_err());
    }

    #[test]
    fn test_reserved_and_malformed_names_rejected() {
        for name in ["lastUpdated", "crossReferences", "all", "coordinator", "", "..", "a/b", "a\\b"] {
            let mut config = AgentConfig::profile("backend");
            config.agent = name.to_string();
            assert!(config.validate().is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_declared_agents_without_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            AgentConfig::declared_agents(dir.path(), None).unwrap(),
            vec!["frontend", "backend"]
        );
    }
}
