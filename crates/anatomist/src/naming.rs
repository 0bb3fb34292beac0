//! File and directory naming conventions.
//!
//! Components (`.tsx`, `.jsx`) are UpperCamelCase, other sources (`.ts`,
//! `.js`) are kebab-case, and the parent directory is lower kebab-case unless
//! it is `src`. Violations are reported, never acted on.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

static COMPONENT_FILE: OnceLock<Regex> = OnceLock::new();
static KEBAB_FILE: OnceLock<Regex> = OnceLock::new();
static KEBAB_DIR: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamingReport {
    pub is_valid: bool,
    pub violations: Vec<String>,
}

/// A file whose name breaks the convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamingViolation {
    pub relative_path: String,
    pub violations: Vec<String>,
}

/// Checks one workspace-relative path.
///
/// # Example
/// ```
/// use anatomist::naming::validate_naming_convention;
///
/// assert!(validate_naming_convention("src/lib/date-utils.ts").is_valid);
/// assert!(!validate_naming_convention("src/lib/dateUtils.ts").is_valid);
/// ```
pub fn validate_naming_convention(relative_path: &str) -> NamingReport {
    let (dir, file_name) = match relative_path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, relative_path),
    };
    let ext = file_name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");

    let mut violations = Vec::new();
    match ext {
        "tsx" | "jsx" => {
            if !component_file().is_match(file_name) {
                violations.push(format!(
                    "Component file should be UpperCamelCase: {}",
                    file_name
                ));
            }
        }
        "ts" | "js" => {
            if !kebab_file().is_match(file_name) {
                violations.push(format!("File should be kebab-case: {}", file_name));
            }
        }
        _ => {}
    }

    if let Some(dir) = dir {
        let dir_name = dir.rsplit('/').next().unwrap_or(dir);
        if dir_name != "src" && !kebab_dir().is_match(dir_name) {
            violations.push(format!("Directory should be lowercase: {}", dir_name));
        }
    }

    NamingReport {
        is_valid: violations.is_empty(),
        violations,
    }
}

/// Runs [`validate_naming_convention`] over many paths, keeping only failures.
pub fn naming_violations<'a, I>(relative_paths: I) -> Vec<NamingViolation>
where
    I: IntoIterator<Item = &'a str>,
{
    relative_paths
        .into_iter()
        .filter_map(|rel| {
            let report = validate_naming_convention(rel);
            (!report.is_valid).then(|| NamingViolation {
                relative_path: rel.to_string(),
                violations: report.violations,
            })
        })
        .collect()
}

fn component_file() -> &'static Regex {
    COMPONENT_FILE
        .get_or_init(|| Regex::new(r"^[A-Z][a-zA-Z0-9]*\.(tsx|jsx)$").expect("Invalid component regex"))
}

fn kebab_file() -> &'static Regex {
    KEBAB_FILE
        .get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*\.(ts|js)$").expect("Invalid file regex"))
}

fn kebab_dir() -> &'static Regex {
    KEBAB_DIR.get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("Invalid dir regex"))
}
