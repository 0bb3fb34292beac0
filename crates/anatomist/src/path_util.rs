//! Path normalization utilities for cross-platform file handling.
//!
//! Graph keys are workspace-relative strings with forward slashes; everything
//! in here converts between those and real filesystem paths.

use std::path::Path;

/// Returns `path` relative to `root` as a forward-slash string.
///
/// `None` when `path` is not under `root` or is not valid UTF-8.
///
/// # Example
/// ```
/// use std::path::Path;
/// use anatomist::path_util::relative_slash_path;
///
/// let rel = relative_slash_path(Path::new("/ws"), Path::new("/ws/src/lib/a.ts"));
/// assert_eq!(rel.as_deref(), Some("src/lib/a.ts"));
/// assert!(relative_slash_path(Path::new("/ws"), Path::new("/other/a.ts")).is_none());
/// ```
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let s = rel.to_str()?;
    Some(s.replace('\\', "/"))
}

/// Directory part of a relative path (`""` for top-level files).
pub fn parent_dir(relative_path: &str) -> &str {
    match relative_path.rfind('/') {
        Some(idx) => &relative_path[..idx],
        None => "",
    }
}

/// Lexically joins `specifier` onto `base_dir`, folding `.` and `..` segments.
///
/// No filesystem access and no symlink resolution. Returns `None` if the
/// result would climb above the workspace root.
///
/// # Example
/// ```
/// use anatomist::path_util::join_lexical;
///
/// assert_eq!(join_lexical("src/lib", "./a").as_deref(), Some("src/lib/a"));
/// assert_eq!(join_lexical("src/lib", "../utils/b").as_deref(), Some("src/utils/b"));
/// assert_eq!(join_lexical("", "../escape"), None);
/// ```
pub fn join_lexical(base_dir: &str, specifier: &str) -> Option<String> {
    let mut parts: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in specifier.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}
