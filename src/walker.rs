//! Pattern expansion: files, directories and globs to a concrete file list

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use glob::MatchOptions;
use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::ignore_set::IgnoreSet;

/// Version-control metadata directories, never descended into
const VCS_DIRS: [&str; 5] = [".git", ".sl", ".svn", ".hg", ".jj"];

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// One resolved input location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedPath {
    /// Absolute, lexically normalized path
    pub path: PathBuf,
    /// Skip the "no parser could be inferred" warning (set for directory walks)
    pub ignore_unknown: bool,
    /// Resolution failure to report when this path is processed
    pub error: Option<String>,
}

impl ExpandedPath {
    fn file(path: PathBuf, ignore_unknown: bool) -> Self {
        Self {
            path,
            ignore_unknown,
            error: None,
        }
    }

    fn unmatched(path: PathBuf, message: String) -> Self {
        Self {
            path,
            ignore_unknown: false,
            error: Some(message),
        }
    }
}

/// Inputs to [`expand_patterns`]
#[derive(Debug, Clone, Copy)]
pub struct ExpandOptions<'a> {
    pub cwd: &'a Path,
    pub patterns: &'a [String],
    pub ignore_paths: &'a [PathBuf],
    pub with_node_modules: bool,
    pub no_error_on_unmatched_pattern: bool,
}

/// Expand patterns into a deduplicated, ignore-filtered, order-stable file list.
///
/// Patterns are handled in input order; directory contents come out in
/// lexical order. Explicit file patterns bypass ignore rules. A pattern that
/// matches nothing yields an entry carrying an error instead of failing here.
pub fn expand_patterns(opts: &ExpandOptions<'_>) -> Vec<ExpandedPath> {
    let ignores = Arc::new(IgnoreSet::new(
        opts.cwd,
        opts.ignore_paths,
        opts.with_node_modules,
    ));
    let mut out = Collector::default();

    for pattern in opts.patterns {
        let path = absolutize(opts.cwd, Path::new(pattern));

        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                out.push(ExpandedPath::file(path, false));
                continue;
            }
            Ok(meta) if meta.is_dir() => {
                // the walker never filters its own root
                if in_vcs_dir(opts.cwd, &path) {
                    debug!("skipping version-control directory {}", path.display());
                } else {
                    walk_dir(&path, &ignores, &mut out);
                }
                continue;
            }
            _ => {}
        }

        let matched = expand_glob(opts.cwd, pattern, &ignores, &mut out);
        match matched {
            Ok(0) if opts.no_error_on_unmatched_pattern => {
                debug!("pattern \"{pattern}\" matched no files");
            }
            Ok(0) => out.push(ExpandedPath::unmatched(
                path,
                format!("No files matching the pattern were found: \"{pattern}\"."),
            )),
            Ok(_) => {}
            Err(message) => out.push(ExpandedPath::unmatched(path, message)),
        }
    }

    out.paths
}

/// Keeps the first occurrence of every path
#[derive(Default)]
struct Collector {
    seen: HashSet<PathBuf>,
    paths: Vec<ExpandedPath>,
}

impl Collector {
    fn push(&mut self, expanded: ExpandedPath) {
        if self.seen.insert(expanded.path.clone()) {
            self.paths.push(expanded);
        }
    }
}

/// Walk `dir` recursively, returning how many files were found.
fn walk_dir(dir: &Path, ignores: &Arc<IgnoreSet>, out: &mut Collector) -> usize {
    let filter = Arc::clone(ignores);
    let walker = WalkBuilder::new(dir)
        .standard_filters(false)
        .follow_links(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if is_dir && is_vcs_dir_name(entry.file_name().to_str()) {
                return false;
            }
            !filter.is_ignored(entry.path(), is_dir)
        })
        .build();

    let mut found = 0;
    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_some_and(|ft| ft.is_file()) {
                    found += 1;
                    out.push(ExpandedPath::file(
                        absolutize(dir, entry.path()),
                        true,
                    ));
                }
            }
            Err(e) => warn!("{e}"),
        }
    }
    found
}

/// Expand `pattern` as a glob relative to `cwd`, returning how many files it contributed.
fn expand_glob(
    cwd: &Path,
    pattern: &str,
    ignores: &Arc<IgnoreSet>,
    out: &mut Collector,
) -> Result<usize, String> {
    let full_pattern = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        let base = glob::Pattern::escape(&cwd.to_string_lossy());
        format!("{}/{}", base.trim_end_matches('/'), pattern.trim_start_matches("./"))
    };

    let entries = glob::glob_with(&full_pattern, GLOB_OPTIONS)
        .map_err(|e| format!("Invalid pattern \"{pattern}\": {e}"))?;

    let mut found = 0;
    for entry in entries {
        let path = match entry {
            Ok(path) => absolutize(cwd, &path),
            Err(e) => {
                debug!("skipping unreadable glob match: {e}");
                continue;
            }
        };
        let Ok(meta) = fs::metadata(&path) else {
            continue;
        };
        if in_vcs_dir(cwd, &path) || ignores.is_ignored(&path, meta.is_dir()) {
            continue;
        }

        if meta.is_file() {
            found += 1;
            out.push(ExpandedPath::file(path, false));
        } else if meta.is_dir() {
            found += walk_dir(&path, ignores, out);
        }
    }
    Ok(found)
}

fn is_vcs_dir_name(name: Option<&str>) -> bool {
    name.is_some_and(|name| VCS_DIRS.contains(&name))
}

fn in_vcs_dir(cwd: &Path, path: &Path) -> bool {
    path.strip_prefix(cwd)
        .unwrap_or(path)
        .components()
        .any(|c| matches!(c, Component::Normal(name) if is_vcs_dir_name(name.to_str())))
}

/// Join `path` onto `base` and resolve `.` and `..` lexically.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in base.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
