//! Ignore-file matching for pattern expansion

use std::path::{Component, Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};

use crate::walker::absolutize;

/// Ignore file consulted at the working directory even when none is given.
pub const DEFAULT_IGNORE_FILE: &str = ".prettierignore";

const NODE_MODULES: &str = "node_modules";

/// A single compiled ignore file, rooted at the file's directory
#[derive(Debug)]
pub struct IgnoreMatcher {
    root: PathBuf,
    matcher: Gitignore,
}

impl IgnoreMatcher {
    /// Compile `ignore_file`, or `None` if it does not exist or cannot be parsed.
    pub fn from_file(ignore_file: &Path) -> Option<Self> {
        if !ignore_file.is_file() {
            debug!("no ignore file at {}", ignore_file.display());
            return None;
        }
        let root = ignore_file.parent().unwrap_or_else(|| Path::new("/"));

        let mut builder = GitignoreBuilder::new(root);
        if let Some(e) = builder.add(ignore_file) {
            warn!("Problem reading ignore file \"{}\": {e}", ignore_file.display());
        }
        match builder.build() {
            Ok(matcher) => Some(Self {
                root: root.to_path_buf(),
                matcher,
            }),
            Err(e) => {
                warn!("Unable to use ignore file \"{}\": {e}", ignore_file.display());
                None
            }
        }
    }

    /// Compile in-memory ignore lines rooted at `root`.
    pub fn from_lines<'a>(
        root: &Path,
        lines: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ignore::Error> {
        let mut builder = GitignoreBuilder::new(root);
        for line in lines {
            builder.add_line(None, line)?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            matcher: builder.build()?,
        })
    }

    /// Whether `path` or any of its parents is ignored. Paths outside the root never are.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        if path.strip_prefix(&self.root).is_err() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }
}

/// Every active ignore source for one run; read-only once built
#[derive(Debug)]
pub struct IgnoreSet {
    cwd: PathBuf,
    matchers: Vec<IgnoreMatcher>,
    with_node_modules: bool,
}

impl IgnoreSet {
    /// Collect the default ignore file in `cwd` plus every explicit one.
    pub fn new(cwd: &Path, ignore_paths: &[PathBuf], with_node_modules: bool) -> Self {
        let matchers = std::iter::once(cwd.join(DEFAULT_IGNORE_FILE))
            .chain(ignore_paths.iter().map(|p| absolutize(cwd, p)))
            .filter_map(|p| IgnoreMatcher::from_file(&p))
            .collect();

        Self::from_matchers(cwd, matchers, with_node_modules)
    }

    pub fn from_matchers(
        cwd: &Path,
        matchers: Vec<IgnoreMatcher>,
        with_node_modules: bool,
    ) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
            matchers,
            with_node_modules,
        }
    }

    /// A path is ignored if any source matches it.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        if !self.with_node_modules && self.in_node_modules(path) {
            return true;
        }
        self.matchers.iter().any(|m| m.is_ignored(path, is_dir))
    }

    fn in_node_modules(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.cwd).unwrap_or(path);
        relative
            .components()
            .any(|c| matches!(c, Component::Normal(name) if name == NODE_MODULES))
    }
}
