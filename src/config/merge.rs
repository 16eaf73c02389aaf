//! Configuration merging logic
//!
//! Priority per file: `filepath` > matching overrides > formatter config > editorconfig

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::document::{overlay, ConfigDocument, FILEPATH_KEY};
use super::editorconfig::EditorConfig;

const OVERRIDES_KEY: &str = "overrides";

/// Merge the three configuration tiers into a fresh document for one file.
///
/// Neither input is modified.
pub fn merge_config(
    editorconfig: Option<&ConfigDocument>,
    config: &ConfigDocument,
    path: &Path,
) -> ConfigDocument {
    let mut merged = editorconfig.cloned().unwrap_or_default();
    overlay(&mut merged, config);
    merged.insert(
        FILEPATH_KEY.into(),
        Value::String(path.to_string_lossy().into_owned()),
    );
    merged
}

/// One entry of the config's `overrides` list
#[derive(Debug)]
struct Override {
    files: GlobSet,
    exclude: GlobSet,
    options: ConfigDocument,
}

/// Everything resolved once per run that per-file merges read from
#[derive(Debug, Default)]
pub struct ResolvedConfig {
    editorconfig: Option<EditorConfig>,
    base: ConfigDocument,
    overrides: Vec<Override>,
    /// Directory override globs are relative to
    config_dir: PathBuf,
}

impl ResolvedConfig {
    /// Split `document` into its base options and compiled `overrides`.
    pub fn new(
        editorconfig: Option<EditorConfig>,
        mut document: ConfigDocument,
        config_dir: &Path,
    ) -> Self {
        let overrides = match document.remove(OVERRIDES_KEY) {
            Some(Value::Array(entries)) => entries.iter().filter_map(parse_override).collect(),
            Some(other) => {
                warn!("Ignoring invalid \"overrides\" value: {other}");
                Vec::new()
            }
            None => Vec::new(),
        };

        Self {
            editorconfig,
            base: document,
            overrides,
            config_dir: config_dir.to_path_buf(),
        }
    }

    pub fn base(&self) -> &ConfigDocument {
        &self.base
    }

    /// Effective configuration for `path`.
    pub fn for_file(&self, path: &Path) -> ConfigDocument {
        let editorconfig = self
            .editorconfig
            .as_ref()
            .and_then(|e| e.definition_for(path))
            .map(|def| def.to_document());

        if self.overrides.is_empty() {
            return merge_config(editorconfig.as_ref(), &self.base, path);
        }

        let mut config = self.base.clone();
        if let Ok(relative) = path.strip_prefix(&self.config_dir) {
            for entry in &self.overrides {
                if entry.files.is_match(relative) && !entry.exclude.is_match(relative) {
                    overlay(&mut config, &entry.options);
                }
            }
        }
        merge_config(editorconfig.as_ref(), &config, path)
    }
}

/// Raw shape of one `overrides` entry
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverrideEntry {
    files: Globs,
    #[serde(default)]
    exclude_files: Option<Globs>,
    #[serde(default)]
    options: ConfigDocument,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Globs {
    One(String),
    Many(Vec<String>),
}

impl Globs {
    fn patterns(&self) -> &[String] {
        match self {
            Globs::One(pattern) => std::slice::from_ref(pattern),
            Globs::Many(patterns) => patterns,
        }
    }
}

fn parse_override(entry: &Value) -> Option<Override> {
    let raw = match OverrideEntry::deserialize(entry) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Ignoring invalid override {entry}: {e}");
            return None;
        }
    };

    let exclude = match &raw.exclude_files {
        Some(globs) => glob_set(globs.patterns()),
        None => Ok(GlobSet::empty()),
    };
    match (glob_set(raw.files.patterns()), exclude) {
        (Ok(files), Ok(exclude)) => Some(Override {
            files,
            exclude,
            options: raw.options,
        }),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Ignoring override with invalid glob: {e}");
            None
        }
    }
}

/// Build a set from override globs.
///
/// Globs without a `/` match the file name at any depth.
fn glob_set(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.trim_start_matches("./");
        let pattern = if pattern.contains('/') {
            pattern.to_string()
        } else {
            format!("**/{pattern}")
        };
        builder.add(GlobBuilder::new(&pattern).literal_separator(true).build()?);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::document::decode_document;
    use serde_json::json;

    fn doc(json: &str) -> ConfigDocument {
        decode_document(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_merge_defaults_only() {
        let merged = merge_config(None, &ConfigDocument::new(), Path::new("/p/a.js"));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get("filepath"), Some(&json!("/p/a.js")));
    }

    #[test]
    fn test_config_overrides_editorconfig() {
        let editorconfig = doc(r#"{"tabWidth": 8, "useTabs": true}"#);
        let config = doc(r#"{"tabWidth": 4}"#);

        let merged = merge_config(Some(&editorconfig), &config, Path::new("/p/a.js"));

        assert_eq!(merged.get("tabWidth"), Some(&json!(4)));
        assert_eq!(merged.get("useTabs"), Some(&json!(true)));
    }

    #[test]
    fn test_filepath_always_wins() {
        let config = doc(r#"{"filepath": "/somewhere/else.ts"}"#);
        let merged = merge_config(None, &config, Path::new("/p/a.js"));
        assert_eq!(merged.get("filepath"), Some(&json!("/p/a.js")));
    }

    #[test]
    fn test_merge_leaves_inputs_untouched() {
        let editorconfig = doc(r#"{"useTabs": true}"#);
        let config = doc(r#"{"semi": false}"#);

        let first = merge_config(Some(&editorconfig), &config, Path::new("/p/a.js"));
        let second = merge_config(Some(&editorconfig), &config, Path::new("/p/b.js"));

        assert_eq!(config, doc(r#"{"semi": false}"#));
        assert_eq!(editorconfig, doc(r#"{"useTabs": true}"#));
        assert_eq!(first.get("filepath"), Some(&json!("/p/a.js")));
        assert_eq!(second.get("filepath"), Some(&json!("/p/b.js")));
    }

    #[test]
    fn test_resolved_config_applies_editorconfig() {
        let editorconfig = EditorConfig::from_str_in("[*.md]\nindent_size = 3\n", Path::new("/p"));
        let resolved = ResolvedConfig::new(
            Some(editorconfig),
            doc(r#"{"semi": false}"#),
            Path::new("/p"),
        );

        let md = resolved.for_file(Path::new("/p/docs/README.md"));
        assert_eq!(md.get("tabWidth"), Some(&json!(3)));
        assert_eq!(md.get("semi"), Some(&json!(false)));

        let js = resolved.for_file(Path::new("/p/index.js"));
        assert_eq!(js.get("tabWidth"), None);
    }

    #[test]
    fn test_overrides_applied_in_order() {
        let document = doc(
            r#"{
                "tabWidth": 2,
                "overrides": [
                    {"files": "*.test.js", "options": {"semi": false, "tabWidth": 4}},
                    {
                        "files": ["legacy/**/*.js"],
                        "excludeFiles": "legacy/keep/*.js",
                        "options": {"tabWidth": 8}
                    }
                ]
            }"#,
        );
        let resolved = ResolvedConfig::new(None, document, Path::new("/p"));

        assert!(resolved.base().get("overrides").is_none());

        let test = resolved.for_file(Path::new("/p/src/a.test.js"));
        assert_eq!(test.get("tabWidth"), Some(&json!(4)));
        assert_eq!(test.get("semi"), Some(&json!(false)));

        let legacy = resolved.for_file(Path::new("/p/legacy/x/old.js"));
        assert_eq!(legacy.get("tabWidth"), Some(&json!(8)));

        let kept = resolved.for_file(Path::new("/p/legacy/keep/old.js"));
        assert_eq!(kept.get("tabWidth"), Some(&json!(2)));

        let plain = resolved.for_file(Path::new("/p/src/a.js"));
        assert_eq!(plain.get("tabWidth"), Some(&json!(2)));
        assert!(plain.get("overrides").is_none());
    }

    #[test]
    fn test_invalid_override_skipped() {
        let document = doc(
            r#"{"overrides": [{"options": {"semi": false}}, {"files": "*.js", "options": 3}]}"#,
        );
        let resolved = ResolvedConfig::new(None, document, Path::new("/p"));
        let merged = resolved.for_file(Path::new("/p/a.js"));
        assert_eq!(merged.get("semi"), None);
    }
}
