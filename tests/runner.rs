use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rprettier::{Engine, EngineError, EngineOutput, OutputSink, RunArgs, RunError, Runner};
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Re-indents brace blocks using `tabWidth`/`useTabs`; only knows `.js` and `.json`
struct BraceEngine;

fn reindent(input: &str, width: usize, use_tabs: bool) -> String {
    let unit = if use_tabs {
        "\t".to_string()
    } else {
        " ".repeat(width)
    };
    let mut depth = 0usize;
    let mut out = String::new();

    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            out.push('\n');
            continue;
        }
        if trimmed.starts_with('}') {
            depth = depth.saturating_sub(1);
        }
        out.push_str(&unit.repeat(depth));
        out.push_str(trimmed);
        out.push('\n');
        if trimmed.ends_with('{') {
            depth += 1;
        }
    }
    out
}

#[async_trait]
impl Engine for BraceEngine {
    fn identity(&self) -> String {
        "brace".into()
    }

    async fn format(&self, input: &[u8], config_json: &str) -> Result<EngineOutput, EngineError> {
        let config: Value = serde_json::from_str(config_json).unwrap();
        let filepath = config["filepath"].as_str().unwrap();
        if !(filepath.ends_with(".js") || filepath.ends_with(".json")) {
            return Ok(EngineOutput::NoParser);
        }
        let width = config["tabWidth"].as_u64().unwrap_or(2) as usize;
        let use_tabs = config["useTabs"].as_bool().unwrap_or(false);
        let text = String::from_utf8_lossy(input);
        Ok(EngineOutput::Formatted(
            reindent(&text, width, use_tabs).into_bytes(),
        ))
    }
}

const APP_JS: &str = "function main() {\nif (ready) {\nstart();\n}\n}\n";
const MATH_JS: &str = "export const add = (a, b) => {\n    return a + b;\n};\n";
const README: &str = "# Title\n\n  keep   as is\n";

fn input_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src/util")).unwrap();
    fs::write(dir.path().join("src/app.js"), APP_JS).unwrap();
    fs::write(dir.path().join("src/util/math.js"), MATH_JS).unwrap();
    fs::write(dir.path().join("README.md"), README).unwrap();
    dir
}

fn read_tree(root: &Path) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                files.insert(rel, fs::read_to_string(&path).unwrap());
            }
        }
    }
    files
}

fn write_args(dir: &TempDir, config: Option<PathBuf>) -> RunArgs {
    RunArgs {
        cwd: dir.path().to_path_buf(),
        patterns: vec![".".into()],
        config,
        write: true,
        ..Default::default()
    }
}

async fn run(args: &RunArgs) -> Result<rprettier::RunSummary, RunError> {
    Runner::new(Arc::new(BraceEngine))
        .with_output(OutputSink::buffer().0)
        .run(args, &CancellationToken::new())
        .await
}

// ===========================================
// Config formats
// ===========================================

#[tokio::test]
async fn test_config_formats_produce_identical_trees() {
    let configs = TempDir::new().unwrap();
    let json = configs.path().join(".prettierrc");
    let yaml = configs.path().join("prettierrc.yaml");
    let toml = configs.path().join("prettierrc.toml");
    fs::write(&json, r#"{"tabWidth": 4}"#).unwrap();
    fs::write(&yaml, "tabWidth: 4\n").unwrap();
    fs::write(&toml, "tabWidth = 4\n").unwrap();

    let default_tree = input_tree();
    run(&write_args(&default_tree, None)).await.unwrap();
    let default_out = read_tree(default_tree.path());

    let mut outputs = Vec::new();
    for config in [json, yaml, toml] {
        let tree = input_tree();
        run(&write_args(&tree, Some(config))).await.unwrap();
        outputs.push(read_tree(tree.path()));
    }

    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[1], outputs[2]);
    assert_eq!(
        outputs[0]["src/app.js"],
        "function main() {\n    if (ready) {\n        start();\n    }\n}\n"
    );

    assert_ne!(outputs[0], default_out);
    let strip = |tree: &BTreeMap<String, String>| -> Vec<String> {
        tree.values()
            .map(|s| s.chars().filter(|c| !c.is_whitespace()).collect())
            .collect()
    };
    assert_eq!(strip(&outputs[0]), strip(&default_out));
    assert_eq!(default_out["README.md"], README);
}

#[tokio::test]
async fn test_write_is_idempotent() {
    let tree = input_tree();
    run(&write_args(&tree, None)).await.unwrap();
    let first = read_tree(tree.path());
    run(&write_args(&tree, None)).await.unwrap();
    assert_eq!(read_tree(tree.path()), first);
}

// ===========================================
// Configuration precedence
// ===========================================

#[tokio::test]
async fn test_explicit_config_beats_discovered() {
    let tree = input_tree();
    fs::write(tree.path().join(".prettierrc.yaml"), "tabWidth: 8\n").unwrap();
    let explicit = TempDir::new().unwrap();
    let explicit_config = explicit.path().join("custom.toml");
    fs::write(&explicit_config, "tabWidth = 3\n").unwrap();

    let args = RunArgs {
        patterns: vec!["src/app.js".into()],
        ..write_args(&tree, Some(explicit_config))
    };
    run(&args).await.unwrap();

    let out = fs::read_to_string(tree.path().join("src/app.js")).unwrap();
    assert!(out.contains("\n   if (ready) {\n"));
}

#[tokio::test]
async fn test_discovered_config_used() {
    let tree = input_tree();
    fs::write(tree.path().join(".prettierrc.yaml"), "tabWidth: 8\n").unwrap();

    let args = RunArgs {
        patterns: vec!["src/app.js".into()],
        ..write_args(&tree, None)
    };
    run(&args).await.unwrap();

    let out = fs::read_to_string(tree.path().join("src/app.js")).unwrap();
    assert!(out.contains(&format!("\n{}if (ready) {{\n", " ".repeat(8))));
}

#[tokio::test]
async fn test_no_config_skips_discovery() {
    let tree = input_tree();
    fs::write(tree.path().join(".prettierrc"), r#"{"tabWidth": 8}"#).unwrap();

    let args = RunArgs {
        patterns: vec!["src/app.js".into()],
        no_config: true,
        ..write_args(&tree, None)
    };
    run(&args).await.unwrap();

    let out = fs::read_to_string(tree.path().join("src/app.js")).unwrap();
    assert!(out.contains("\n  if (ready) {\n"));
}

#[tokio::test]
async fn test_formatter_config_overrides_editorconfig() {
    let tree = input_tree();
    fs::write(
        tree.path().join(".editorconfig"),
        "root = true\n[*]\nindent_style = space\nindent_size = 6\n[*.json]\nindent_style = tab\n",
    )
    .unwrap();
    fs::write(tree.path().join("data.json"), "{\n\"a\": 1\n}\n").unwrap();
    fs::write(tree.path().join(".prettierrc"), r#"{"tabWidth": 4}"#).unwrap();

    let args = RunArgs {
        patterns: vec!["src/app.js".into(), "data.json".into()],
        ..write_args(&tree, None)
    };
    run(&args).await.unwrap();

    let app = fs::read_to_string(tree.path().join("src/app.js")).unwrap();
    assert!(app.contains("\n    if (ready) {\n"));
    // useTabs only comes from editorconfig
    let data = fs::read_to_string(tree.path().join("data.json")).unwrap();
    assert_eq!(data, "{\n\t\"a\": 1\n}\n");
}

#[tokio::test]
async fn test_editorconfig_disabled() {
    let tree = input_tree();
    fs::write(
        tree.path().join(".editorconfig"),
        "root = true\n[*]\nindent_size = 6\n",
    )
    .unwrap();

    let args = RunArgs {
        patterns: vec!["src/app.js".into()],
        no_editorconfig: true,
        ..write_args(&tree, None)
    };
    run(&args).await.unwrap();

    let out = fs::read_to_string(tree.path().join("src/app.js")).unwrap();
    assert!(out.contains("\n  if (ready) {\n"));
}

#[tokio::test]
async fn test_overrides_per_file() {
    let tree = input_tree();
    fs::write(
        tree.path().join(".prettierrc.yaml"),
        "tabWidth: 2\noverrides:\n  - files: \"src/util/**\"\n    options:\n      tabWidth: 5\n",
    )
    .unwrap();

    run(&write_args(&tree, None)).await.unwrap();

    let math = fs::read_to_string(tree.path().join("src/util/math.js")).unwrap();
    assert_eq!(
        math,
        format!(
            "export const add = (a, b) => {{\n{}return a + b;\n}};\n",
            " ".repeat(5)
        )
    );
    let app = fs::read_to_string(tree.path().join("src/app.js")).unwrap();
    assert!(app.contains("\n  if (ready) {\n"));
}

// ===========================================
// Concurrency
// ===========================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_files_formatted_concurrently() {
    let dir = TempDir::new().unwrap();
    for i in 0..64 {
        fs::write(dir.path().join(format!("f{i:02}.js")), APP_JS).unwrap();
    }
    fs::write(dir.path().join(".prettierrc"), r#"{"tabWidth": 4}"#).unwrap();

    let summary = run(&write_args(&dir, None)).await.unwrap();

    // 64 sources plus the .prettierrc, which has no parser
    assert_eq!(summary.formatted, 64);
    assert_eq!(summary.no_parser, 1);
    for i in 0..64 {
        let out = fs::read_to_string(dir.path().join(format!("f{i:02}.js"))).unwrap();
        assert!(out.contains("\n    if (ready) {\n"), "f{i:02}.js");
    }
}

#[tokio::test]
async fn test_check_mode_reports_only_misformatted() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("good.js"), reindent(APP_JS, 2, false)).unwrap();
    fs::write(dir.path().join("bad.js"), APP_JS).unwrap();

    let args = RunArgs {
        cwd: dir.path().to_path_buf(),
        patterns: vec!["*.js".into()],
        check: true,
        ..Default::default()
    };
    let err = run(&args).await.unwrap_err();

    assert!(matches!(err, RunError::CheckFailed { count: 1 }));
    assert_eq!(fs::read_to_string(dir.path().join("bad.js")).unwrap(), APP_JS);
}
