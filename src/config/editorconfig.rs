//! `.editorconfig` resolution
//!
//! The chain of `.editorconfig` files above a start directory is parsed once
//! per run. Per-file lookups then apply every matching section, outermost
//! file first and later sections over earlier ones, the way editors do.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use serde_json::Value;
use tracing::debug;

use super::document::ConfigDocument;

pub const EDITORCONFIG_NAME: &str = ".editorconfig";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentStyle {
    Tab,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentSize {
    Columns(u32),
    /// `indent_size = tab`: defer to `tab_width`
    Tab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfLine {
    Lf,
    Crlf,
    Cr,
}

impl EndOfLine {
    pub fn as_str(self) -> &'static str {
        match self {
            EndOfLine::Lf => "lf",
            EndOfLine::Crlf => "crlf",
            EndOfLine::Cr => "cr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteType {
    Single,
    Double,
}

/// Settings resolved for one file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EditorConfigDefinition {
    pub indent_style: Option<IndentStyle>,
    pub indent_size: Option<IndentSize>,
    pub tab_width: Option<u32>,
    pub end_of_line: Option<EndOfLine>,
    pub insert_final_newline: Option<bool>,
    pub max_line_length: Option<u32>,
    pub quote_type: Option<QuoteType>,
}

impl EditorConfigDefinition {
    fn from_properties(props: &HashMap<String, String>) -> Self {
        let get = |key: &str| props.get(key).map(String::as_str);

        Self {
            indent_style: match get("indent_style") {
                Some("tab") => Some(IndentStyle::Tab),
                Some("space") => Some(IndentStyle::Space),
                _ => None,
            },
            indent_size: match get("indent_size") {
                Some("tab") => Some(IndentSize::Tab),
                Some(v) => v.parse().ok().map(IndentSize::Columns),
                None => None,
            },
            tab_width: get("tab_width").and_then(|v| v.parse().ok()),
            end_of_line: match get("end_of_line") {
                Some("lf") => Some(EndOfLine::Lf),
                Some("crlf") => Some(EndOfLine::Crlf),
                Some("cr") => Some(EndOfLine::Cr),
                _ => None,
            },
            insert_final_newline: match get("insert_final_newline") {
                Some("true") => Some(true),
                Some("false") => Some(false),
                _ => None,
            },
            // "off" and other non-numeric values parse to None
            max_line_length: get("max_line_length").and_then(|v| v.parse().ok()),
            quote_type: match get("quote_type") {
                Some("single") => Some(QuoteType::Single),
                Some("double") => Some(QuoteType::Double),
                _ => None,
            },
        }
    }

    /// Map onto the engine's option names.
    ///
    /// `insert_final_newline` has no engine counterpart and is not emitted.
    pub fn to_document(&self) -> ConfigDocument {
        let mut doc = ConfigDocument::new();

        let use_tabs = match (self.indent_style, self.indent_size) {
            (Some(IndentStyle::Tab), _) | (None, Some(IndentSize::Tab)) => Some(true),
            (Some(IndentStyle::Space), _) => Some(false),
            _ => None,
        };
        if let Some(use_tabs) = use_tabs {
            doc.insert("useTabs".into(), Value::Bool(use_tabs));
        }

        let tab_width = match (use_tabs, self.indent_size, self.tab_width) {
            (Some(true), _, Some(width)) => Some(width),
            (_, Some(IndentSize::Columns(size)), _) => Some(size),
            (_, _, width) => width,
        };
        if let Some(width) = tab_width {
            doc.insert("tabWidth".into(), Value::from(width));
        }

        if let Some(width) = self.max_line_length {
            doc.insert("printWidth".into(), Value::from(width));
        }
        if let Some(eol) = self.end_of_line {
            doc.insert("endOfLine".into(), Value::from(eol.as_str()));
        }
        if let Some(quote) = self.quote_type {
            doc.insert(
                "singleQuote".into(),
                Value::Bool(quote == QuoteType::Single),
            );
        }

        doc
    }
}

#[derive(Debug)]
struct Section {
    matcher: GlobMatcher,
    properties: Vec<(String, String)>,
}

#[derive(Debug)]
struct EditorConfigFile {
    dir: PathBuf,
    root: bool,
    sections: Vec<Section>,
}

/// Parsed chain of `.editorconfig` files, outermost first
#[derive(Debug)]
pub struct EditorConfig {
    files: Vec<EditorConfigFile>,
}

/// Find the nearest `.editorconfig` by searching upward from the given directory.
pub fn find_editorconfig(start_dir: &Path) -> Option<PathBuf> {
    super::file::find_file_upward(start_dir, &[EDITORCONFIG_NAME])
}

impl EditorConfig {
    /// Resolve the `.editorconfig` chain above `start_dir`.
    ///
    /// Stops at the first file declaring `root = true`. Files that cannot be
    /// read are skipped; `None` means no file contributed.
    pub fn resolve(start_dir: &Path) -> Option<Self> {
        let mut files = Vec::new();
        let mut search_from = Some(start_dir.to_path_buf());

        while let Some(dir) = search_from {
            let Some(path) = find_editorconfig(&dir) else {
                break;
            };
            let file_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

            match fs::read_to_string(&path) {
                Ok(content) => {
                    let file = parse_editorconfig(&content, &file_dir);
                    let root = file.root;
                    files.push(file);
                    if root {
                        break;
                    }
                }
                Err(e) => debug!("skipping unreadable {}: {e}", path.display()),
            }

            search_from = file_dir.parent().map(Path::to_path_buf);
        }

        if files.is_empty() {
            return None;
        }
        files.reverse();
        Some(Self { files })
    }

    /// Parse a single file's content as if it were located in `dir`.
    pub fn from_str_in(content: &str, dir: &Path) -> Self {
        Self {
            files: vec![parse_editorconfig(content, dir)],
        }
    }

    /// Load a single `.editorconfig` file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(Self::from_str_in(&content, dir))
    }

    /// Settings for `path`, or `None` if no section applies to it.
    pub fn definition_for(&self, path: &Path) -> Option<EditorConfigDefinition> {
        let mut props: HashMap<String, String> = HashMap::new();
        let mut matched = false;

        for file in &self.files {
            let Ok(relative) = path.strip_prefix(&file.dir) else {
                continue;
            };
            for section in &file.sections {
                if !section.matcher.is_match(relative) {
                    continue;
                }
                matched = true;
                for (key, value) in &section.properties {
                    if value == "unset" {
                        props.remove(key);
                    } else {
                        props.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        matched.then(|| EditorConfigDefinition::from_properties(&props))
    }
}

fn parse_editorconfig(content: &str, dir: &Path) -> EditorConfigFile {
    let mut file = EditorConfigFile {
        dir: dir.to_path_buf(),
        root: false,
        sections: Vec::new(),
    };
    // Properties after an invalid section header are dropped
    let mut current: Option<Section> = None;
    let mut in_preamble = true;

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            if let Some(section) = current.take() {
                file.sections.push(section);
            }
            in_preamble = false;
            let glob = &line[1..line.len() - 1];
            match section_matcher(glob) {
                Ok(matcher) => {
                    current = Some(Section {
                        matcher,
                        properties: Vec::new(),
                    })
                }
                Err(e) => debug!("skipping editorconfig section [{glob}]: {e}"),
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim().to_lowercase();

        if in_preamble {
            if key == "root" {
                file.root = value == "true";
            }
        } else if let Some(section) = current.as_mut() {
            section.properties.push((key, value));
        }
    }

    if let Some(section) = current {
        file.sections.push(section);
    }
    file
}

/// Globs without a `/` match a file name at any depth; others are anchored.
fn section_matcher(glob: &str) -> Result<GlobMatcher, globset::Error> {
    let pattern = if let Some(anchored) = glob.strip_prefix('/') {
        anchored.to_string()
    } else if glob.contains('/') {
        glob.to_string()
    } else {
        format!("**/{glob}")
    };

    Ok(GlobBuilder::new(&pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}
