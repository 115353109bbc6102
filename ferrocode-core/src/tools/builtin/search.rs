//! Content and filename search tools.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use walkdir::{DirEntry, WalkDir};

use crate::tools::builtin::file_ops::required_str;
use crate::tools::traits::Tool;

const MAX_MATCHES: usize = 50;

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// Regex search over file contents, recursing from a root directory.
pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file contents with a regex. Returns path:line matches, capped at 50."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Regex to search for"},
                "path": {"type": "string", "description": "Root directory (default '.')"},
                "context": {"type": "integer", "description": "Lines of context around each match"}
            },
            "required": ["pattern"]
        })
    }

    fn permission_target(&self, args: &Value) -> Option<String> {
        args.get("path").and_then(Value::as_str).map(str::to_owned)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let pattern = required_str(&args, "pattern")?;
        let root = args.get("path").and_then(Value::as_str).unwrap_or(".").to_owned();
        let context = args.get("context").and_then(Value::as_u64).unwrap_or(0) as usize;
        let regex = Regex::new(pattern).with_context(|| format!("invalid regex '{pattern}'"))?;

        // Filesystem walk is blocking work.
        let output = tokio::task::spawn_blocking(move || {
            let mut lines = Vec::new();
            let mut matches = 0;
            'files: for entry in WalkDir::new(&root)
                .into_iter()
                .filter_entry(|entry| !is_hidden(entry))
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
            {
                let Ok(content) = std::fs::read_to_string(entry.path()) else {
                    continue;
                };
                let file_lines: Vec<&str> = content.lines().collect();
                for (index, line) in file_lines.iter().enumerate() {
                    if !regex.is_match(line) {
                        continue;
                    }
                    let start = index.saturating_sub(context);
                    let end = (index + context + 1).min(file_lines.len());
                    for (ctx_index, ctx_line) in file_lines[start..end].iter().enumerate() {
                        let number = start + ctx_index + 1;
                        let sep = if start + ctx_index == index { ':' } else { '-' };
                        lines.push(format!(
                            "{}{sep}{number}{sep}{ctx_line}",
                            entry.path().display()
                        ));
                    }
                    matches += 1;
                    if matches >= MAX_MATCHES {
                        lines.push(format!("[stopped after {MAX_MATCHES} matches]"));
                        break 'files;
                    }
                }
            }
            lines
        })
        .await?;

        if output.is_empty() {
            return Ok(Value::String("no matches".to_owned()));
        }
        Ok(Value::String(output.join("\n")))
    }
}

/// Glob-pattern file lookup, newest files first.
pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern like 'src/**/*.rs', newest first, capped at 50."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Glob pattern"}
            },
            "required": ["pattern"]
        })
    }

    fn permission_target(&self, args: &Value) -> Option<String> {
        args.get("pattern").and_then(Value::as_str).map(str::to_owned)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let pattern = required_str(&args, "pattern")?.to_owned();
        let paths = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut found: Vec<(std::time::SystemTime, String)> = Vec::new();
            for entry in glob::glob(&pattern)
                .with_context(|| format!("invalid glob '{pattern}'"))?
                .filter_map(|entry| entry.ok())
            {
                let modified = entry
                    .metadata()
                    .and_then(|meta| meta.modified())
                    .unwrap_or(std::time::UNIX_EPOCH);
                found.push((modified, entry.display().to_string()));
            }
            found.sort_by(|a, b| b.0.cmp(&a.0));
            found.truncate(MAX_MATCHES);
            Ok(found.into_iter().map(|(_, path)| path).collect())
        })
        .await??;

        if paths.is_empty() {
            return Ok(Value::String("no matches".to_owned()));
        }
        Ok(Value::String(paths.join("\n")))
    }
}

/// Filename search by glob fragment, with an optional file/dir type filter.
pub struct FindTool;

#[async_trait]
impl Tool for FindTool {
    fn name(&self) -> &str {
        "find"
    }

    fn description(&self) -> &str {
        "Find files or directories whose name matches a glob, capped at 50 results."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Glob over the entry name, e.g. '*.toml'"},
                "path": {"type": "string", "description": "Root directory (default '.')"},
                "kind": {"type": "string", "description": "Filter: 'file' or 'dir'"}
            },
            "required": ["name"]
        })
    }

    fn permission_target(&self, args: &Value) -> Option<String> {
        args.get("path").and_then(Value::as_str).map(str::to_owned)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = required_str(&args, "name")?;
        let root = args.get("path").and_then(Value::as_str).unwrap_or(".").to_owned();
        let kind = args
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_owned();
        let pattern =
            glob::Pattern::new(name).with_context(|| format!("invalid glob '{name}'"))?;

        let paths = tokio::task::spawn_blocking(move || {
            let mut found = Vec::new();
            for entry in WalkDir::new(&root)
                .into_iter()
                .filter_entry(|entry| !is_hidden(entry))
                .filter_map(|entry| entry.ok())
            {
                match kind.as_str() {
                    "file" if !entry.file_type().is_file() => continue,
                    "dir" if !entry.file_type().is_dir() => continue,
                    _ => {}
                }
                if pattern.matches(&entry.file_name().to_string_lossy()) {
                    found.push(entry.path().display().to_string());
                    if found.len() >= MAX_MATCHES {
                        break;
                    }
                }
            }
            found
        })
        .await?;

        if paths.is_empty() {
            return Ok(Value::String("no matches".to_owned()));
        }
        Ok(Value::String(paths.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        tokio::fs::create_dir(dir.path().join("src")).await.unwrap();
        tokio::fs::write(dir.path().join("src/lib.rs"), "pub fn answer() -> u32 { 42 }\n")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("README.md"), "hello world\n")
            .await
            .unwrap();
        dir
    }

    #[tokio::test]
    async fn grep_reports_path_and_line() {
        let dir = fixture().await;
        let out = GrepTool
            .execute(json!({"pattern": "answer", "path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();
        let text = out.as_str().unwrap();
        assert!(text.contains("lib.rs:1:"));
    }

    #[tokio::test]
    async fn grep_with_no_matches_says_so() {
        let dir = fixture().await;
        let out = GrepTool
            .execute(json!({"pattern": "zzz_nothing", "path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert_eq!(out.as_str().unwrap(), "no matches");
    }

    #[tokio::test]
    async fn grep_rejects_invalid_regex() {
        let err = GrepTool
            .execute(json!({"pattern": "[unclosed"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid regex"));
    }

    #[tokio::test]
    async fn find_filters_by_kind() {
        let dir = fixture().await;
        let out = FindTool
            .execute(json!({
                "name": "src",
                "path": dir.path().to_str().unwrap(),
                "kind": "dir"
            }))
            .await
            .unwrap();
        assert!(out.as_str().unwrap().ends_with("src"));
    }

    #[tokio::test]
    async fn find_by_extension() {
        let dir = fixture().await;
        let out = FindTool
            .execute(json!({"name": "*.rs", "path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert!(out.as_str().unwrap().contains("lib.rs"));
    }
}
