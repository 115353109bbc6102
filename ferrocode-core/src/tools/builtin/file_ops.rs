//! File reading, writing, editing, and directory listing.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::tools::traits::{Tool, ToolCapability};

const PATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Read a text file, rendered with 1-based line numbers so the model can
/// reference locations in follow-up edits.
pub struct ReadTool;

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "read"
    }

    fn description(&self) -> &str {
        "Read a text file, returning numbered lines. Supports offset/limit for large files."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path to read"},
                "offset": {"type": "integer", "description": "1-based line to start from"},
                "limit": {"type": "integer", "description": "Maximum number of lines"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let path = required_str(&args, "path")?;
        let offset = args.get("offset").and_then(Value::as_u64).unwrap_or(1).max(1) as usize;
        let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(2_000) as usize;

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {path}"))?;

        let mut out = String::new();
        for (index, line) in content.lines().enumerate().skip(offset - 1).take(limit) {
            out.push_str(&format!("{:>4}\u{2502} {line}\n", index + 1));
        }
        if out.is_empty() {
            out = "(empty file)".to_owned();
        }
        Ok(Value::String(out))
    }
}

/// Write (or overwrite) a file, creating parent directories as needed.
pub struct WriteTool;

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "write"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories. Overwrites existing files."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path to write"},
                "content": {"type": "string", "description": "Full file content"}
            },
            "required": ["path", "content"]
        })
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Mutating
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let path = required_str(&args, "path")?;
        let content = required_str(&args, "content")?;

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("writing {path}"))?;
        Ok(Value::String(format!(
            "wrote {} bytes to {path}",
            content.len()
        )))
    }
}

/// Replace an exact string in a file. The old string must be unique unless
/// `all` is set, which guards against silently editing the wrong site.
pub struct EditTool;

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "edit"
    }

    fn description(&self) -> &str {
        "Replace an exact string in a file. old must appear exactly once unless all=true."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path to edit"},
                "old": {"type": "string", "description": "Exact text to replace"},
                "new": {"type": "string", "description": "Replacement text"},
                "all": {"type": "boolean", "description": "Replace every occurrence"}
            },
            "required": ["path", "old", "new"]
        })
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Mutating
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let path = required_str(&args, "path")?;
        let old = required_str(&args, "old")?;
        let new = required_str(&args, "new")?;
        let all = args.get("all").and_then(Value::as_bool).unwrap_or(false);

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {path}"))?;

        let count = content.matches(old).count();
        if count == 0 {
            bail!("old string not found in {path}");
        }
        if count > 1 && !all {
            bail!("old string appears {count} times in {path}; pass all=true or make it unique");
        }

        let updated = if all {
            content.replace(old, new)
        } else {
            content.replacen(old, new, 1)
        };
        tokio::fs::write(path, updated)
            .await
            .with_context(|| format!("writing {path}"))?;
        Ok(Value::String(format!(
            "replaced {} occurrence(s) in {path}",
            if all { count } else { 1 }
        )))
    }
}

/// Apply a unified diff to a file via the system `patch` utility. Unlike
/// `edit`, one call can carry several hunks.
pub struct PatchTool;

#[async_trait]
impl Tool for PatchTool {
    fn name(&self) -> &str {
        "patch"
    }

    fn description(&self) -> &str {
        "Apply a unified diff to a file. Use this for multi-hunk changes; use edit for a single replacement."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to patch"},
                "diff": {"type": "string", "description": "Unified diff to apply"}
            },
            "required": ["path", "diff"]
        })
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Mutating
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let path = required_str(&args, "path")?;
        let diff = required_str(&args, "diff")?;
        if !Path::new(path).is_file() {
            bail!("file not found: {path}");
        }

        let mut child = Command::new("patch")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("spawning patch (is the patch utility installed?)")?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("patch has no stdin"))?;
        stdin.write_all(diff.as_bytes()).await?;
        if !diff.ends_with('\n') {
            stdin.write_all(b"\n").await?;
        }
        drop(stdin);

        let output = match tokio::time::timeout(PATCH_TIMEOUT, child.wait_with_output()).await {
            Ok(output) => output.with_context(|| format!("patching {path}"))?,
            Err(_) => bail!("patch timed out after {}s", PATCH_TIMEOUT.as_secs()),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            bail!(
                "patch failed: {}",
                if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() }
            );
        }
        Ok(Value::String(format!("patch applied to {path}")))
    }
}

/// List a directory, directories suffixed with `/`, dotfiles skipped.
pub struct LsTool;

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List directory contents. Directories end with '/'. Hidden entries are skipped."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory to list (default '.')"}
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let path = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path)
            .await
            .with_context(|| format!("listing {path}"))?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }
        entries.sort();
        if entries.is_empty() {
            return Ok(Value::String("(empty directory)".to_owned()));
        }
        Ok(Value::String(entries.join("\n")))
    }
}

pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .with_context(|| format!("missing '{key}' argument"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn read_numbers_lines_from_one() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        tokio::fs::write(&path, "alpha\nbeta\n").await.unwrap();

        let out = ReadTool
            .execute(json!({"path": path.to_str().unwrap()}))
            .await
            .unwrap();
        assert_eq!(
            out.as_str().unwrap(),
            "   1\u{2502} alpha\n   2\u{2502} beta\n"
        );
    }

    #[tokio::test]
    async fn read_honors_offset_and_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        tokio::fs::write(&path, "a\nb\nc\nd\n").await.unwrap();

        let out = ReadTool
            .execute(json!({"path": path.to_str().unwrap(), "offset": 2, "limit": 2}))
            .await
            .unwrap();
        assert_eq!(out.as_str().unwrap(), "   2\u{2502} b\n   3\u{2502} c\n");
    }

    #[tokio::test]
    async fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deep/f.txt");
        let out = WriteTool
            .execute(json!({"path": path.to_str().unwrap(), "content": "hi"}))
            .await
            .unwrap();
        assert!(out.as_str().unwrap().contains("2 bytes"));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn edit_rejects_ambiguous_replacement() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        tokio::fs::write(&path, "foo foo").await.unwrap();

        let err = EditTool
            .execute(json!({"path": path.to_str().unwrap(), "old": "foo", "new": "bar"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("2 times"));
    }

    #[tokio::test]
    async fn edit_all_replaces_every_occurrence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        tokio::fs::write(&path, "foo foo").await.unwrap();

        EditTool
            .execute(json!({
                "path": path.to_str().unwrap(),
                "old": "foo", "new": "bar", "all": true
            }))
            .await
            .unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "bar bar");
    }

    #[tokio::test]
    async fn patch_applies_a_multi_hunk_diff() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        tokio::fs::write(&path, "one\ntwo\nthree\nfour\nfive\nsix\nseven\neight\n")
            .await
            .unwrap();

        let diff = "\
--- f.txt
+++ f.txt
@@ -1,3 +1,3 @@
 one
-two
+TWO
 three
@@ -6,3 +6,3 @@
 six
-seven
+SEVEN
 eight
";
        let out = PatchTool
            .execute(json!({"path": path.to_str().unwrap(), "diff": diff}))
            .await
            .unwrap();
        assert!(out.as_str().unwrap().contains("patch applied"));
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "one\nTWO\nthree\nfour\nfive\nsix\nSEVEN\neight\n"
        );
    }

    #[tokio::test]
    async fn patch_rejects_a_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.txt");
        let err = PatchTool
            .execute(json!({"path": path.to_str().unwrap(), "diff": "--- x\n+++ x\n"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }

    #[tokio::test]
    async fn patch_surfaces_a_rejected_hunk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        tokio::fs::write(&path, "completely\ndifferent\ncontent\n")
            .await
            .unwrap();

        let diff = "\
--- f.txt
+++ f.txt
@@ -1,2 +1,2 @@
 one
-two
+TWO
";
        let result = PatchTool
            .execute(json!({"path": path.to_str().unwrap(), "diff": diff}))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn ls_marks_directories_and_skips_dotfiles() {
        let dir = TempDir::new().unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "").await.unwrap();
        tokio::fs::write(dir.path().join(".hidden"), "").await.unwrap();

        let out = LsTool
            .execute(json!({"path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert_eq!(out.as_str().unwrap(), "a.txt\nsub/");
    }
}
