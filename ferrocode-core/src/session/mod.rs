//! Session persistence.
//!
//! Transcripts are stored one session per append-only JSONL file, one turn
//! per line. Appends happen before the next model call so a crash never
//! loses acknowledged work. A corrupt line is skipped with a warning rather
//! than poisoning the whole session.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::agent::conversation::Turn;

/// Listing entry for a stored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub turns: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Storage seam for conversation transcripts. Synchronous by contract: an
/// append must be durable when it returns.
pub trait SessionStore: Send + Sync {
    fn append(&self, session_id: &str, turn: &Turn) -> Result<()>;
    fn load(&self, session_id: &str) -> Result<Vec<Turn>>;
    fn clear(&self, session_id: &str) -> Result<()>;
    fn list(&self) -> Result<Vec<SessionSummary>>;
}

/// JSONL-file-backed store rooted at a sessions directory.
pub struct JsonlSessionStore {
    root: PathBuf,
}

impl JsonlSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("{}.jsonl", sanitize(session_id)))
    }
}

/// Keep session ids filesystem-safe.
fn sanitize(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl SessionStore for JsonlSessionStore {
    fn append(&self, session_id: &str, turn: &Turn) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating {}", self.root.display()))?;
        let path = self.path_for(session_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        let mut line = serde_json::to_string(turn).context("serializing turn")?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .with_context(|| format!("appending to {}", path.display()))?;
        file.sync_data()
            .with_context(|| format!("syncing {}", path.display()))?;
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Vec<Turn>> {
        let path = self.path_for(session_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };

        let mut turns = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(turn) => turns.push(turn),
                Err(err) => warn!(
                    "skipping corrupt line {} in {}: {err}",
                    number + 1,
                    path.display()
                ),
            }
        }
        Ok(turns)
    }

    fn clear(&self, session_id: &str) -> Result<()> {
        let path = self.path_for(session_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("removing {}", path.display())),
        }
    }

    fn list(&self) -> Result<Vec<SessionSummary>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("listing {}", self.root.display()));
            }
        };

        let mut summaries = Vec::new();
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let turns = self.load(id)?;
            summaries.push(SessionSummary {
                id: id.to_owned(),
                updated_at: turns.last().map(|turn| turn.created_at),
                turns: turns.len(),
            });
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn append_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSessionStore::new(dir.path());

        store.append("work", &Turn::user("hello")).unwrap();
        store.append("work", &Turn::assistant("hi")).unwrap();

        let turns = store.load("work").unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "hello");
        assert_eq!(turns[1].content, "hi");
    }

    #[test]
    fn missing_session_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSessionStore::new(dir.path());
        assert!(store.load("nope").unwrap().is_empty());
    }

    #[test]
    fn corrupt_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSessionStore::new(dir.path());
        store.append("work", &Turn::user("first")).unwrap();

        let path = dir.path().join("work.jsonl");
        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("{truncated garbage\n");
        fs::write(&path, content).unwrap();
        store.append("work", &Turn::user("second")).unwrap();

        let turns = store.load("work").unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, "second");
    }

    #[test]
    fn clear_removes_the_session() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSessionStore::new(dir.path());
        store.append("gone", &Turn::user("bye")).unwrap();
        store.clear("gone").unwrap();
        assert!(store.load("gone").unwrap().is_empty());
        // Clearing twice is fine.
        store.clear("gone").unwrap();
    }

    #[test]
    fn list_reports_turn_counts() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSessionStore::new(dir.path());
        store.append("a", &Turn::user("1")).unwrap();
        store.append("a", &Turn::assistant("2")).unwrap();
        store.append("b", &Turn::user("1")).unwrap();

        let summaries = store.list().unwrap();
        assert_eq!(summaries.len(), 2);
        let a = summaries.iter().find(|s| s.id == "a").unwrap();
        assert_eq!(a.turns, 2);
    }

    #[test]
    fn session_ids_are_sanitized_for_the_filesystem() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSessionStore::new(dir.path());
        store.append("../evil/../id", &Turn::user("x")).unwrap();
        assert!(dir.path().join("___evil____id.jsonl").is_file());
    }
}
