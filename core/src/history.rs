//! Local log of completed turns, kept so that response ids can be found again
//! and conversations exported as text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::conversation::ResponseRecord;
use crate::errors::{SaverError, SaverResult};
use crate::types::ResponseId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub response_id: ResponseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<ResponseId>,
    pub model: String,
    pub message: String,
    pub assistant_text: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_record(
        record: &ResponseRecord,
        previous_response_id: Option<ResponseId>,
        message: &str,
    ) -> Self {
        Self {
            response_id: record.response_id.clone(),
            previous_response_id,
            model: record.model.clone(),
            message: message.to_string(),
            assistant_text: record.assistant_text.clone(),
            timestamp: record.timestamp,
        }
    }
}

/// Append-only history stored as a JSON array
#[derive(Debug)]
pub struct HistoryLog {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
    /// Cleared when an existing file could neither be read nor moved aside
    writable: bool,
}

impl HistoryLog {
    /// Loads the log at `path`.
    ///
    /// A missing file yields an empty log. A file that does not parse is moved
    /// to a `.bak` sibling and the log starts empty. If the file cannot be read
    /// or moved, the log is empty and [`HistoryLog::save`] refuses to overwrite it.
    pub fn load(path: &Path) -> Self {
        let mut log = Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
            writable: true,
        };

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No history file at {}", path.display());
                return log;
            }
            Err(e) => {
                warn!("Failed to read history file {}: {}", path.display(), e);
                log.writable = false;
                return log;
            }
        };

        match serde_json::from_slice::<Vec<HistoryEntry>>(&bytes) {
            Ok(entries) => {
                debug!("Loaded {} history entries from {}", entries.len(), path.display());
                log.entries = entries;
            }
            Err(e) => {
                warn!("Failed to parse history file {}: {}", path.display(), e);
                match move_aside(path) {
                    Ok(backup) => warn!("Moved unreadable history to {}", backup.display()),
                    Err(e) => {
                        warn!("Could not back up {}: {}", path.display(), e);
                        log.writable = false;
                    }
                }
            }
        }
        log
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Most recent entry with this response id
    pub fn find(&self, response_id: &str) -> Option<&HistoryEntry> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.response_id.as_str() == response_id)
    }

    /// Entries leading up to `response_id`, oldest first, following the
    /// previous-response links recorded locally
    pub fn chain(&self, response_id: &str) -> Vec<&HistoryEntry> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.find(response_id);
        while let Some(entry) = cursor {
            if !seen.insert(entry.response_id.as_str()) {
                break;
            }
            chain.push(entry);
            cursor = entry
                .previous_response_id
                .as_ref()
                .and_then(|prev| self.find(prev.as_str()));
        }
        chain.reverse();
        chain
    }

    pub fn save(&self) -> SaverResult<()> {
        if !self.writable {
            return Err(SaverError::Config(format!(
                "History file {} could not be read; not overwriting it",
                self.path.display()
            )));
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json_str = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json_str)?;
        debug!("Saved history to {}", self.path.display());
        Ok(())
    }

    pub fn render_text(&self) -> String {
        render_text(self.entries.iter())
    }

    pub fn render_json(&self) -> SaverResult<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}

/// Renames `path` to the first free `<name>.bak`, `<name>.bak.1`, ...
fn move_aside(path: &Path) -> std::io::Result<PathBuf> {
    let mut base = OsString::from(path.as_os_str());
    base.push(".bak");
    let mut backup = PathBuf::from(&base);
    let mut n = 1;
    while backup.exists() {
        let mut numbered = base.clone();
        numbered.push(format!(".{}", n));
        backup = PathBuf::from(numbered);
        n += 1;
    }
    fs::rename(path, &backup)?;
    Ok(backup)
}

/// Markdown transcript of the given entries
pub fn render_text<'a>(entries: impl IntoIterator<Item = &'a HistoryEntry>) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "## {}", entry.response_id);
        let _ = writeln!(
            out,
            "_{} · {}_",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.model
        );
        if let Some(prev) = &entry.previous_response_id {
            let _ = writeln!(out, "_continues {}_", prev);
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "**You:** {}", entry.message);
        let _ = writeln!(out);
        let _ = writeln!(out, "**Assistant:** {}", entry.assistant_text);
        let _ = writeln!(out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn entry(id: &str, prev: Option<&str>, message: &str) -> HistoryEntry {
        HistoryEntry {
            response_id: ResponseId::parse(id).unwrap(),
            previous_response_id: prev.and_then(ResponseId::parse),
            model: "gpt-4o".to_string(),
            message: message.to_string(),
            assistant_text: format!("re: {}", message),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::load(&dir.path().join("history.json"));
        assert!(log.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("history.json");

        let mut log = HistoryLog::load(&path);
        log.append(entry("resp_1", None, "Hello"));
        log.append(entry("resp_2", Some("resp_1"), "And then?"));
        log.save().unwrap();

        let reloaded = HistoryLog::load(&path);
        assert_eq!(reloaded.entries(), log.entries());
        assert_eq!(reloaded.find("resp_2").unwrap().message, "And then?");
        assert!(reloaded.find("resp_3").is_none());
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{not json").unwrap();
        assert!(HistoryLog::load(&path).is_empty());
    }

    #[test]
    fn test_corrupt_file_kept_as_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut original = serde_json::to_vec(&[entry("resp_old", None, "precious")]).unwrap();
        original.push(0xff);
        fs::write(&path, &original).unwrap();
        fs::write(dir.path().join("history.json.bak"), b"older backup").unwrap();

        let mut log = HistoryLog::load(&path);
        assert!(log.is_empty());
        log.append(entry("resp_new", None, "fresh"));
        log.save().unwrap();

        assert_eq!(fs::read(dir.path().join("history.json.bak.1")).unwrap(), original);
        assert_eq!(fs::read(dir.path().join("history.json.bak")).unwrap(), b"older backup");
        let reloaded = HistoryLog::load(&path);
        assert_eq!(reloaded.entries().len(), 1);
        assert_eq!(reloaded.entries()[0].message, "fresh");
    }

    #[test]
    fn test_unreadable_file_is_not_overwritten() {
        let dir = tempdir().unwrap();
        // A directory where the file should be cannot be read as history
        let path = dir.path().join("history.json");
        fs::create_dir(&path).unwrap();

        let mut log = HistoryLog::load(&path);
        assert!(log.is_empty());
        log.append(entry("resp_1", None, "hi"));
        assert!(matches!(log.save().unwrap_err(), SaverError::Config(_)));
        assert!(path.is_dir());
    }

    #[test]
    fn test_chain_follows_previous_links() {
        let dir = tempdir().unwrap();
        let mut log = HistoryLog::load(&dir.path().join("history.json"));
        log.append(entry("resp_1", None, "one"));
        log.append(entry("resp_x", None, "unrelated"));
        log.append(entry("resp_2", Some("resp_1"), "two"));
        log.append(entry("resp_3", Some("resp_2"), "three"));

        let ids: Vec<&str> = log
            .chain("resp_3")
            .iter()
            .map(|e| e.response_id.as_str())
            .collect();
        assert_eq!(ids, vec!["resp_1", "resp_2", "resp_3"]);
        assert!(log.chain("missing").is_empty());
    }

    #[test]
    fn test_chain_stops_on_cycle() {
        let dir = tempdir().unwrap();
        let mut log = HistoryLog::load(&dir.path().join("history.json"));
        log.append(entry("resp_a", Some("resp_b"), "a"));
        log.append(entry("resp_b", Some("resp_a"), "b"));

        let ids: Vec<&str> = log
            .chain("resp_a")
            .iter()
            .map(|e| e.response_id.as_str())
            .collect();
        assert_eq!(ids, vec!["resp_b", "resp_a"]);
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&[entry("resp_2", Some("resp_1"), "Hi")]);
        assert!(text.starts_with("## resp_2\n"));
        assert!(text.contains("2025-01-02 03:04:05 UTC"));
        assert!(text.contains("_continues resp_1_"));
        assert!(text.contains("**You:** Hi"));
        assert!(text.contains("**Assistant:** re: Hi"));
    }
}
