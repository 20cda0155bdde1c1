//! Append-only audit log of terminal timer outcomes.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::warn;

use crate::error::StoreError;
use crate::records::HistoryEntry;

/// Append-only history, optionally mirrored to a JSON Lines file.
#[derive(Clone, Default)]
pub struct HistoryRecorder {
    inner: Arc<HistoryInner>,
}

#[derive(Default)]
struct HistoryInner {
    path: Option<PathBuf>,
    entries: Mutex<Vec<HistoryEntry>>,
}

impl HistoryRecorder {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads existing entries from `path`. Lines that fail to parse are skipped.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => parse_lines(&path, &content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(StoreError::io(&path, err)),
        };

        Ok(Self {
            inner: Arc::new(HistoryInner {
                path: Some(path),
                entries: Mutex::new(entries),
            }),
        })
    }

    /// Appends one entry. Entries are never rewritten or removed.
    pub fn record(&self, entry: HistoryEntry) -> Result<(), StoreError> {
        let mut entries = self.lock();
        if let Some(path) = &self.inner.path {
            append_line(path, &entry)?;
        }
        entries.push(entry);
        Ok(())
    }

    /// All entries, newest first.
    pub fn list(&self) -> Vec<HistoryEntry> {
        self.lock().iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        match self.inner.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn parse_lines(path: &Path, content: &str) -> Vec<HistoryEntry> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str(line) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(
                    "Skipping unreadable history line {} in {}: {}",
                    index + 1,
                    path.display(),
                    err
                );
                None
            }
        })
        .collect()
}

fn append_line(path: &Path, entry: &HistoryEntry) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
        }
    }
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| StoreError::io(path, err))?;
    file.write_all(&line).map_err(|err| StoreError::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::Timer;
    use chrono::{DateTime, Duration, Utc};

    fn discarded(issue_key: &str, seconds: i64) -> HistoryEntry {
        let at = DateTime::<Utc>::default() + Duration::seconds(seconds);
        let timer = Timer::start(issue_key, "", at);
        HistoryEntry::discarded(&timer, seconds as u64, at)
    }

    #[test]
    fn list_is_newest_first() {
        let history = HistoryRecorder::in_memory();
        history.record(discarded("ABC-1", 1)).unwrap();
        history.record(discarded("ABC-2", 2)).unwrap();

        let keys: Vec<String> = history.list().into_iter().map(|e| e.issue_key).collect();
        assert_eq!(keys, vec!["ABC-2", "ABC-1"]);
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");

        let first = discarded("ABC-1", 10);
        {
            let history = HistoryRecorder::open(&path).unwrap();
            history.record(first.clone()).unwrap();
        }
        let history = HistoryRecorder::open(&path).unwrap();
        history.record(discarded("ABC-2", 20)).unwrap();

        let reopened = HistoryRecorder::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.list().last(), Some(&first));
    }

    #[test]
    fn unreadable_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let good = serde_json::to_string(&discarded("ABC-1", 5)).unwrap();
        fs::write(&path, format!("garbage\n{}\n\n", good)).unwrap();

        let history = HistoryRecorder::open(&path).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn failed_append_is_reported_and_not_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let history = HistoryRecorder::open(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(history.record(discarded("ABC-1", 1)).is_err());
        assert!(history.is_empty());
    }
}
