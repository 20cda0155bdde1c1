//! Durable keyed collection of timers and the worklogs they produced.
//!
//! A file-backed store may be shared by several processes. Every mutation
//! takes an exclusive lock on a sibling lock file, re-reads the document,
//! applies the change and writes it back before releasing the lock; reads
//! refresh under a shared lock. A submission in flight additionally holds a
//! per-timer lock so that other processes never recover its timer.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use fd_lock::{RwLock, RwLockWriteGuard};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, StoreError};
use crate::records::WorklogRecord;
use crate::timer::{Timer, TimerId, TimerStatus};

type StoreResult<T> = std::result::Result<T, StoreError>;

const STORE_VERSION: u32 = 1;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    timers: BTreeMap<TimerId, Timer>,
    #[serde(default)]
    worklogs: Vec<WorklogRecord>,
}

impl StoreDocument {
    fn insert_record(&mut self, record: &WorklogRecord) {
        if !self.worklogs.iter().any(|r| r.timer_id == record.timer_id) {
            self.worklogs.push(record.clone());
        }
    }
}

/// Submission outcomes that could not be written yet. They are laid over
/// whatever is read from disk until a later write succeeds.
#[derive(Default)]
struct Unsaved {
    outcomes: BTreeMap<TimerId, (Timer, Option<WorklogRecord>)>,
}

impl Unsaved {
    fn overlay(&self, document: &mut StoreDocument) {
        for (id, (timer, record)) in &self.outcomes {
            let applies = match document.timers.get(id).map(|t| t.status) {
                Some(TimerStatus::LoggedPending) => true,
                // the worklog exists remotely even if another process already recovered the timer
                Some(status) => timer.status == TimerStatus::Logged && status.is_live(),
                None => false,
            };
            if applies {
                document.timers.insert(*id, timer.clone());
                if let Some(record) = record {
                    document.insert_record(record);
                }
            }
        }
    }
}

#[derive(Default)]
struct StoreState {
    document: StoreDocument,
    unsaved: Unsaved,
}

struct StoreFiles {
    path: PathBuf,
    lock_path: PathBuf,
    submissions_dir: PathBuf,
}

impl StoreFiles {
    fn new(path: PathBuf) -> Self {
        Self {
            lock_path: path.with_extension("json.lock"),
            submissions_dir: path.with_extension("locks"),
            path,
        }
    }

    fn lock(&self) -> StoreResult<RwLock<File>> {
        open_lock_file(&self.lock_path).map(RwLock::new)
    }

    fn submission_path(&self, id: TimerId) -> PathBuf {
        self.submissions_dir.join(format!("{}.lock", id))
    }

    fn read_shared(&self) -> StoreResult<StoreDocument> {
        let lock = self.lock()?;
        let _guard = lock
            .read()
            .map_err(|err| StoreError::io(&self.lock_path, err))?;
        read_document(&self.path)
    }

    /// Returns timers left in `LoggedPending` by a submission that is no
    /// longer running to `Paused`, with their time intact.
    fn recover_interrupted(&self) -> StoreResult<StoreDocument> {
        let mut lock = self.lock()?;
        let _guard = lock
            .write()
            .map_err(|err| StoreError::io(&self.lock_path, err))?;
        let mut document = read_document(&self.path)?;

        let mut recovered = 0usize;
        for timer in document.timers.values_mut() {
            if timer.status != TimerStatus::LoggedPending {
                continue;
            }
            if self.submission_in_flight(timer.id) {
                debug!("Timer {} is being submitted by another process", timer.id);
                continue;
            }
            warn!(
                "Timer {} for {} was mid-submission at shutdown; returning it to paused",
                timer.id, timer.issue_key
            );
            timer.status = TimerStatus::Paused;
            timer.running_since = None;
            recovered += 1;
        }
        if recovered > 0 {
            document.version = STORE_VERSION;
            write_document(&self.path, &document)?;
        }
        Ok(document)
    }

    fn submission_in_flight(&self, id: TimerId) -> bool {
        let path = self.submission_path(id);
        let mut lock = match open_lock_file(&path) {
            Ok(file) => RwLock::new(file),
            Err(err) => {
                warn!("Cannot check submission lock for timer {}: {}", id, err);
                return true;
            }
        };
        let in_flight = match lock.try_write() {
            Ok(_guard) => false,
            Err(err) if err.kind() == ErrorKind::WouldBlock => true,
            Err(err) => {
                warn!("Cannot check submission lock for timer {}: {}", id, err);
                true
            }
        };
        in_flight
    }
}

/// Thread-safe timer store, optionally backed by a JSON file.
///
/// Each mutation is applied to a fresh copy of the document, written to
/// disk, and only then published in memory, so a failed write leaves both
/// unchanged.
#[derive(Clone, Default)]
pub struct TimerStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    files: Option<StoreFiles>,
    state: Mutex<StoreState>,
}

impl TimerStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens (or creates on first write) the store at `path`.
    ///
    /// Timers found in `LoggedPending` whose submission is no longer held by
    /// any process belonged to an interrupted submission; they are returned
    /// to `Paused` with their time intact.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let files = StoreFiles::new(path.into());
        let document = files.recover_interrupted()?;

        debug!(
            "Opened timer store {} with {} timers",
            files.path.display(),
            document.timers.len()
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                files: Some(files),
                state: Mutex::new(StoreState {
                    document,
                    unsaved: Unsaved::default(),
                }),
            }),
        })
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.files.as_ref().map(|files| files.path.as_path())
    }

    /// Latest copy of one timer, including terminal ones.
    pub fn get(&self, id: TimerId) -> Option<Timer> {
        self.current().document.timers.get(&id).cloned()
    }

    /// Inserts or replaces a timer.
    pub fn put(&self, timer: &Timer) -> StoreResult<()> {
        self.mutate(|document| {
            document.timers.insert(timer.id, timer.clone());
            Ok::<(), StoreError>(())
        })
    }

    /// Applies a transition to the stored timer and persists the result.
    ///
    /// The timer is re-read under the store lock, so a transition made by
    /// another process is never overwritten. If `apply` fails nothing is written.
    pub fn update<R, F>(&self, id: TimerId, apply: F) -> crate::error::Result<(Timer, R)>
    where
        F: FnOnce(&mut Timer) -> crate::error::Result<R>,
    {
        self.mutate(|document| {
            let timer = document
                .timers
                .get_mut(&id)
                .ok_or(EngineError::NotFound(id))?;
            let outcome = apply(timer)?;
            Ok((timer.clone(), outcome))
        })
    }

    /// Stores the outcome of a submission: the timer leaving `LoggedPending`
    /// and, on success, its worklog, in a single write.
    ///
    /// When the write fails the outcome still takes effect in this process and
    /// is written together with the next successful mutation.
    pub fn settle(&self, timer: &Timer, record: Option<&WorklogRecord>) -> StoreResult<()> {
        let written = self.mutate(|document| {
            document.timers.insert(timer.id, timer.clone());
            if let Some(record) = record {
                document.insert_record(record);
            }
            Ok::<(), StoreError>(())
        });
        if let Err(err) = &written {
            error!(
                "Could not save outcome of timer {} ({}); keeping it in memory: {}",
                timer.id, timer.status, err
            );
            let mut state = self.lock();
            state.document.timers.insert(timer.id, timer.clone());
            if let Some(record) = record {
                state.document.insert_record(record);
            }
            state
                .unsaved
                .outcomes
                .insert(timer.id, (timer.clone(), record.cloned()));
        }
        written
    }

    /// Non-terminal timers, oldest first.
    pub fn active(&self) -> Vec<Timer> {
        let mut timers: Vec<Timer> = self
            .current()
            .document
            .timers
            .values()
            .filter(|timer| !timer.status.is_terminal())
            .cloned()
            .collect();
        timers.sort_by_key(|timer| timer.created_at);
        timers
    }

    /// Every worklog this store has recorded, in submission order.
    pub fn worklogs(&self) -> Vec<WorklogRecord> {
        self.current().document.worklogs.clone()
    }

    /// The worklog produced by `timer_id`, if it was logged.
    pub fn worklog_for(&self, timer_id: TimerId) -> Option<WorklogRecord> {
        self.current()
            .document
            .worklogs
            .iter()
            .find(|record| record.timer_id == timer_id)
            .cloned()
    }

    /// Per-timer lock a submission holds while it is in flight.
    pub fn submission_lock(&self, id: TimerId) -> StoreResult<SubmissionLock> {
        let file = match &self.inner.files {
            Some(files) => {
                let path = files.submission_path(id);
                Some((open_lock_file(&path)?, path))
            }
            None => None,
        };
        Ok(SubmissionLock {
            lock: file.map(|(file, path)| (RwLock::new(file), path)),
        })
    }

    fn mutate<R, E, F>(&self, apply: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut StoreDocument) -> std::result::Result<R, E>,
        E: From<StoreError>,
    {
        let mut state = self.lock();
        let Some(files) = self.inner.files.as_ref() else {
            let mut next = state.document.clone();
            let outcome = apply(&mut next)?;
            state.document = next;
            return Ok(outcome);
        };

        let mut lock = files.lock()?;
        let _guard = lock
            .write()
            .map_err(|err| StoreError::io(&files.lock_path, err))?;
        let mut next = read_document(&files.path)?;
        state.unsaved.overlay(&mut next);
        let outcome = apply(&mut next)?;
        next.version = STORE_VERSION;
        write_document(&files.path, &next)?;
        state.document = next;
        state.unsaved.outcomes.clear();
        Ok(outcome)
    }

    /// State with the latest file contents merged in.
    fn current(&self) -> MutexGuard<'_, StoreState> {
        let mut state = self.lock();
        if let Some(files) = &self.inner.files {
            match files.read_shared() {
                Ok(mut document) => {
                    state.unsaved.overlay(&mut document);
                    state.document = document;
                }
                Err(err) => warn!("Using cached timers, refresh failed: {}", err),
            }
        }
        state
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Cross-process marker that a timer's submission is in flight.
pub struct SubmissionLock {
    lock: Option<(RwLock<File>, PathBuf)>,
}

/// Held for as long as the submission runs; released on drop.
pub struct SubmissionHold<'a> {
    _guard: Option<RwLockWriteGuard<'a, File>>,
}

impl SubmissionLock {
    /// Takes the lock without waiting. `None` when another holder has it.
    pub fn try_hold(&mut self) -> StoreResult<Option<SubmissionHold<'_>>> {
        let Some((lock, path)) = self.lock.as_mut() else {
            return Ok(Some(SubmissionHold { _guard: None }));
        };
        match lock.try_write() {
            Ok(guard) => Ok(Some(SubmissionHold {
                _guard: Some(guard),
            })),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(StoreError::io(path.as_path(), err)),
        }
    }
}

fn ensure_parent(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
        }
    }
    Ok(())
}

fn open_lock_file(path: &Path) -> StoreResult<File> {
    ensure_parent(path)?;
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .map_err(|err| StoreError::io(path, err))
}

fn read_document(path: &Path) -> StoreResult<StoreDocument> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(StoreDocument::default()),
        Err(err) => return Err(StoreError::io(path, err)),
    };
    if content.trim().is_empty() {
        return Ok(StoreDocument::default());
    }
    serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes to a sibling temp file and renames it over the target.
fn write_document(path: &Path, document: &StoreDocument) -> StoreResult<()> {
    ensure_parent(path)?;
    let content = serde_json::to_vec_pretty(document)?;
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp_path).map_err(|err| StoreError::io(&tmp_path, err))?;
        file.write_all(&content)
            .and_then(|_| file.sync_all())
            .map_err(|err| StoreError::io(&tmp_path, err))?;
    }
    fs::rename(&tmp_path, path).map_err(|err| StoreError::io(path, err))
}
