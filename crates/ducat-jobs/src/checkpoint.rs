//! Durable job progress.
//!
//! A checkpoint records which days are done and the resume frontier: the
//! pipeline state at the end of the longest run of finished days from the
//! start of the range. Resuming seeds the aggregator and validator from the
//! frontier and truncates the output file to the frontier's committed length,
//! so the resumed output matches an uninterrupted run.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use directories::ProjectDirs;
use ducat_aggregate::{CarryState, ValidatorState};
use serde::{Deserialize, Serialize};

use crate::{CheckpointError, JobKey};

/// Pipeline state at the resume point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontier {
    /// First day not yet reflected in the output.
    pub next_day: NaiveDate,
    /// Open candle bucket.
    pub carry: CarryState,
    /// Validator position.
    pub validator: ValidatorState,
    /// Output bytes durably written up to this point.
    pub committed_bytes: u64,
}

impl Frontier {
    /// Returns the frontier of a job that has not started.
    #[must_use]
    pub fn start(day: NaiveDate) -> Self {
        Self {
            next_day: day,
            carry: CarryState::default(),
            validator: ValidatorState::default(),
            committed_bytes: 0,
        }
    }
}

/// Persisted progress of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The job this checkpoint belongs to.
    pub key: JobKey,
    /// Days processed, including non-trading days.
    pub completed_days: BTreeSet<NaiveDate>,
    /// Days whose download failed.
    pub failed_days: BTreeSet<NaiveDate>,
    /// Where a resume starts.
    pub frontier: Frontier,
    /// True once every day completed and the output was finalized.
    pub finished: bool,
    /// Last save time.
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Creates the checkpoint of a job that has not started.
    #[must_use]
    pub fn new(key: JobKey) -> Self {
        let start = key.range.start;
        Self {
            key,
            completed_days: BTreeSet::new(),
            failed_days: BTreeSet::new(),
            frontier: Frontier::start(start),
            finished: false,
            updated_at: Utc::now(),
        }
    }

    /// Checks that the checkpoint is usable for `key`.
    ///
    /// Returns the reason it is not.
    pub fn check(&self, key: &JobKey) -> Result<(), String> {
        if &self.key != key {
            return Err(format!("belongs to job '{}'", self.key));
        }
        let next = self.frontier.next_day;
        let past_end = key.range.end.succ_opt().unwrap_or(NaiveDate::MAX);
        if next < key.range.start || next > past_end {
            return Err(format!("frontier {next} lies outside {}", key.range));
        }
        Ok(())
    }
}

/// Persistent checkpoint storage.
pub trait CheckpointStore: Send + Sync {
    /// Loads the checkpoint for `key`.
    ///
    /// A missing checkpoint is `Ok(None)`; one that exists but cannot be used
    /// is [`CheckpointError::Corrupt`].
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be read or is corrupt.
    fn load(&self, key: &JobKey) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Saves a checkpoint, replacing any previous one for the same key.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be written.
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Removes the checkpoint for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint exists but cannot be removed.
    fn clear(&self, key: &JobKey) -> Result<(), CheckpointError>;
}

/// Stores checkpoints as JSON files, one per job key.
///
/// Checkpoints are stored in `<data dir>/checkpoints/`. Saves write a
/// temporary file and rename it over the old one.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Creates a store in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CheckpointError::Write {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Returns the default checkpoint directory.
    ///
    /// Uses the `directories` crate to find the appropriate location:
    /// - Linux: `~/.local/share/ducat/checkpoints`
    /// - macOS: `~/Library/Application Support/ducat/checkpoints`
    /// - Windows: `C:\Users\<User>\AppData\Roaming\ducat\checkpoints`
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::NoDataDir`] if no home directory is known.
    pub fn default_path() -> Result<PathBuf, CheckpointError> {
        ProjectDirs::from("", "", "ducat")
            .map(|dirs| dirs.data_dir().join("checkpoints"))
            .ok_or(CheckpointError::NoDataDir)
    }

    /// Creates a store at the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be determined or created.
    pub fn with_default_path() -> Result<Self, CheckpointError> {
        Self::new(Self::default_path()?)
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the checkpoint file for `key`.
    #[must_use]
    pub fn path_for(&self, key: &JobKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.stem()))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, key: &JobKey) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CheckpointError::Read { path, source }),
        };

        let checkpoint: Checkpoint =
            serde_json::from_str(&content).map_err(|e| CheckpointError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        checkpoint
            .check(key)
            .map_err(|reason| CheckpointError::Corrupt { path, reason })?;
        Ok(Some(checkpoint))
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let path = self.path_for(&checkpoint.key);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(checkpoint)?;

        fs::write(&tmp, json).map_err(|source| CheckpointError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| CheckpointError::Write { path, source })
    }

    fn clear(&self, key: &JobKey) -> Result<(), CheckpointError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::Write { path, source }),
        }
    }
}

/// Keeps checkpoints in memory, for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<JobKey, Checkpoint>>,
}

impl MemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, key: &JobKey) -> Result<Option<Checkpoint>, CheckpointError> {
        let checkpoints = self
            .checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(checkpoints.get(key).cloned())
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(checkpoint.key.clone(), checkpoint.clone());
        Ok(())
    }

    fn clear(&self, key: &JobKey) -> Result<(), CheckpointError> {
        self.checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
