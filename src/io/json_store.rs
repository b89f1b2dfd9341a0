//! JSON file persistence
//!
//! The whole state lives in one pretty-printed JSON document shaped like
//! [`Snapshot`]. Writes go to a temporary file in the same directory which
//! is then renamed over the target, so a crash or a failed write never
//! leaves a truncated state file behind.

use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::ledger::{ledger_from_snapshot, merge_ledger, remove_ledger, UserLedger};
use crate::core::traits::{LedgerStore, StateStore};
use crate::types::{Snapshot, UserId, YieldError};

/// State store backed by a single JSON file
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles of per-user saves
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_snapshot(&self) -> Result<Snapshot, YieldError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet, starting empty");
                return Ok(Snapshot::default());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Snapshot::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), YieldError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, snapshot)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path)
            .map_err(|e| YieldError::persistence(format!("rename failed: {}", e.error)))?;

        debug!(
            path = %self.path.display(),
            users = snapshot.users.len(),
            "state written"
        );
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Snapshot, YieldError> {
        self.read_snapshot()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), YieldError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| YieldError::persistence("state file lock poisoned"))?;
        self.write_snapshot(snapshot)
    }
}

impl LedgerStore for JsonFileStore {
    fn load_all(&self) -> Result<Snapshot, YieldError> {
        self.read_snapshot()
    }

    fn load_ledger(&self, user: UserId) -> Result<Option<UserLedger>, YieldError> {
        Ok(ledger_from_snapshot(&self.read_snapshot()?, user))
    }

    fn save_ledger(&self, ledger: &UserLedger) -> Result<(), YieldError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| YieldError::persistence("state file lock poisoned"))?;

        let mut snapshot = self.read_snapshot()?;
        merge_ledger(&mut snapshot, ledger);
        self.write_snapshot(&snapshot)
    }

    fn remove_ledger(&self, user: UserId) -> Result<(), YieldError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| YieldError::persistence("state file lock poisoned"))?;

        let mut snapshot = self.read_snapshot()?;
        remove_ledger(&mut snapshot, user);
        self.write_snapshot(&snapshot)
    }
}
