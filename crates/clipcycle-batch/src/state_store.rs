//! Persistent, resumable batch state.
//!
//! The state file is tiny JSON rewritten atomically (write-to-temp + rename)
//! after every successful folder, so an interrupted run never leaves a
//! half-written file and never loses a completed folder. A corrupt file is a
//! hard error: silently resetting would reshuffle already-completed work.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use clipcycle_models::BatchState;

use crate::error::{BatchError, BatchResult};

/// Loads and persists `BatchState`. Single writer per state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state, or the default state if none exists.
    pub fn load(&self) -> BatchResult<BatchState> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file, starting fresh");
                return Ok(BatchState::new());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|source| BatchError::StateCorruption {
            path: self.path.clone(),
            source,
        })
    }

    /// Persist atomically: serialize to a sibling temp file, then rename.
    pub fn persist(&self, state: &BatchState) -> BatchResult<()> {
        let parent = match self.path.parent() {
            Some(p) if p != Path::new("") => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut tmp = NamedTempFile::new_in(&parent)?;
        serde_json::to_writer_pretty(&mut tmp, state)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path)
            .map_err(|e| BatchError::Io(e.error))?;

        debug!(
            path = %self.path.display(),
            pass_index = state.pass_index,
            done = state.done.len(),
            "State persisted"
        );
        Ok(())
    }

    /// Record a folder as done and persist. Idempotent; re-marking an
    /// already-done folder does not rewrite the file.
    pub fn mark_done(&self, state: &mut BatchState, folder_id: &str) -> BatchResult<()> {
        if state.mark_done(folder_id) {
            self.persist(state)?;
        }
        Ok(())
    }

    /// Advance to the next pass when every known folder is done.
    ///
    /// Returns true when the pass was advanced. No-op otherwise.
    pub fn advance_pass_if_complete<'a, I>(
        &self,
        state: &mut BatchState,
        all_folder_ids: I,
    ) -> BatchResult<bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if !state.is_pass_complete(all_folder_ids) {
            return Ok(false);
        }

        state.advance_pass();
        self.persist(state)?;
        info!(pass_index = state.pass_index, "Pass complete, advancing");
        Ok(true)
    }

    /// Drop done-ids for folders that no longer exist, persisting on change.
    pub fn reconcile<'a, I>(&self, state: &mut BatchState, all_folder_ids: I) -> BatchResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if state.retain_known(all_folder_ids) {
            self.persist(state)?;
        }
        Ok(())
    }
}

/// Advisory single-writer lock next to the state file.
///
/// Held for the whole run; removed on drop. A second run against the same
/// state file fails fast instead of interleaving writes.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(path: impl Into<PathBuf>) -> BatchResult<Self> {
        let path = path.into();
        let result = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path);

        match result {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(BatchError::Locked(path))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> StateStore {
        StateStore::new(dir.path().join("state.json"))
    }

    #[test]
    fn test_load_missing_returns_default() {
        let dir = TempDir::new().unwrap();
        let state = store_in(&dir).load().unwrap();
        assert_eq!(state, BatchState::new());
    }

    #[test]
    fn test_mark_done_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut state = store.load().unwrap();
        store.mark_done(&mut state, "ep_01").unwrap();
        store.mark_done(&mut state, "ep_01").unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.done.len(), 1);
        assert!(reloaded.done.contains("ep_01"));
        assert_eq!(reloaded.pass_index, 0);
    }

    #[test]
    fn test_corrupt_state_is_fatal_not_reset() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), b"{not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, BatchError::StateCorruption { .. }));
        // The corrupt file must survive for operator inspection.
        assert!(store.path().exists());
    }

    #[test]
    fn test_advance_pass_only_when_complete() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let all = ["a", "b"];

        let mut state = store.load().unwrap();
        store.mark_done(&mut state, "a").unwrap();
        assert!(!store.advance_pass_if_complete(&mut state, all).unwrap());
        assert_eq!(state.pass_index, 0);

        store.mark_done(&mut state, "b").unwrap();
        assert!(store.advance_pass_if_complete(&mut state, all).unwrap());
        assert_eq!(state.pass_index, 1);
        assert!(state.done.is_empty());

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.pass_index, 1);
        assert!(reloaded.done.is_empty());
    }

    #[test]
    fn test_reconcile_drops_unknown_folders() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut state = store.load().unwrap();
        store.mark_done(&mut state, "kept").unwrap();
        store.mark_done(&mut state, "deleted").unwrap();

        store.reconcile(&mut state, ["kept", "new"]).unwrap();
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.done.len(), 1);
        assert!(reloaded.done.contains("kept"));
    }

    #[test]
    fn test_run_lock_excludes_second_acquirer() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("state.json.lock");

        let lock = RunLock::acquire(&lock_path).unwrap();
        let err = RunLock::acquire(&lock_path).unwrap_err();
        assert!(matches!(err, BatchError::Locked(_)));

        drop(lock);
        assert!(!lock_path.exists());
        let _lock2 = RunLock::acquire(&lock_path).unwrap();
    }
}
