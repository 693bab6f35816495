//! Resumable batch progress.
//!
//! One `BatchState` tracks a single pass over the folder set: which folders
//! have already produced both output variants, and how many full passes have
//! completed before this one. The wire form is a small JSON file rewritten
//! atomically by the batch crate's state store.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Persistent batch progress for the current pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchState {
    /// Zero-based index of the current pass over the folder set.
    pub pass_index: u32,
    /// Folder ids already fully processed within the current pass.
    ///
    /// A `BTreeSet` keeps the serialized form sorted so state files diff
    /// cleanly between runs.
    pub done: BTreeSet<String>,
}

impl BatchState {
    /// Fresh state: first pass, nothing done.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a folder as fully processed. Idempotent.
    pub fn mark_done(&mut self, folder_id: impl Into<String>) -> bool {
        self.done.insert(folder_id.into())
    }

    /// Whether every known folder has been processed this pass.
    ///
    /// An empty folder set is never "complete"; advancing the pass on it
    /// would spin the counter without doing work.
    pub fn is_pass_complete<'a, I>(&self, all_folder_ids: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known: BTreeSet<&str> = all_folder_ids.into_iter().collect();
        !known.is_empty()
            && known.len() == self.done.len()
            && known.iter().all(|id| self.done.contains(*id))
    }

    /// Start the next pass: bump the counter and clear progress.
    pub fn advance_pass(&mut self) {
        self.pass_index += 1;
        self.done.clear();
    }

    /// Drop done-ids that no longer correspond to a known folder.
    ///
    /// Returns true if anything was removed. Keeps the `done ⊆ known`
    /// invariant when folders disappear from disk between runs.
    pub fn retain_known<'a, I>(&mut self, all_folder_ids: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known: BTreeSet<&str> = all_folder_ids.into_iter().collect();
        let before = self.done.len();
        self.done.retain(|id| known.contains(id.as_str()));
        self.done.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = BatchState::new();
        assert_eq!(state.pass_index, 0);
        assert!(state.done.is_empty());
    }

    #[test]
    fn test_mark_done_idempotent() {
        let mut state = BatchState::new();
        assert!(state.mark_done("ep_01"));
        assert!(!state.mark_done("ep_01"));
        assert_eq!(state.done.len(), 1);
    }

    #[test]
    fn test_pass_completion_and_advance() {
        let mut state = BatchState::new();
        let all = ["a", "b", "c"];
        state.mark_done("a");
        assert!(!state.is_pass_complete(all));
        state.mark_done("b");
        state.mark_done("c");
        assert!(state.is_pass_complete(all));

        state.advance_pass();
        assert_eq!(state.pass_index, 1);
        assert!(state.done.is_empty());
    }

    #[test]
    fn test_retain_known_drops_stale_ids() {
        let mut state = BatchState::new();
        state.mark_done("kept");
        state.mark_done("removed_from_disk");
        assert!(state.retain_known(["kept", "other"]));
        assert_eq!(state.done.len(), 1);
        assert!(state.done.contains("kept"));
        // Second call is a no-op
        assert!(!state.retain_known(["kept", "other"]));
    }

    #[test]
    fn test_json_wire_form() {
        let mut state = BatchState::new();
        state.pass_index = 3;
        state.mark_done("b");
        state.mark_done("a");

        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"pass_index":3,"done":["a","b"]}"#);

        let back: BatchState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
