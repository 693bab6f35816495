//! Folder and clip selection.
//!
//! Both selectors are pure. Folder selection walks the canonical
//! (lexicographic) order and never wraps into the next pass; clip selection
//! is a seeded shuffle fully determined by
//! `(base_seed, pass_index, folder_id, clip list)`.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use clipcycle_models::{Folder, SelectionPlan};

/// Pick the next folders to process this run.
///
/// Iterates `all` in order, skipping members of `done`; returns at most
/// `pick_count` ids. An empty result signals that the pass is complete.
pub fn select_next(all: &[String], done: &BTreeSet<String>, pick_count: usize) -> Vec<String> {
    all.iter()
        .filter(|id| !done.contains(*id))
        .take(pick_count)
        .cloned()
        .collect()
}

/// Deterministically select up to `max_clips` clips from a folder.
pub fn select_clips(
    folder: &Folder,
    base_seed: u64,
    pass_index: u32,
    max_clips: usize,
) -> SelectionPlan {
    if folder.clip_files.is_empty() {
        return SelectionPlan::empty(&folder.id);
    }

    let seed = derive_seed(base_seed, pass_index, &folder.id);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut clips = folder.clip_files.clone();
    clips.shuffle(&mut rng);
    clips.truncate(max_clips.min(clips.len()));

    SelectionPlan {
        folder_id: folder.id.clone(),
        clips,
    }
}

/// Stable per-call seed: FNV-1a over the folder id, folded with the base
/// seed and pass index.
///
/// Distinct folders get unrelated shuffles within a pass, and the same folder
/// reshuffles independently on the next pass. Not `DefaultHasher`, whose
/// output is not guaranteed stable across releases.
pub fn derive_seed(base_seed: u64, pass_index: u32, folder_id: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET ^ base_seed;
    for byte in folder_id.as_bytes() {
        hash = (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME);
    }
    for byte in pass_index.to_le_bytes() {
        hash = (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn folder_with_clips(id: &str, count: usize) -> Folder {
        Folder {
            id: id.to_string(),
            path: PathBuf::from(format!("/dramas/{id}")),
            clip_files: (1..=count)
                .map(|i| PathBuf::from(format!("/dramas/{id}/clip_{i:02}.mp4")))
                .collect(),
            overlay: None,
        }
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_next_skips_done_in_canonical_order() {
        let all = ids(&["a", "b", "c", "d", "e"]);
        let done: BTreeSet<String> = ["b", "d"].iter().map(|s| s.to_string()).collect();

        let picked = select_next(&all, &done, 2);
        assert_eq!(picked, ids(&["a", "c"]));
    }

    #[test]
    fn test_select_next_never_repeats_or_wraps() {
        let all = ids(&["a", "b", "c"]);
        let done: BTreeSet<String> = ["a"].iter().map(|s| s.to_string()).collect();

        // More requested than remain: only the remainder comes back.
        let picked = select_next(&all, &done, 6);
        assert_eq!(picked, ids(&["b", "c"]));

        let unique: BTreeSet<&String> = picked.iter().collect();
        assert_eq!(unique.len(), picked.len());
    }

    #[test]
    fn test_select_next_empty_signals_pass_complete() {
        let all = ids(&["a", "b"]);
        let done: BTreeSet<String> = all.iter().cloned().collect();
        assert!(select_next(&all, &done, 6).is_empty());
    }

    #[test]
    fn test_clip_selection_is_reproducible() {
        // Scenario: 5 clips, max 3, seed 42, pass 0.
        let folder = folder_with_clips("ep_01", 5);

        let first = select_clips(&folder, 42, 0, 3);
        let second = select_clips(&folder, 42, 0, 3);

        assert_eq!(first, second);
        assert_eq!(first.clips.len(), 3);

        let unique: BTreeSet<&PathBuf> = first.clips.iter().collect();
        assert_eq!(unique.len(), 3, "selected clips must be distinct");
    }

    #[test]
    fn test_clip_selection_truncates_to_available() {
        let folder = folder_with_clips("ep_02", 2);
        let plan = select_clips(&folder, 42, 0, 3);
        assert_eq!(plan.clips.len(), 2);
    }

    #[test]
    fn test_empty_folder_yields_empty_plan() {
        let folder = folder_with_clips("ep_03", 0);
        let plan = select_clips(&folder, 42, 0, 3);
        assert!(plan.is_empty());
        assert_eq!(plan.folder_id, "ep_03");
    }

    #[test]
    fn test_derived_seeds_differ_by_folder_and_pass() {
        let base = derive_seed(42, 0, "ep_01");
        assert_ne!(base, derive_seed(42, 0, "ep_02"));
        assert_ne!(base, derive_seed(42, 1, "ep_01"));
        assert_ne!(base, derive_seed(43, 0, "ep_01"));
        assert_eq!(base, derive_seed(42, 0, "ep_01"));
    }
}
