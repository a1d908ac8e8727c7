//! File-backed completion map, one set of finished words per test stage.
//! A word is only marked after its attempt is confirmed saved (and uploaded
//! when a server is configured), so a crash never records phantom progress.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::upload::TestStage;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressMap {
    #[serde(default)]
    pre: BTreeSet<String>,
    #[serde(default)]
    post: BTreeSet<String>,
}

impl ProgressMap {
    fn stage(&self, stage: TestStage) -> &BTreeSet<String> {
        match stage {
            TestStage::Pre => &self.pre,
            TestStage::Post => &self.post,
        }
    }

    fn stage_mut(&mut self, stage: TestStage) -> &mut BTreeSet<String> {
        match stage {
            TestStage::Pre => &mut self.pre,
            TestStage::Post => &mut self.post,
        }
    }
}

pub struct ProgressStore {
    path: PathBuf,
    map: ProgressMap,
}

impl ProgressStore {
    /// Loads the map from disk, starting empty if the file does not exist.
    pub fn load(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let map = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parsing progress file {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => ProgressMap::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        Ok(Self { path, map })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_done(&self, stage: TestStage, word: &str) -> bool {
        self.map.stage(stage).contains(word)
    }

    pub fn done_count(&self, stage: TestStage) -> usize {
        self.map.stage(stage).len()
    }

    /// Records the word and persists immediately.
    pub fn mark_done(&mut self, stage: TestStage, word: &str) -> anyhow::Result<()> {
        if !self.map.stage_mut(stage).insert(word.to_string()) {
            return Ok(());
        }
        let raw = serde_json::to_string_pretty(&self.map)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("writing {}", self.path.display()))?;
        tracing::info!(word, stage = stage.as_str(), "progress recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut store = ProgressStore::load(&path).unwrap();
        assert!(!store.is_done(TestStage::Pre, "thought"));

        store.mark_done(TestStage::Pre, "thought").unwrap();
        store.mark_done(TestStage::Pre, "water").unwrap();
        store.mark_done(TestStage::Post, "thought").unwrap();

        let reloaded = ProgressStore::load(&path).unwrap();
        assert!(reloaded.is_done(TestStage::Pre, "thought"));
        assert!(reloaded.is_done(TestStage::Pre, "water"));
        assert!(reloaded.is_done(TestStage::Post, "thought"));
        assert!(!reloaded.is_done(TestStage::Post, "water"));
        assert_eq!(reloaded.done_count(TestStage::Pre), 2);
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(store.done_count(TestStage::Pre), 0);
        assert_eq!(store.done_count(TestStage::Post), 0);
    }

    #[test]
    fn marking_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut store = ProgressStore::load(&path).unwrap();
        store.mark_done(TestStage::Post, "sofa").unwrap();
        store.mark_done(TestStage::Post, "sofa").unwrap();
        assert_eq!(store.done_count(TestStage::Post), 1);
    }
}
