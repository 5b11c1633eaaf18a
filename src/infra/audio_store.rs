// ============================================================
// Layer 6 — Audio Store
// ============================================================
// Owns the directory that synthesized answers are written to.
//
// `allocate` returns a fresh, uniquely named path. Once the new
// answer has been written, `commit` evicts the oldest other files
// so the directory holds at most `max_files` answers. A failed
// synthesis never costs an older answer.
//
// Only files this store names (answer-<uuid>.wav) are counted or
// deleted; anything else in the directory is left alone.

use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::{Context, Result};
use uuid::Uuid;

const PREFIX:    &str = "answer-";
const EXTENSION: &str = "wav";

pub struct AudioStore {
    dir:       PathBuf,
    max_files: usize,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>, max_files: usize) -> Self {
        Self {
            dir:       dir.into(),
            max_files: max_files.max(1),
        }
    }

    /// Reserve a path for the next answer.
    pub fn allocate(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create audio directory '{}'", self.dir.display()))?;
        Ok(self.dir.join(format!("{PREFIX}{}.{EXTENSION}", Uuid::new_v4())))
    }

    /// Keep `written` and evict the oldest other answers beyond
    /// the limit.
    pub fn commit(&self, written: &Path) -> Result<()> {
        let mut existing: Vec<_> = self
            .list()?
            .into_iter()
            .filter(|(_, path)| path != written)
            .collect();
        if existing.len() < self.max_files {
            return Ok(());
        }

        // Oldest first
        existing.sort_by_key(|(modified, _)| *modified);
        let excess = existing.len() + 1 - self.max_files;
        for (_, path) in existing.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Evicted '{}'", path.display()),
                Err(e) => tracing::warn!("Cannot evict '{}': {}", path.display(), e),
            }
        }
        Ok(())
    }

    /// Drop a reserved path whose answer was never completed.
    pub fn discard(&self, reserved: &Path) {
        if reserved.exists() {
            if let Err(e) = fs::remove_file(reserved) {
                tracing::warn!("Cannot remove '{}': {}", reserved.display(), e);
            }
        }
    }

    /// Files owned by this store with their modification time.
    fn list(&self) -> Result<Vec<(SystemTime, PathBuf)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read audio directory '{}'", self.dir.display()))?
        {
            let entry = entry?;
            let path  = entry.path();
            let owned = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(PREFIX) && n.ends_with(EXTENSION));
            if !owned {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, path));
        }
        Ok(files)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn count_owned(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(PREFIX))
            .count()
    }

    #[test]
    fn test_allocate_creates_directory_and_unique_names() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = AudioStore::new(tmp.path().join("audio"), 4);
        let a = store.allocate().unwrap();
        let b = store.allocate().unwrap();
        assert_ne!(a, b);
        assert!(tmp.path().join("audio").is_dir());
        assert_eq!(a.extension().unwrap(), "wav");
    }

    #[test]
    fn test_directory_never_exceeds_limit() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = AudioStore::new(tmp.path(), 3);
        for _ in 0..10 {
            let path = store.allocate().unwrap();
            fs::write(&path, b"RIFF").unwrap();
            store.commit(&path).unwrap();
            assert!(count_owned(tmp.path()) <= 3);
            assert!(path.exists());
        }
        assert_eq!(count_owned(tmp.path()), 3);
    }

    #[test]
    fn test_foreign_files_are_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("keep-me.wav"), b"x").unwrap();
        let store = AudioStore::new(tmp.path(), 1);
        for _ in 0..3 {
            let path = store.allocate().unwrap();
            fs::write(&path, b"RIFF").unwrap();
            store.commit(&path).unwrap();
        }
        assert!(tmp.path().join("keep-me.wav").exists());
        assert_eq!(count_owned(tmp.path()), 1);
    }

    #[test]
    fn test_reserving_does_not_evict() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = AudioStore::new(tmp.path(), 1);
        let kept  = store.allocate().unwrap();
        fs::write(&kept, b"RIFF").unwrap();
        store.commit(&kept).unwrap();

        let failed = store.allocate().unwrap();
        fs::write(&failed, b"RI").unwrap();
        store.discard(&failed);

        assert!(kept.exists());
        assert!(!failed.exists());
        assert_eq!(count_owned(tmp.path()), 1);
    }
}
