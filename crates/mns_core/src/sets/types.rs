//! Per-night data set model.

use std::path::{Path, PathBuf};

/// One night's raw data folder (`set{n}`) under the working directory.
///
/// Entries are created during discovery and never mutated afterwards; during
/// a run, per-set progress is tracked by the orchestrator, not re-derived
/// from the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetEntry {
    /// 1-based set number.
    pub index: u32,
    /// Folder name, `set{index}`.
    pub name: String,
    /// Path of the set folder.
    pub root: PathBuf,
    /// True iff the set has a `lights/` subfolder.
    pub valid: bool,
}

impl SetEntry {
    /// Probe `{workdir}/set{index}` and record whether it is usable.
    pub fn probe(workdir: &Path, index: u32) -> Self {
        let name = format!("set{}", index);
        let root = workdir.join(&name);
        let valid = root.join("lights").is_dir();
        Self {
            index,
            name,
            root,
            valid,
        }
    }

    /// The set's raw light frames folder.
    pub fn lights_dir(&self) -> PathBuf {
        self.root.join("lights")
    }

    /// The set's raw flat frames folder (optional on disk).
    pub fn flats_dir(&self) -> PathBuf {
        self.root.join("flats")
    }

    /// The set's calibration output folder.
    pub fn process_dir(&self) -> PathBuf {
        self.root.join("process")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn probe_detects_lights_folder() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("set1/lights")).unwrap();
        fs::create_dir_all(dir.path().join("set2")).unwrap();

        let set1 = SetEntry::probe(dir.path(), 1);
        assert!(set1.valid);
        assert_eq!(set1.name, "set1");
        assert_eq!(set1.lights_dir(), dir.path().join("set1/lights"));

        let set2 = SetEntry::probe(dir.path(), 2);
        assert!(!set2.valid);

        let set3 = SetEntry::probe(dir.path(), 3);
        assert!(!set3.valid);
        assert!(!set3.root.exists());
    }
}
