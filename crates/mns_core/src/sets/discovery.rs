//! Set discovery: scan a working directory for contiguous `set{n}` folders.

use std::path::{Path, PathBuf};

use super::types::SetEntry;
use crate::logging::RunLogger;

/// Scan `workdir` for `set1`, `set2`, ... in ascending order.
///
/// Scanning halts at the first `set{n}` folder that does not exist - higher
/// numbered folders are never considered, so the returned list is always
/// contiguous. A folder that exists but has no `lights/` subfolder is skipped
/// with a warning and scanning continues. Only valid entries are returned;
/// the result is empty when `set1` is absent.
pub fn discover_sets(workdir: &Path, logger: &RunLogger) -> Vec<SetEntry> {
    let mut sets = Vec::new();
    let mut index = 1u32;

    loop {
        let entry = SetEntry::probe(workdir, index);
        if !entry.root.is_dir() {
            break;
        }

        if entry.valid {
            logger.info(&format!("Detected: {}", entry.name));
            sets.push(entry);
        } else {
            logger.warn(&format!("Skipping {}: no lights/ folder", entry.name));
        }
        index += 1;
    }

    tracing::debug!("discovered {} valid sets under {}", sets.len(), workdir.display());
    sets
}

/// Resolve the working directory a caller actually meant.
///
/// When the supplied directory is a set folder itself, or one of the
/// `lights`/`flats`/`process` subfolders, the enclosing directory is the
/// working directory.
pub fn normalize_working_dir(dir: &Path) -> PathBuf {
    let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.starts_with("set") || matches!(name, "lights" | "flats" | "process") {
        if let Some(parent) = dir.parent() {
            if !parent.as_os_str().is_empty() {
                return parent.to_path_buf();
            }
        }
    }
    dir.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogConfig;
    use crate::models::EventSink;
    use std::fs;
    use tempfile::tempdir;

    fn test_logger(dir: &Path) -> RunLogger {
        RunLogger::new("discovery_test", dir, LogConfig::default(), EventSink::disabled()).unwrap()
    }

    #[test]
    fn stops_at_first_absent_set() {
        let dir = tempdir().unwrap();
        for name in ["set1/lights", "set2/lights", "set4/lights"] {
            fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        let logger = test_logger(dir.path());

        let sets = discover_sets(dir.path(), &logger);
        let names: Vec<&str> = sets.iter().map(|s| s.name.as_str()).collect();
        // set3 is absent, so set4 is never reached.
        assert_eq!(names, vec!["set1", "set2"]);
    }

    #[test]
    fn skips_set_without_lights_but_continues() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("set1")).unwrap();
        fs::create_dir_all(dir.path().join("set2/lights")).unwrap();
        let logger = test_logger(dir.path());

        let sets = discover_sets(dir.path(), &logger);
        let names: Vec<&str> = sets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["set2"]);
    }

    #[test]
    fn empty_when_set1_absent() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("set2/lights")).unwrap();
        let logger = test_logger(dir.path());

        assert!(discover_sets(dir.path(), &logger).is_empty());
    }

    #[test]
    fn entries_are_ordered_by_index() {
        let dir = tempdir().unwrap();
        for i in 1..=3 {
            fs::create_dir_all(dir.path().join(format!("set{}/lights", i))).unwrap();
        }
        let logger = test_logger(dir.path());

        let sets = discover_sets(dir.path(), &logger);
        let indices: Vec<u32> = sets.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn normalizes_subfolder_paths() {
        assert_eq!(
            normalize_working_dir(Path::new("/data/target/set1")),
            PathBuf::from("/data/target")
        );
        assert_eq!(
            normalize_working_dir(Path::new("/data/target/lights")),
            PathBuf::from("/data/target")
        );
        assert_eq!(
            normalize_working_dir(Path::new("/data/target")),
            PathBuf::from("/data/target")
        );
    }
}
