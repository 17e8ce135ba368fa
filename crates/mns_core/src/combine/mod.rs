//! Sequence combination: link every set's calibrated lights into one
//! globally renumbered sequence.
//!
//! No pixel data is copied; each frame becomes a link named
//! `{seq}_{00001..}.fit` in the combined output folder. The counter is shared
//! across sets, so sequence order preserves set order, and within a set the
//! lexicographic filename order of the calibrated frames.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::logging::RunLogger;
use crate::orchestrator::{StageError, StageResult};
use crate::sets::SetEntry;

#[cfg(unix)]
use std::os::unix::fs::symlink;
#[cfg(windows)]
use std::os::windows::fs::symlink_file as symlink;

/// Name of the combined output folder under the working directory.
pub const COMBINED_DIR: &str = "multi_night_combined";

/// Filename prefix of calibrated light frames in a set's process area.
const CALIBRATED_LIGHT_PREFIX: &str = "pp_light_";

/// Link all calibrated lights into `{workdir}/multi_night_combined`.
///
/// Existing links of the same name are replaced, so re-running combination
/// over the same inputs is idempotent. A set contributing zero frames is a
/// warning, not an error. Returns the total number of links, which equals
/// the sum of per-set frame counts; numbering is contiguous from 1.
pub fn link_combined(
    workdir: &Path,
    sets: &[SetEntry],
    seq_name: &str,
    logger: &RunLogger,
) -> StageResult<usize> {
    let combined_dir = workdir.join(COMBINED_DIR);
    fs::create_dir_all(&combined_dir)
        .map_err(|e| StageError::io("creating combined folder", e))?;

    let mut counter = 1usize;
    for set in sets {
        let files = calibrated_lights(&set.process_dir())
            .map_err(|e| StageError::io(format!("listing {} output", set.name), e))?;

        if files.is_empty() {
            logger.warn(&format!("No calibrated lights found in {}", set.name));
            continue;
        }

        logger.info(&format!("Linking {} files from {}", files.len(), set.name));
        for file in files {
            let link = combined_dir.join(format!("{}_{:05}.fit", seq_name, counter));
            replace_link(&file, &link)
                .map_err(|e| StageError::io(format!("linking {}", link.display()), e))?;
            counter += 1;
        }
    }

    Ok(counter - 1)
}

/// List a set's calibrated light frames in lexicographic filename order.
fn calibrated_lights(process_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !process_dir.is_dir() {
        return Ok(files);
    }

    for entry in fs::read_dir(process_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(CALIBRATED_LIGHT_PREFIX) && name.ends_with(".fit") {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// Create a link, removing any stale one from a prior run first.
fn replace_link(target: &Path, link: &Path) -> io::Result<()> {
    // symlink_metadata also sees dangling links, which exists() would miss.
    if link.symlink_metadata().is_ok() {
        fs::remove_file(link)?;
    }
    symlink(target, link)
}
