//! Directory modification times
//!
//! Mtimes are whole seconds since the epoch, the granularity the cache file
//! stores.

use crate::error::{VirtdbError, VirtdbResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Modification time of `path` in whole seconds
pub fn mtime_of(path: &Path) -> VirtdbResult<i64> {
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| VirtdbError::io(format!("reading mtime of {}", path.display()), e))?;
    Ok(unix_seconds(modified))
}

/// Category subdirectories of `root` and their mtimes
///
/// Dot-directories are not categories. Entries that disappear while the
/// scan runs are skipped.
pub fn category_mtimes(root: &Path) -> VirtdbResult<BTreeMap<String, i64>> {
    let entries = fs::read_dir(root)
        .map_err(|e| VirtdbError::io(format!("listing categories in {}", root.display()), e))?;

    let mut mtimes = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| VirtdbError::io("reading category entry", e))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        let meta = match fs::metadata(entry.path()) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(VirtdbError::io(
                    format!("reading mtime of {}", entry.path().display()),
                    e,
                ))
            }
        };
        if !meta.is_dir() {
            continue;
        }

        let modified = meta
            .modified()
            .map_err(|e| VirtdbError::io(format!("reading mtime of {}", name), e))?;
        mtimes.insert(name, unix_seconds(modified));
    }

    Ok(mtimes)
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
