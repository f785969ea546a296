//! Filesystem helpers for cache persistence

use crate::error::{VirtdbError, VirtdbResult};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Create `path` and any missing parents
///
/// A directory created by this call gets exactly `mode` (umask does not
/// apply) and, if given, group `gid`. Existing directories are left alone.
pub fn ensure_dir(path: &Path, mode: u32, gid: Option<u32>) -> VirtdbResult<()> {
    if path.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    builder
        .create(path)
        .map_err(|e| VirtdbError::io(format!("creating directory {}", path.display()), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| VirtdbError::io(format!("setting mode on {}", path.display()), e))?;
        if let Some(gid) = gid {
            std::os::unix::fs::chown(path, None, Some(gid))
                .map_err(|e| VirtdbError::io(format!("setting group on {}", path.display()), e))?;
        }
    }
    #[cfg(not(unix))]
    let _ = (mode, gid);

    Ok(())
}

/// Replace `path` with `contents` in one step
///
/// Data goes to a temporary file in the same directory, is synced, then
/// renamed over `path`. Readers see either the old file or the new one.
pub fn atomic_write(
    path: &Path,
    contents: &[u8],
    mode: u32,
    gid: Option<u32>,
) -> VirtdbResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let context = || format!("writing {}", path.display());

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| VirtdbError::io(context(), e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| VirtdbError::io(context(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(mode))
            .map_err(|e| VirtdbError::io(context(), e))?;
        if let Some(gid) = gid {
            std::os::unix::fs::fchown(tmp.as_file(), None, Some(gid))
                .map_err(|e| VirtdbError::io(context(), e))?;
        }
    }
    #[cfg(not(unix))]
    let _ = (mode, gid);

    tmp.persist(path).map_err(|e| VirtdbError::io(context(), e.error))?;
    Ok(())
}

/// Resolve a group name to its id
#[cfg(unix)]
pub fn lookup_group(name: &str) -> VirtdbResult<u32> {
    use nix::unistd::Group;

    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid.as_raw()),
        Ok(None) => Err(VirtdbError::GroupNotFound(name.to_string())),
        Err(errno) => Err(VirtdbError::io(
            format!("looking up group {}", name),
            std::io::Error::from(errno),
        )),
    }
}

/// Resolve a group name to its id
#[cfg(not(unix))]
pub fn lookup_group(name: &str) -> VirtdbResult<u32> {
    Err(VirtdbError::GroupNotFound(name.to_string()))
}
