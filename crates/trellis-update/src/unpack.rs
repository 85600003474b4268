//! Zip extraction into a staging directory.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::error::{Result, UpdateError};

/// Extract `archive` into `dest` on the blocking pool.
///
/// Every entry is checked before anything is written: one entry resolving
/// outside `dest` rejects the whole archive.
pub async fn unpack(archive: PathBuf, dest: PathBuf) -> Result<usize> {
    tokio::task::spawn_blocking(move || unpack_blocking(&archive, &dest))
        .await
        .map_err(|e| UpdateError::Io(io::Error::other(e)))?
}

/// Synchronous form of [`unpack`]. Returns the number of files written.
pub fn unpack_blocking(archive: &Path, dest: &Path) -> Result<usize> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;

    let mut targets = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| UpdateError::PathTraversal(entry.name().to_string()))?;
        targets.push(dest.join(relative));
    }

    std::fs::create_dir_all(dest)?;
    let mut written = 0;
    for (i, target) in targets.into_iter().enumerate() {
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode & 0o777))?;
        }
        written += 1;
    }

    debug!(archive = %archive.display(), dest = %dest.display(), files = written, "Archive unpacked");
    Ok(written)
}
