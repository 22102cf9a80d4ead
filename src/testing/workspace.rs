//! Run directories
//!
//! The shared-state directory belongs to the whole run: it is recreated
//! once before the first case and removed once after the last one.

use std::io;
use std::path::Path;

use crate::common::{Error, Result};

/// Ensure `path` exists and is empty, removing any previous contents
pub fn prepare(path: &Path) -> Result<()> {
    let wrap = |source: io::Error| Error::WorkspacePrepare {
        path: path.to_path_buf(),
        source,
    };

    if path.exists() {
        std::fs::remove_dir_all(path).map_err(wrap)?;
    }
    std::fs::create_dir_all(path).map_err(wrap)?;

    tracing::debug!(path = %path.display(), "prepared directory");
    Ok(())
}

/// Remove `path` recursively; a missing directory is not an error
pub fn teardown(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed directory");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::WorkspaceTeardown {
            path: path.to_path_buf(),
            source,
        }),
    }
}
