use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::buffer::GrowableBuffer;

/// Number of rendered frames between two checks of the watched file.
pub const POLL_INTERVAL_FRAMES: u32 = 10;

/// Watches a single shader file by modification time.
///
/// The watcher does not decide on its own when a change has been "handled":
/// the baseline only moves when [`mark_applied`](Self::mark_applied) is
/// called after a successful build. Until then every poll keeps reporting the
/// file as changed.
pub struct FileWatcher {
    path: PathBuf,
    applied: Option<SystemTime>,
}

impl FileWatcher {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            applied: None,
        }
    }

    /// Check the file and, if its timestamp differs from the applied
    /// baseline, read its full contents into `contents`.
    ///
    /// Returns the new timestamp when fresh contents were read. A file that
    /// cannot be stat'ed or read yields `None`; the caller should keep its
    /// current state and try again on the next interval.
    pub fn poll(&self, contents: &mut GrowableBuffer<u8>) -> Option<SystemTime> {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                log::debug!("stat {:?} failed: {}", self.path, e);
                return None;
            }
        };

        if self.applied == Some(modified) {
            return None;
        }

        if let Err(e) = self.read_into(contents) {
            log::debug!("read {:?} failed: {}", self.path, e);
            return None;
        }

        Some(modified)
    }

    fn read_into(&self, contents: &mut GrowableBuffer<u8>) -> io::Result<()> {
        let mut file = File::open(&self.path)?;
        let size = file.metadata().map(|m| m.len() as usize).unwrap_or(0);

        contents.clear();
        contents.ensure(size);
        io::copy(&mut file, contents)?;
        Ok(())
    }

    /// Record `modified` as the timestamp of the last successful build.
    pub fn mark_applied(&mut self, modified: SystemTime) {
        self.applied = Some(modified);
    }

    /// Timestamp of the last successful build, if any.
    pub fn applied(&self) -> Option<SystemTime> {
        self.applied
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Create `path` containing `template` if nothing exists there yet.
///
/// Returns `true` if a file was written.
pub fn ensure_exists(path: &Path, template: &str) -> io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    let mut file = File::create(path)?;
    file.write_all(template.as_bytes())?;
    Ok(true)
}
