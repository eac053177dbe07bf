//! On-disk identity capture, used to detect whether a source file changed
//! since a [`crate::module::Module`] was loaded from it.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::error::{Error, Result};

/// `(device, inode, size, mtime)` snapshot of a regular file, captured at
/// load time and compared against on later lookups by the modern-generation
/// cache (§4.modern.load).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Identity {
    device: u64,
    inode: u64,
    size: u64,
    /// Modification time, in whole seconds since the epoch, plus the
    /// nanosecond remainder, so two stats a filesystem considers distinct
    /// compare unequal even within the same second.
    mtime_sec: i64,
    mtime_nsec: i64,
}

impl Identity {
    /// Captures the identity of the regular file at `path`.
    pub fn stat(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path).map_err(|e| Error::io("stat", path.to_path_buf(), e))?;
        Ok(Identity {
            device: meta.dev(),
            inode: meta.ino(),
            size: meta.size(),
            mtime_sec: meta.mtime(),
            mtime_nsec: meta.mtime_nsec(),
        })
    }
}
